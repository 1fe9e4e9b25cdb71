use crate::il::FuncId;
use crate::il::Module;
use serde::Serialize;
use std::collections::BTreeMap;

/// One fixpoint iteration's worth of types, keyed by a stable entity name.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InferenceDebugStep {
  pub function: String,
  pub iteration: u32,
  pub types: BTreeMap<String, String>,
}

/// Optional transition log for debugging and determinism tests. Serializes
/// to the same bytes for the same module and provider answers.
#[derive(Serialize, Debug, Clone, Default)]
pub struct InferenceDebug {
  steps: Vec<InferenceDebugStep>,
}

impl InferenceDebug {
  pub fn new() -> Self {
    Self { steps: Vec::new() }
  }

  pub fn steps(&self) -> &[InferenceDebugStep] {
    &self.steps
  }

  pub fn add_step(&mut self, module: &Module, func: FuncId, iteration: u32) {
    let f = module.func(func);
    let mut types = BTreeMap::new();
    for id in module.func_inst_ids(func) {
      types.insert(id.to_string(), module.inst(id).ty.to_string());
    }
    for (i, &p) in f.params.iter().enumerate() {
      types.insert(format!("param{i}"), module.param(p).ty.to_string());
    }
    for (i, &v) in f.variables.iter().enumerate() {
      types.insert(format!("var{i}"), module.variable(v).ty.to_string());
    }
    types.insert("return".to_string(), f.ret_ty.to_string());
    self.steps.push(InferenceDebugStep {
      function: f.name.clone(),
      iteration,
      types,
    });
  }
}
