pub mod debug;
pub(crate) mod transfer;

use crate::callgraph::CallGraphProvider;
use crate::callgraph::SimpleCallGraphProvider;
use crate::il::inst::InstTyp;
use crate::il::FuncId;
use crate::il::InstId;
use crate::il::Module;
use crate::il::ParamId;
use crate::il::ValueRef;
use crate::il::VarId;
use crate::infer::debug::InferenceDebug;
use crate::infer::transfer::MemLoc;
use crate::types::Type;
use ahash::HashMap;
use ahash::HashMapExt;
use ahash::HashSet;
use ahash::HashSetExt;
use itertools::Itertools;
use tracing::debug;
use tracing::trace;

#[derive(Clone, Copy, Debug, Default)]
pub struct InferenceOptions {
  /// Record a serializable snapshot of every entity's type after each
  /// fixpoint iteration.
  pub transition_log: bool,
}

/// Counters accumulated across the whole module run.
#[derive(Clone, Copy, Debug, Default)]
pub struct InferenceStats {
  /// Instruction types changed by the pass.
  pub insts_typed: usize,
  /// Property loads whose type came from exactly one store.
  pub unique_property_loads: usize,
}

/// Everything the pre-pass snapshot and the narrowing step key on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum EntityRef {
  Inst(InstId),
  Param(ParamId),
  Var(VarId),
  Func(FuncId),
}

/// The type inference pass. Recomputes from scratch, per function, the type
/// of every instruction result, parameter, captured variable, and return
/// value, then narrows each against its type from before the pass so that
/// externally supplied annotations are never widened.
pub struct TypeInference {
  stats: InferenceStats,
  log: Option<InferenceDebug>,
}

impl TypeInference {
  pub fn new() -> Self {
    Self::with_options(InferenceOptions::default())
  }

  pub fn with_options(options: InferenceOptions) -> Self {
    Self {
      stats: InferenceStats::default(),
      log: options.transition_log.then(InferenceDebug::new),
    }
  }

  pub fn stats(&self) -> &InferenceStats {
    &self.stats
  }

  pub fn transition_log(&self) -> Option<&InferenceDebug> {
    self.log.as_ref()
  }

  /// Run on every function in module order with the default per-function
  /// call-graph provider. Returns whether any type changed; since every type
  /// is recomputed from scratch this is true in practice.
  pub fn run_on_module(&mut self, module: &mut Module) -> bool {
    self.run_on_module_with(module, SimpleCallGraphProvider::build)
  }

  /// Same, with an injected provider so precision can be traded for speed
  /// without touching the transfer functions.
  pub fn run_on_module_with<P, F>(&mut self, module: &mut Module, provider: F) -> bool
  where
    P: CallGraphProvider,
    F: Fn(&Module, FuncId) -> P,
  {
    debug!("start type inference on module");
    let mut changed = false;
    for func in module.func_ids().collect_vec() {
      let cgp = provider(module, func);
      let mut pass = FunctionPass {
        module: &mut *module,
        func,
        cgp: &cgp,
        pre_pass: HashMap::new(),
        stats: &mut self.stats,
        log: self.log.as_mut(),
      };
      changed |= pass.run();
    }
    changed
  }
}

impl Default for TypeInference {
  fn default() -> Self {
    Self::new()
  }
}

/// Convenience entry point with default options and provider.
pub fn run_type_inference(module: &mut Module) -> bool {
  TypeInference::new().run_on_module(module)
}

struct FunctionPass<'a> {
  module: &'a mut Module,
  func: FuncId,
  cgp: &'a dyn CallGraphProvider,
  /// Upper bound on the post-pass type of every entity in this function.
  pre_pass: HashMap<EntityRef, Type>,
  stats: &'a mut InferenceStats,
  log: Option<&'a mut InferenceDebug>,
}

impl<'a> FunctionPass<'a> {
  fn run(&mut self) -> bool {
    debug!(func = %self.module.func(self.func).name, "start type inference on function");

    // Clearing first keeps the pass from trusting its own previous results,
    // which may have become too loose after other passes simplified the IR.
    self.clear_types();
    self.infer_params();

    // Instruction types feed variable types, variable types feed loads, so
    // iterate until convergence. Every step moves types up the finite
    // lattice, which bounds the iteration count.
    let mut iteration = 0u32;
    loop {
      let mut local_changed = false;
      for id in self.module.func_inst_ids(self.func).collect_vec() {
        local_changed |= self.infer_instruction(id);
      }
      local_changed |= self.infer_return_type();
      for var in self.module.func(self.func).variables.clone() {
        local_changed |= self.infer_memory_type(var);
      }
      if let Some(log) = self.log.as_deref_mut() {
        log.add_step(self.module, self.func, iteration);
      };
      iteration += 1;
      if !local_changed {
        break;
      }
    }

    // Narrow to the pre-pass bound as a single post-step. Narrowing inside
    // the loop could oscillate against transfer results that want to widen
    // past the bound.
    for id in self.module.func_inst_ids(self.func).collect_vec() {
      self.narrow(EntityRef::Inst(id));
    }
    self.narrow(EntityRef::Func(self.func));
    for p in self.module.func(self.func).params.clone() {
      self.narrow(EntityRef::Param(p));
    }
    for v in self.module.func(self.func).variables.clone() {
      self.narrow(EntityRef::Var(v));
    }

    // Output discipline: untyped exactly when there is no output.
    #[cfg(debug_assertions)]
    for id in self.module.func_inst_ids(self.func).collect_vec() {
      let inst = self.module.inst(id);
      debug_assert!(
        inst.ty.is_no_type() != inst.has_output(),
        "instruction {} ({:?}) must be untyped iff it has no output, got {}",
        id,
        inst.t,
        inst.ty,
      );
    }

    true
  }

  /// Snapshot every entity's current type, then reset instructions to their
  /// inherent type (or nothing) and everything else to nothing.
  fn clear_types(&mut self) {
    for id in self.module.func_inst_ids(self.func).collect_vec() {
      let inst = self.module.inst(id);
      self.pre_pass.insert(EntityRef::Inst(id), inst.ty);
      let cleared = inst.t.inherent_type().unwrap_or(Type::no_type());
      self.module.inst_mut(id).ty = cleared;
    }
    for p in self.module.func(self.func).params.clone() {
      self.pre_pass.insert(EntityRef::Param(p), self.module.param(p).ty);
      self.module.param_mut(p).ty = Type::no_type();
    }
    for v in self.module.func(self.func).variables.clone() {
      self
        .pre_pass
        .insert(EntityRef::Var(v), self.module.variable(v).ty);
      self.module.variable_mut(v).ty = Type::no_type();
    }
    let f = self.module.func_mut(self.func);
    self.pre_pass.insert(EntityRef::Func(self.func), f.ret_ty);
    f.ret_ty = Type::no_type();
  }

  /// Seed parameter types from the full set of callsites, when it is known.
  /// Callsites live in other functions, whose types will not change during
  /// this function's fixpoint, so seeding once up front is enough.
  fn infer_params(&mut self) {
    let cgp = self.cgp;
    let params = self.module.func(self.func).params.clone();
    let sites = match cgp.known_callsites(self.func) {
      Some(sites) if !sites.is_empty() => sites,
      // Unknown or absent callers: anything may be passed.
      _ => {
        debug!(func = %self.module.func(self.func).name, "no callsite information");
        for p in params {
          self.module.param_mut(p).ty = Type::any();
        }
        return;
      }
    };
    for (i, &p) in params.iter().enumerate() {
      let mut ty = Type::no_type();
      for &site in sites {
        // A callsite that passes fewer arguments passes undefined.
        let arg = self.module.inst(site).call_args().get(i).copied();
        ty |= match arg {
          Some(a) => self.module.value_type(a),
          None => Type::UNDEFINED,
        };
      }
      trace!(param = %self.module.param(p).name, ty = %ty, "seeded parameter");
      self.module.param_mut(p).ty = ty;
    }
  }

  /// Apply the transfer function for one instruction. Returns true when
  /// another iteration is needed, either because the type changed or because
  /// an operand is still untyped.
  fn infer_instruction(&mut self, id: InstId) -> bool {
    let inst = self.module.inst(id);

    // Phis must be visited even with untyped operands. A loop feeds a phi
    // its own downstream values through the back edge, so waiting for every
    // operand would deadlock the fixpoint.
    if inst.t == InstTyp::Phi {
      return self.infer_phi(id);
    }

    for &op in &inst.operands {
      if self.module.value_type(op).is_no_type() {
        trace!(inst = %id, "operand not yet typed, revisiting");
        return true;
      };
    }

    let original = inst.ty;
    let inferred = transfer::infer_inst(self.module, self.cgp, self.stats, id);
    let changed = inferred != original;
    if changed {
      self.stats.insts_typed += 1;
      trace!(inst = %id, from = %original, to = %inferred, "inferred instruction");
      self.module.inst_mut(id).ty = inferred;
    };
    changed
  }

  /// Union the types of every non-phi value reachable through phi chains,
  /// writing the partial union even when some leaf is still untyped (and
  /// reporting "changed" in that case to keep the fixpoint going).
  fn infer_phi(&mut self, id: InstId) -> bool {
    let inst = self.module.inst(id);
    if inst.operands.is_empty() {
      return false;
    }

    let mut visited = HashSet::new();
    let mut inputs = Vec::new();
    collect_phi_inputs(self.module, &mut visited, &mut inputs, id);

    let original = inst.ty;
    let mut new_ty = Type::no_type();
    let mut unresolved = false;
    for &input in &inputs {
      let t = self.module.value_type(input);
      if t.is_no_type() {
        unresolved = true;
      };
      new_ty |= t;
    }

    self.module.inst_mut(id).ty = new_ty;
    new_ty != original || unresolved
  }

  /// The function's return type is the union over its return instructions.
  /// A generator's inner function can be resumed with `.return(x)` for any
  /// `x`, so its return type is pinned to the top.
  fn infer_return_type(&mut self) -> bool {
    let original = self.module.func(self.func).ret_ty;
    let new_ty = if self.module.func(self.func).is_generator_inner {
      Type::any()
    } else {
      let mut ty = Type::no_type();
      for id in self.module.func_inst_ids(self.func).collect_vec() {
        let inst = self.module.inst(id);
        if inst.t == InstTyp::Return {
          ty |= self.module.value_type(inst.operands[0]);
        };
      }
      ty
    };
    if new_ty != original {
      trace!(func = %self.module.func(self.func).name, ty = %new_ty, "inferred return type");
      self.module.func_mut(self.func).ret_ty = new_ty;
      return true;
    }
    false
  }

  fn infer_memory_type(&mut self, var: VarId) -> bool {
    let ty = transfer::infer_memory_location_type(self.module, &MemLoc::Var(var));
    if ty != self.module.variable(var).ty {
      trace!(var = %self.module.variable(var).name, ty = %ty, "inferred variable type");
      self.module.variable_mut(var).ty = ty;
      return true;
    }
    false
  }

  fn entity_type(&self, e: EntityRef) -> Type {
    match e {
      EntityRef::Inst(id) => self.module.inst(id).ty,
      EntityRef::Param(id) => self.module.param(id).ty,
      EntityRef::Var(id) => self.module.variable(id).ty,
      EntityRef::Func(id) => self.module.func(id).ret_ty,
    }
  }

  fn set_entity_type(&mut self, e: EntityRef, ty: Type) {
    match e {
      EntityRef::Inst(id) => self.module.inst_mut(id).ty = ty,
      EntityRef::Param(id) => self.module.param_mut(id).ty = ty,
      EntityRef::Var(id) => self.module.variable_mut(id).ty = ty,
      EntityRef::Func(id) => self.module.func_mut(id).ret_ty = ty,
    }
  }

  /// Intersect an entity's inferred type with its pre-pass type. Inference
  /// may only narrow what was already known.
  fn narrow(&mut self, e: EntityRef) {
    let Some(&pre) = self.pre_pass.get(&e) else {
      return;
    };
    let current = self.entity_type(e);
    if pre != current {
      let narrowed = pre & current;
      trace!(from = %current, to = %narrowed, "narrowing to pre-pass bound");
      self.set_entity_type(e, narrowed);
    };
  }
}

/// Values feeding a phi, found by chasing through phi-of-phi chains.
fn collect_phi_inputs(
  module: &Module,
  visited: &mut HashSet<InstId>,
  inputs: &mut Vec<ValueRef>,
  phi: InstId,
) {
  if !visited.insert(phi) {
    return;
  }
  for (_, value) in module.inst(phi).phi_entries() {
    match value {
      ValueRef::Inst(i) if module.inst(i).t == InstTyp::Phi => {
        collect_phi_inputs(module, visited, inputs, i);
      }
      _ => {
        if !inputs.contains(&value) {
          inputs.push(value);
        };
      }
    }
  }
}
