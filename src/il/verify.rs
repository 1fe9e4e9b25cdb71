use crate::il::inst::InstTyp;
use crate::il::FuncId;
use crate::il::InstId;
use crate::il::Module;
use crate::il::ValueRef;
use crate::il::VarId;
use ahash::HashMap;
use ahash::HashMapExt;
use ahash::HashSet;
use ahash::HashSetExt;
use thiserror::Error;

/// Structural IR errors. These are input-contract violations: the inference
/// pass assumes a module that passes verification and asserts internally
/// otherwise.
#[derive(Debug, Error)]
pub enum VerifyError {
  #[error("instruction {inst} operand {index} is out of bounds")]
  OperandOutOfBounds { inst: InstId, index: usize },

  #[error("block {block} of function {func} references instruction {inst} out of bounds")]
  BlockInstOutOfBounds {
    func: FuncId,
    block: u32,
    inst: InstId,
  },

  #[error("instruction {inst} is owned by {owner} but placed in {found}")]
  WrongOwner {
    inst: InstId,
    owner: FuncId,
    found: FuncId,
  },

  #[error("instruction {inst} appears in more than one block")]
  DuplicatePlacement { inst: InstId },

  #[error("instruction {inst} is not registered as a user of its operand {index}")]
  MissingUserEdge { inst: InstId, index: usize },

  #[error("instruction {inst} has a malformed payload for its kind")]
  MalformedPayload { inst: InstId },

  #[error("phi {inst} is not at the start of its block")]
  PhiNotLeading { inst: InstId },

  #[error("phi {inst} names label {label}, which is not a predecessor of its block")]
  PhiUnknownPredecessor { inst: InstId, label: u32 },

  #[error("block {block} of function {func} does not end with a terminator")]
  MissingTerminator { func: FuncId, block: u32 },

  #[error("terminator {inst} is not the last instruction of its block")]
  TerminatorInBlockBody { inst: InstId },

  #[error("instruction {inst} targets label {label}, which does not exist")]
  UnknownLabel { inst: InstId, label: u32 },

  #[error("instruction {inst} uses a variable outside a frame load or store")]
  VariableEscapes { inst: InstId },

  #[error("function {func} has no return instruction")]
  NoReturn { func: FuncId },

  #[error("variable {var} is loaded but never stored")]
  LoadedNeverStored { var: VarId },

  #[error("stack slot {inst} is loaded but never written")]
  SlotLoadedNeverWritten { inst: InstId },
}

/// Check the structural invariants the inference pass relies on. Returns the
/// first violation found, walking functions, blocks, and instructions in
/// module order.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
  let mut placed = HashSet::new();
  for func_id in module.func_ids() {
    verify_function(module, func_id, &mut placed)?;
  }
  for (idx, var) in module.variables.iter().enumerate() {
    let var_id = VarId(idx as u32);
    let mut loaded = false;
    let mut stored = false;
    for &user in &var.users {
      match module.inst(user).t {
        InstTyp::LoadFrame => loaded = true,
        InstTyp::StoreFrame => stored = true,
        // Unreachable once operand positions verify, but keep the walk total.
        _ => stored = true,
      }
    }
    if loaded && !stored {
      return Err(VerifyError::LoadedNeverStored { var: var_id });
    };
  }
  Ok(())
}

fn verify_function(
  module: &Module,
  func_id: FuncId,
  placed: &mut HashSet<InstId>,
) -> Result<(), VerifyError> {
  let func = module.func(func_id);
  let labels: HashSet<u32> = func.blocks.iter().map(|b| b.label).collect();

  // Predecessors, derived from terminator labels. Out-of-bounds ids are
  // reported by the per-instruction walk below.
  let mut preds: HashMap<u32, Vec<u32>> = HashMap::new();
  for block in &func.blocks {
    if let Some(&last) = block.insts.last() {
      if (last.0 as usize) >= module.insts.len() {
        continue;
      }
      let last_inst = module.inst(last);
      if last_inst.t.is_terminator() {
        for &target in &last_inst.labels {
          preds.entry(target).or_default().push(block.label);
        }
      }
    }
  }

  let mut has_return = false;
  for block in &func.blocks {
    let mut seen_non_phi = false;
    for (pos, &inst_id) in block.insts.iter().enumerate() {
      if inst_id.0 as usize >= module.insts.len() {
        return Err(VerifyError::BlockInstOutOfBounds {
          func: func_id,
          block: block.label,
          inst: inst_id,
        });
      }
      if !placed.insert(inst_id) {
        return Err(VerifyError::DuplicatePlacement { inst: inst_id });
      }
      let inst = module.inst(inst_id);
      if inst.owner != func_id {
        return Err(VerifyError::WrongOwner {
          inst: inst_id,
          owner: inst.owner,
          found: func_id,
        });
      }
      if inst.t == InstTyp::Return {
        has_return = true;
      };

      verify_operands(module, inst_id)?;
      verify_payload(module, inst_id)?;

      if inst.t == InstTyp::Phi {
        if seen_non_phi {
          return Err(VerifyError::PhiNotLeading { inst: inst_id });
        }
        let block_preds = preds.get(&block.label).cloned().unwrap_or_default();
        for &label in &inst.labels {
          if !block_preds.contains(&label) {
            return Err(VerifyError::PhiUnknownPredecessor {
              inst: inst_id,
              label,
            });
          };
        }
      } else {
        seen_non_phi = true;
      }

      let is_last = pos + 1 == block.insts.len();
      if inst.t.is_terminator() && !is_last {
        return Err(VerifyError::TerminatorInBlockBody { inst: inst_id });
      }
      if is_last && !inst.t.is_terminator() {
        return Err(VerifyError::MissingTerminator {
          func: func_id,
          block: block.label,
        });
      }
      for &label in &inst.labels {
        if inst.t != InstTyp::Phi && !labels.contains(&label) {
          return Err(VerifyError::UnknownLabel {
            inst: inst_id,
            label,
          });
        };
      }
    }
    if block.insts.is_empty() {
      return Err(VerifyError::MissingTerminator {
        func: func_id,
        block: block.label,
      });
    };
  }

  if !has_return {
    return Err(VerifyError::NoReturn { func: func_id });
  }

  // A slot that is only ever read can never converge to a type.
  for &inst_id in func.blocks.iter().flat_map(|b| &b.insts) {
    let inst = module.inst(inst_id);
    if inst.t != InstTyp::AllocStack {
      continue;
    }
    let mut loaded = false;
    let mut written = false;
    for &user in &inst.users {
      let u = module.inst(user);
      match u.t {
        InstTyp::LoadStack if u.operands[0] == ValueRef::Inst(inst_id) => loaded = true,
        InstTyp::StoreStack if u.operands.get(1) == Some(&ValueRef::Inst(inst_id)) => {
          written = true
        }
        // Any other use is an unknown writer and resolves the slot's type.
        _ => written = true,
      }
    }
    if loaded && !written {
      return Err(VerifyError::SlotLoadedNeverWritten { inst: inst_id });
    };
  }

  Ok(())
}

fn verify_operands(module: &Module, inst_id: InstId) -> Result<(), VerifyError> {
  let inst = module.inst(inst_id);
  for (index, op) in inst.operands.iter().enumerate() {
    let in_bounds = match *op {
      ValueRef::Inst(i) => (i.0 as usize) < module.insts.len(),
      ValueRef::Param(p) => (p.0 as usize) < module.params.len(),
      ValueRef::Var(v) => (v.0 as usize) < module.variables.len(),
      ValueRef::Literal(l) => (l.0 as usize) < module.literals.len(),
      ValueRef::Function(f) => (f.0 as usize) < module.functions.len(),
    };
    if !in_bounds {
      return Err(VerifyError::OperandOutOfBounds {
        inst: inst_id,
        index,
      });
    }

    // Variables are memory, not first-class values.
    if let ValueRef::Var(_) = op {
      let at_address_position = (inst.t == InstTyp::LoadFrame && index == 0)
        || (inst.t == InstTyp::StoreFrame && index == 1);
      if !at_address_position {
        return Err(VerifyError::VariableEscapes { inst: inst_id });
      };
    }

    let registered = match *op {
      ValueRef::Inst(i) => module.inst(i).users.contains(&inst_id),
      ValueRef::Var(v) => module.variable(v).users.contains(&inst_id),
      ValueRef::Function(f) => module.func(f).users.contains(&inst_id),
      ValueRef::Param(_) | ValueRef::Literal(_) => true,
    };
    if !registered {
      return Err(VerifyError::MissingUserEdge {
        inst: inst_id,
        index,
      });
    };
  }
  Ok(())
}

fn verify_payload(module: &Module, inst_id: InstId) -> Result<(), VerifyError> {
  let inst = module.inst(inst_id);
  let ok = match inst.t {
    InstTyp::Un => inst.un_op.is_some() && inst.operands.len() == 1,
    InstTyp::Bin => inst.bin_op.is_some() && inst.operands.len() == 2,
    InstTyp::Phi => {
      let mut seen = HashSet::new();
      inst.labels.len() == inst.operands.len()
        && !inst.operands.is_empty()
        && inst.labels.iter().all(|&l| seen.insert(l))
    }
    InstTyp::PrLoad => inst.checked_ty.is_some() && inst.operands.len() == 1,
    InstTyp::LoadStack | InstTyp::LoadFrame | InstTyp::LoadParam | InstTyp::LoadConst => {
      inst.operands.len() == 1
    }
    InstTyp::StoreStack | InstTyp::StoreFrame => inst.operands.len() == 2,
    InstTyp::StoreProperty | InstTyp::StoreOwnProperty | InstTyp::TryStoreGlobalProperty => {
      inst.operands.len() == 3
    }
    InstTyp::StoreGetterSetter => inst.operands.len() == 4,
    InstTyp::LoadProperty | InstTyp::TryLoadGlobalProperty | InstTyp::DeleteProperty => {
      inst.operands.len() == 2
    }
    InstTyp::Call | InstTyp::Construct | InstTyp::CallBuiltin => !inst.operands.is_empty(),
    InstTyp::Return | InstTyp::Throw | InstTyp::ThrowIfEmpty => inst.operands.len() == 1,
    InstTyp::CondBranch => inst.operands.len() == 1 && inst.labels.len() == 2,
    InstTyp::Branch => inst.labels.len() == 1,
    _ => true,
  };
  if !ok {
    return Err(VerifyError::MalformedPayload { inst: inst_id });
  }
  Ok(())
}
