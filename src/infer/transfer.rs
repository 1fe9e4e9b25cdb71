use crate::callgraph::CallGraphProvider;
use crate::il::inst::BinOp;
use crate::il::inst::InstTyp;
use crate::il::inst::UnOp;
use crate::il::InstId;
use crate::il::Module;
use crate::il::ValueRef;
use crate::il::VarId;
use crate::infer::InferenceStats;
use crate::types::Type;
use tracing::debug;

/// A memory location whose type is the union of the values stored into it:
/// a closure-captured variable or an AllocStack slot.
pub(crate) enum MemLoc {
  Var(VarId),
  Stack(InstId),
}

/// The union of the stored types over every frame or stack store into `loc`.
/// Loads contribute nothing. Any other user may write through the location
/// in a way this analysis cannot track, so the result degrades to the top.
pub(crate) fn infer_memory_location_type(module: &Module, loc: &MemLoc) -> Type {
  let (users, addr) = match loc {
    MemLoc::Var(v) => (&module.variable(*v).users, ValueRef::Var(*v)),
    MemLoc::Stack(i) => (&module.inst(*i).users, ValueRef::Inst(*i)),
  };
  let mut ty = Type::no_type();
  for &user in users {
    let inst = module.inst(user);
    let stored = match inst.t {
      InstTyp::StoreFrame | InstTyp::StoreStack => {
        if inst.operands[1] == addr && inst.operands[0] != addr {
          inst.operands[0]
        } else {
          return Type::any();
        }
      }
      InstTyp::LoadFrame | InstTyp::LoadStack => continue,
      _ => return Type::any(),
    };
    ty |= module.value_type(stored);
  }
  ty
}

/// `- ++ -- ~` over a single operand. The numeric result tag varies by
/// operator; BigInt passes through, and an operand that merely may be a
/// BigInt widens the result by the BigInt tag.
fn infer_unary_arith(module: &Module, operand: ValueRef, number_result: Type) -> Type {
  let op_ty = module.value_type(operand);
  if op_ty.is_number_type() {
    return number_result;
  }
  if op_ty.is_bigint_type() {
    return Type::BIGINT;
  }
  let may_be_bigint = if op_ty.can_be_bigint() {
    Type::BIGINT
  } else {
    Type::no_type()
  };
  number_result | may_be_bigint
}

fn infer_un(module: &Module, inst_id: InstId) -> Type {
  let (op, operand) = module.inst(inst_id).as_un();
  match op {
    UnOp::Void => Type::UNDEFINED,
    UnOp::Typeof => Type::STRING,
    UnOp::Bang => Type::BOOLEAN,
    UnOp::Minus | UnOp::Inc | UnOp::Dec => infer_unary_arith(module, operand, Type::NUMBER),
    UnOp::Tilde => infer_unary_arith(module, operand, Type::INT32),
  }
}

/// Arithmetic that can never produce a string. There is no implicit BigInt
/// conversion, so a BigInt result needs both operands to admit one.
fn infer_binary_arith(module: &Module, l: ValueRef, r: ValueRef, number_result: Type) -> Type {
  let l_ty = module.value_type(l);
  let r_ty = module.value_type(r);
  if l_ty.is_number_type() && r_ty.is_number_type() {
    return number_result;
  }
  if l_ty.is_bigint_type() && r_ty.is_bigint_type() {
    return Type::BIGINT;
  }
  let may_be_bigint = if l_ty.can_be_bigint() && r_ty.can_be_bigint() {
    Type::BIGINT
  } else {
    Type::no_type()
  };
  number_result | may_be_bigint
}

fn infer_binary_bitwise(module: &Module, l: ValueRef, r: ValueRef) -> Type {
  let l_ty = module.value_type(l);
  let r_ty = module.value_type(r);
  let may_be_bigint = if l_ty.can_be_bigint() && r_ty.can_be_bigint() {
    Type::BIGINT
  } else {
    Type::no_type()
  };
  Type::INT32 | may_be_bigint
}

fn infer_add(module: &Module, l: ValueRef, r: ValueRef) -> Type {
  let l_ty = module.value_type(l);
  let r_ty = module.value_type(r);
  // One string operand forces a string result.
  if l_ty.is_string_type() || r_ty.is_string_type() {
    return Type::STRING;
  }
  if l_ty.is_number_type() && r_ty.is_number_type() {
    return Type::NUMBER;
  }
  if l_ty.is_bigint_type() && r_ty.is_bigint_type() {
    return Type::BIGINT;
  }
  let may_be_bigint = if l_ty.can_be_bigint() && r_ty.can_be_bigint() {
    Type::BIGINT
  } else {
    Type::no_type()
  };
  let numeric = Type::NUMBER | may_be_bigint;
  // When neither side can coerce through user code and neither can already
  // be a string, the result must be numeric.
  if l_ty.is_side_effect_free()
    && r_ty.is_side_effect_free()
    && !l_ty.can_be_string()
    && !r_ty.can_be_string()
  {
    return numeric;
  }
  numeric | Type::STRING
}

fn infer_bin(module: &Module, inst_id: InstId) -> Type {
  let (op, l, r) = module.inst(inst_id).as_bin();
  match op {
    // Comparisons may throw or run user code, but the result is a boolean.
    BinOp::Eq
    | BinOp::NotEq
    | BinOp::StrictEq
    | BinOp::StrictNotEq
    | BinOp::Less
    | BinOp::LessEq
    | BinOp::Greater
    | BinOp::GreaterEq
    | BinOp::In
    | BinOp::InstanceOf => Type::BOOLEAN,
    BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Exp | BinOp::Shl | BinOp::Shr => {
      infer_binary_arith(module, l, r, Type::NUMBER)
    }
    BinOp::Mod => infer_binary_arith(module, l, r, Type::INT32),
    // No BigInt variant exists for the unsigned shift.
    BinOp::Ushr => Type::UINT32,
    BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => infer_binary_bitwise(module, l, r),
    BinOp::Add => infer_add(module, l, r),
  }
}

/// Union of return types over known callees. Unknown callee sets, and callee
/// sets whose members all have an uninferred return type, give the top.
fn infer_base_call(module: &Module, cgp: &dyn CallGraphProvider, inst_id: InstId) -> Type {
  let Some(callees) = cgp.known_callees(inst_id) else {
    debug!(call = %inst_id, "unknown callees");
    return Type::any();
  };
  let mut ty = Type::no_type();
  for &f in callees {
    ty |= module.func(f).ret_ty;
  }
  if ty.is_no_type() {
    return Type::any();
  }
  ty
}

/// Does a store-own establish `prop` on the allocation?
fn is_owned_property(module: &Module, alloc: InstId, prop: ValueRef) -> bool {
  let alloc_ref = ValueRef::Inst(alloc);
  for &user in &module.inst(alloc).users {
    let inst = module.inst(user);
    match inst.t {
      InstTyp::StoreOwnProperty => {
        let (_, obj, key) = inst.as_store_property();
        if obj == alloc_ref && key == prop {
          return true;
        };
      }
      InstTyp::StoreGetterSetter => {
        if inst.operands[2] == alloc_ref && inst.operands[3] == prop {
          return true;
        };
      }
      _ => {}
    }
  }
  false
}

fn infer_load_property(
  module: &Module,
  cgp: &dyn CallGraphProvider,
  stats: &mut InferenceStats,
  inst_id: InstId,
) -> Type {
  let Some(receivers) = cgp.known_receivers(inst_id) else {
    return Type::any();
  };
  let (_, prop) = module.inst(inst_id).as_load_property();

  let mut first = true;
  let mut ret_ty = Type::no_type();
  let mut unique = true;

  for &receiver in receivers {
    let Some(stores) = cgp.known_stores(receiver) else {
      return Type::any();
    };
    let receiver_typ = module.inst(receiver).t;

    // A property that was never established by a store-own may come off the
    // prototype chain; nothing can be said about it.
    if receiver_typ == InstTyp::AllocObject && !is_owned_property(module, receiver, prop) {
      return Type::any();
    }

    for &store in stores {
      let store_inst = module.inst(store);
      let stored = match receiver_typ {
        InstTyp::AllocObject => {
          let (value, _, key) = store_inst.as_store_property();
          if key != prop {
            continue;
          };
          value
        }
        // Element stores contribute regardless of index.
        InstTyp::AllocArray => store_inst.as_store_property().0,
        _ => unreachable!("property receiver is not an allocation site"),
      };
      if first {
        ret_ty = module.value_type(stored);
        first = false;
      } else {
        ret_ty |= module.value_type(stored);
        unique = false;
      }
    }
  }

  if first {
    // No store contributed a value.
    return Type::any();
  }
  if unique {
    stats.unique_property_loads += 1;
  };
  ret_ty
}

/// The per-kind transfer function: the inferred result type of `inst_id`
/// from its operand types and the call graph. Kinds without an output return
/// the bottom type. Phis are handled by the engine, never here.
pub(crate) fn infer_inst(
  module: &Module,
  cgp: &dyn CallGraphProvider,
  stats: &mut InferenceStats,
  inst_id: InstId,
) -> Type {
  let inst = module.inst(inst_id);
  match inst.t {
    InstTyp::Un => infer_un(module, inst_id),
    InstTyp::Bin => infer_bin(module, inst_id),
    InstTyp::Phi => unreachable!("phis have a dedicated handler"),

    // Copies and loads propagate the type of what they read.
    InstTyp::LoadStack
    | InstTyp::LoadFrame
    | InstTyp::LoadConst
    | InstTyp::LoadParam
    | InstTyp::Mov
    | InstTyp::SpillMov
    | InstTyp::ImplicitMov => module.value_type(inst.operands[0]),

    // The slot's type stands for the type of the value it holds. A slot with
    // no users has nothing to infer from, and an output may not keep the
    // bottom type, so it falls back to the top.
    InstTyp::AllocStack => {
      if inst.users.is_empty() {
        Type::any()
      } else {
        infer_memory_location_type(module, &MemLoc::Stack(inst_id))
      }
    }

    InstTyp::Call | InstTyp::Construct => infer_base_call(module, cgp, inst_id),
    // Builtin and intrinsic dispatch are not modeled by the call graph.
    InstTyp::CallBuiltin | InstTyp::CallIntrinsic => Type::any(),

    InstTyp::LoadProperty => infer_load_property(module, cgp, stats, inst_id),

    // The checked type was established when the property layout was.
    InstTyp::PrLoad => inst.checked_ty.expect("PrLoad carries a checked type"),

    InstTyp::AllocObject
    | InstTyp::AllocArray
    | InstTyp::AllocObjectLiteral
    | InstTyp::AllocObjectFromBuffer
    | InstTyp::CreateRegExp
    | InstTyp::CreateFunction
    | InstTyp::CreateGenerator
    | InstTyp::GetTemplateObject
    | InstTyp::CreateArguments
    | InstTyp::GetBuiltinClosure
    | InstTyp::GetGlobalObject
    | InstTyp::AddEmptyString
    | InstTyp::AsNumber
    | InstTyp::AsNumeric
    | InstTyp::AsInt32
    | InstTyp::CoerceThisNS => inst.t.inherent_type().unwrap(),

    InstTyp::GetThisNS | InstTyp::CreateThis | InstTyp::GetConstructedObject => Type::OBJECT,

    InstTyp::CreateEnvironment | InstTyp::ResolveEnvironment => Type::ENVIRONMENT,

    InstTyp::GetArgumentsLength => Type::NUMBER,

    InstTyp::DeleteProperty => Type::BOOLEAN,

    // Ideally this would subtract the uninitialized tag from its operand,
    // but that can bottom out when the check always throws.
    InstTyp::ThrowIfEmpty => module.value_type(inst.operands[0]),

    // Results that flow in from outside anything this analysis models.
    InstTyp::TryLoadGlobalProperty
    | InstTyp::LoadFromEnvironment
    | InstTyp::GetArgumentsPropByVal
    | InstTyp::Catch
    | InstTyp::GetNewTarget
    | InstTyp::IteratorBegin
    | InstTyp::IteratorNext
    | InstTyp::IteratorClose
    | InstTyp::ResumeGenerator
    | InstTyp::DirectEval => Type::any(),

    // No output.
    InstTyp::StoreStack
    | InstTyp::StoreFrame
    | InstTyp::StoreProperty
    | InstTyp::StoreOwnProperty
    | InstTyp::StoreGetterSetter
    | InstTyp::TryStoreGlobalProperty
    | InstTyp::PrStore
    | InstTyp::StoreToEnvironment
    | InstTyp::DeclareGlobalVar
    | InstTyp::Debugger
    | InstTyp::ProfilePoint
    | InstTyp::StartGenerator
    | InstTyp::SaveAndYield
    | InstTyp::Branch
    | InstTyp::CondBranch
    | InstTyp::CompareBranch
    | InstTyp::Switch
    | InstTyp::SwitchImm
    | InstTyp::GetPNames
    | InstTyp::GetNextPName
    | InstTyp::Return
    | InstTyp::Throw
    | InstTyp::TryStart
    | InstTyp::TryEnd
    | InstTyp::Unreachable => Type::no_type(),
  }
}
