use crate::il::FuncId;
use crate::il::InstId;
use crate::il::ValueRef;
use crate::types::Type;
use serde::Serialize;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum UnOp {
  Void,
  Typeof,
  Minus,
  Inc,
  Dec,
  Tilde,
  Bang,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum BinOp {
  Eq,
  NotEq,
  StrictEq,
  StrictNotEq,
  Less,
  LessEq,
  Greater,
  GreaterEq,
  In,
  InstanceOf,
  Add,
  Sub,
  Mul,
  Div,
  Exp,
  Mod,
  Shl,
  Shr,
  Ushr,
  BitAnd,
  BitOr,
  BitXor,
}

impl BinOp {
  pub fn is_comparison(self) -> bool {
    matches!(
      self,
      BinOp::Eq
        | BinOp::NotEq
        | BinOp::StrictEq
        | BinOp::StrictNotEq
        | BinOp::Less
        | BinOp::LessEq
        | BinOp::Greater
        | BinOp::GreaterEq
        | BinOp::In
        | BinOp::InstanceOf
    )
  }
}

/// Every instruction kind the inference pass understands.
///
/// Operand layout conventions (positions within `Inst::operands`):
/// - stores put the stored value first, then the address or object,
///   then the property key where applicable;
/// - loads put the address or object first, then the property key;
/// - calls put the callee first, then the arguments in order;
/// - phi operands pair positionally with `Inst::labels`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum InstTyp {
  Un,
  Bin,
  Phi,
  // Stack slots.
  AllocStack,
  LoadStack,
  StoreStack,
  // Closure-captured variables.
  LoadFrame,
  StoreFrame,
  // Parameters, constants, copies.
  LoadParam,
  LoadConst,
  Mov,
  SpillMov,
  ImplicitMov,
  // Calls.
  Call,
  Construct,
  CallBuiltin,
  CallIntrinsic,
  // Properties.
  LoadProperty,
  TryLoadGlobalProperty,
  StoreProperty,
  StoreOwnProperty,
  StoreGetterSetter,
  TryStoreGlobalProperty,
  DeleteProperty,
  // Typed properties (class fields with a checked layout).
  PrLoad,
  PrStore,
  // Allocations and closures.
  AllocObject,
  AllocArray,
  AllocObjectLiteral,
  AllocObjectFromBuffer,
  CreateRegExp,
  CreateFunction,
  CreateGenerator,
  GetTemplateObject,
  CreateArguments,
  GetBuiltinClosure,
  GetGlobalObject,
  // Coercions.
  AddEmptyString,
  AsNumber,
  AsNumeric,
  AsInt32,
  CoerceThisNS,
  // `this` plumbing.
  GetThisNS,
  CreateThis,
  GetConstructedObject,
  // Environments.
  CreateEnvironment,
  ResolveEnvironment,
  StoreToEnvironment,
  LoadFromEnvironment,
  // The arguments object.
  GetArgumentsLength,
  GetArgumentsPropByVal,
  // Exceptions, iterators, generators.
  Catch,
  GetNewTarget,
  IteratorBegin,
  IteratorNext,
  IteratorClose,
  ResumeGenerator,
  StartGenerator,
  SaveAndYield,
  ThrowIfEmpty,
  // Globals and diagnostics.
  DeclareGlobalVar,
  DirectEval,
  Debugger,
  ProfilePoint,
  // Terminators.
  Branch,
  CondBranch,
  CompareBranch,
  Switch,
  SwitchImm,
  GetPNames,
  GetNextPName,
  Return,
  Throw,
  TryStart,
  TryEnd,
  Unreachable,
}

impl InstTyp {
  /// Whether instructions of this kind produce a value. The inference pass
  /// must end with a non-empty type exactly for kinds where this is true.
  pub fn has_output(self) -> bool {
    !matches!(
      self,
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
        | InstTyp::Unreachable
    )
  }

  /// Whether this kind ends a basic block.
  pub fn is_terminator(self) -> bool {
    matches!(
      self,
      InstTyp::Branch
        | InstTyp::CondBranch
        | InstTyp::CompareBranch
        | InstTyp::Switch
        | InstTyp::SwitchImm
        | InstTyp::GetPNames
        | InstTyp::GetNextPName
        | InstTyp::Return
        | InstTyp::Throw
        | InstTyp::Unreachable
    )
  }

  /// The type fixed by the kind alone, independent of operands. Cleared
  /// instructions are reset to this instead of the bottom type, and the
  /// transfer function returns it unconditionally.
  pub fn inherent_type(self) -> Option<Type> {
    match self {
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
      | InstTyp::GetGlobalObject => Some(Type::OBJECT),
      InstTyp::AddEmptyString => Some(Type::STRING),
      InstTyp::AsNumber => Some(Type::NUMBER),
      InstTyp::AsNumeric => Some(Type::NUMBER | Type::BIGINT),
      InstTyp::AsInt32 => Some(Type::INT32),
      InstTyp::CoerceThisNS => Some(Type::OBJECT),
      _ => None,
    }
  }
}

/// A single IR instruction. Kind-specific data lives in the shared fields;
/// the `as_*` accessors give a typed view and panic on kind mismatch.
#[derive(Clone, Debug, Serialize)]
pub struct Inst {
  pub t: InstTyp,
  pub operands: Vec<ValueRef>,
  /// Phi predecessor labels (parallel to operands) or branch target labels.
  pub labels: Vec<u32>,
  pub un_op: Option<UnOp>,
  pub bin_op: Option<BinOp>,
  /// The compile-time checked type carried by PrLoad.
  pub checked_ty: Option<Type>,
  pub ty: Type,
  pub users: Vec<InstId>,
  pub owner: FuncId,
}

impl Inst {
  pub fn new(owner: FuncId, t: InstTyp) -> Self {
    Self {
      t,
      operands: Vec::new(),
      labels: Vec::new(),
      un_op: None,
      bin_op: None,
      checked_ty: None,
      // Freshly built IR is untyped until the pass runs. Starting from the
      // top keeps the first run's pre-pass snapshot from narrowing anything.
      ty: Type::any(),
      users: Vec::new(),
      owner,
    }
  }

  pub fn has_output(&self) -> bool {
    self.t.has_output()
  }

  pub fn as_un(&self) -> (UnOp, ValueRef) {
    assert_eq!(self.t, InstTyp::Un);
    (self.un_op.unwrap(), self.operands[0])
  }

  pub fn as_bin(&self) -> (BinOp, ValueRef, ValueRef) {
    assert_eq!(self.t, InstTyp::Bin);
    (self.bin_op.unwrap(), self.operands[0], self.operands[1])
  }

  /// Phi entries as (predecessor label, incoming value) pairs.
  pub fn phi_entries(&self) -> impl Iterator<Item = (u32, ValueRef)> + '_ {
    assert_eq!(self.t, InstTyp::Phi);
    self.labels.iter().copied().zip(self.operands.iter().copied())
  }

  /// The stored value of any store-to-memory kind.
  pub fn stored_value(&self) -> ValueRef {
    assert!(matches!(
      self.t,
      InstTyp::StoreStack
        | InstTyp::StoreFrame
        | InstTyp::StoreProperty
        | InstTyp::StoreOwnProperty
        | InstTyp::TryStoreGlobalProperty
        | InstTyp::PrStore
        | InstTyp::StoreToEnvironment
    ));
    self.operands[0]
  }

  pub fn as_load_property(&self) -> (ValueRef, ValueRef) {
    assert!(matches!(
      self.t,
      InstTyp::LoadProperty | InstTyp::TryLoadGlobalProperty
    ));
    (self.operands[0], self.operands[1])
  }

  /// (stored value, object, property key) of a keyed property store.
  pub fn as_store_property(&self) -> (ValueRef, ValueRef, ValueRef) {
    assert!(matches!(
      self.t,
      InstTyp::StoreProperty | InstTyp::StoreOwnProperty | InstTyp::TryStoreGlobalProperty
    ));
    (self.operands[0], self.operands[1], self.operands[2])
  }

  pub fn callee(&self) -> ValueRef {
    assert!(matches!(
      self.t,
      InstTyp::Call | InstTyp::Construct | InstTyp::CallBuiltin
    ));
    self.operands[0]
  }

  pub fn call_args(&self) -> &[ValueRef] {
    assert!(matches!(
      self.t,
      InstTyp::Call | InstTyp::Construct | InstTyp::CallBuiltin
    ));
    &self.operands[1..]
  }
}
