pub mod builder;
pub mod inst;
pub mod verify;

use crate::il::inst::Inst;
use crate::types::Type;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct FuncId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct InstId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct ParamId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct VarId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct LitId(pub u32);

impl fmt::Display for FuncId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "fn{}", self.0)
  }
}

impl fmt::Display for InstId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "%{}", self.0)
  }
}

impl fmt::Display for ParamId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "param{}", self.0)
  }
}

impl fmt::Display for VarId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "var{}", self.0)
  }
}

/// The common supertype of everything that can appear as an operand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum ValueRef {
  Inst(InstId),
  Param(ParamId),
  Var(VarId),
  Literal(LitId),
  Function(FuncId),
}

impl From<InstId> for ValueRef {
  fn from(id: InstId) -> Self {
    ValueRef::Inst(id)
  }
}

impl From<ParamId> for ValueRef {
  fn from(id: ParamId) -> Self {
    ValueRef::Param(id)
  }
}

impl From<VarId> for ValueRef {
  fn from(id: VarId) -> Self {
    ValueRef::Var(id)
  }
}

impl From<LitId> for ValueRef {
  fn from(id: LitId) -> Self {
    ValueRef::Literal(id)
  }
}

impl From<FuncId> for ValueRef {
  fn from(id: FuncId) -> Self {
    ValueRef::Function(id)
  }
}

/// Literals are interned per module, so two operands referring to an equal
/// literal share a `LitId` and compare equal as `ValueRef`s. Property-key
/// matching relies on this.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum Literal {
  Undefined,
  Null,
  Bool(bool),
  Num(OrderedFloat<f64>),
  Str(String),
  /// Digits only; the pass needs the tag, not the value.
  BigInt(String),
}

impl Literal {
  /// Literal types are fixed by the kind and never change.
  pub fn ty(&self) -> Type {
    match self {
      Literal::Undefined => Type::UNDEFINED,
      Literal::Null => Type::NULL,
      Literal::Bool(_) => Type::BOOLEAN,
      Literal::Num(_) => Type::NUMBER,
      Literal::Str(_) => Type::STRING,
      Literal::BigInt(_) => Type::BIGINT,
    }
  }
}

/// A formal parameter of a function.
#[derive(Clone, Debug, Serialize)]
pub struct Param {
  pub name: String,
  pub ty: Type,
}

/// A closure-captured slot owned by a function's scope. Loaded and stored via
/// LoadFrame/StoreFrame, possibly from inner functions.
#[derive(Clone, Debug, Serialize)]
pub struct Variable {
  pub name: String,
  pub owner: FuncId,
  pub users: Vec<InstId>,
  pub ty: Type,
}

#[derive(Clone, Debug, Serialize)]
pub struct Block {
  pub label: u32,
  pub insts: Vec<InstId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Function {
  pub name: String,
  pub params: Vec<ParamId>,
  pub variables: Vec<VarId>,
  pub blocks: Vec<Block>,
  /// The function value's type is its return type; closure objects are the
  /// results of the CreateFunction family.
  pub ret_ty: Type,
  /// Inner function of a generator. Resumption can inject any value, so its
  /// return type is pinned to the top.
  pub is_generator_inner: bool,
  /// Instructions anywhere in the module that reference this function as a
  /// value (closure creation, direct callees).
  pub users: Vec<InstId>,
}

/// A whole program. Arenas own every IR entity; ids index into them. Arena
/// order is the stable iteration order the pass relies on.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Module {
  pub functions: Vec<Function>,
  pub insts: Vec<Inst>,
  pub params: Vec<Param>,
  pub variables: Vec<Variable>,
  pub literals: Vec<Literal>,
}

impl Module {
  pub fn func(&self, id: FuncId) -> &Function {
    &self.functions[id.0 as usize]
  }

  pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
    &mut self.functions[id.0 as usize]
  }

  pub fn inst(&self, id: InstId) -> &Inst {
    &self.insts[id.0 as usize]
  }

  pub fn inst_mut(&mut self, id: InstId) -> &mut Inst {
    &mut self.insts[id.0 as usize]
  }

  pub fn param(&self, id: ParamId) -> &Param {
    &self.params[id.0 as usize]
  }

  pub fn param_mut(&mut self, id: ParamId) -> &mut Param {
    &mut self.params[id.0 as usize]
  }

  pub fn variable(&self, id: VarId) -> &Variable {
    &self.variables[id.0 as usize]
  }

  pub fn variable_mut(&mut self, id: VarId) -> &mut Variable {
    &mut self.variables[id.0 as usize]
  }

  pub fn literal(&self, id: LitId) -> &Literal {
    &self.literals[id.0 as usize]
  }

  pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
    (0..self.functions.len() as u32).map(FuncId)
  }

  /// Instruction ids of a function in block order then instruction order.
  pub fn func_inst_ids(&self, func: FuncId) -> impl Iterator<Item = InstId> + '_ {
    self
      .func(func)
      .blocks
      .iter()
      .flat_map(|b| b.insts.iter().copied())
  }

  /// The current type of any value.
  pub fn value_type(&self, v: ValueRef) -> Type {
    match v {
      ValueRef::Inst(id) => self.inst(id).ty,
      ValueRef::Param(id) => self.param(id).ty,
      ValueRef::Var(id) => self.variable(id).ty,
      ValueRef::Literal(id) => self.literal(id).ty(),
      ValueRef::Function(id) => self.func(id).ret_ty,
    }
  }
}
