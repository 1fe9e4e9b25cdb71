use crate::il::inst::BinOp;
use crate::il::inst::Inst;
use crate::il::inst::InstTyp;
use crate::il::inst::UnOp;
use crate::il::Block;
use crate::il::FuncId;
use crate::il::Function;
use crate::il::InstId;
use crate::il::LitId;
use crate::il::Literal;
use crate::il::Module;
use crate::il::Param;
use crate::il::ParamId;
use crate::il::ValueRef;
use crate::il::VarId;
use crate::il::Variable;
use crate::types::Type;
use ahash::HashMap;
use ahash::HashMapExt;
use ordered_float::OrderedFloat;

/// Constructs a [`Module`] while maintaining def-use lists and literal
/// interning. Instructions are appended to a (function, block) position; block
/// labels are allocated per function.
pub struct ModuleBuilder {
  module: Module,
  literal_index: HashMap<Literal, LitId>,
}

impl ModuleBuilder {
  pub fn new() -> Self {
    Self {
      module: Module::default(),
      literal_index: HashMap::new(),
    }
  }

  pub fn finish(self) -> Module {
    self.module
  }

  pub fn new_function(&mut self, name: impl Into<String>) -> FuncId {
    let id = FuncId(self.module.functions.len() as u32);
    self.module.functions.push(Function {
      name: name.into(),
      params: Vec::new(),
      variables: Vec::new(),
      blocks: Vec::new(),
      ret_ty: Type::any(),
      is_generator_inner: false,
      users: Vec::new(),
    });
    id
  }

  pub fn mark_generator_inner(&mut self, func: FuncId) {
    self.module.func_mut(func).is_generator_inner = true;
  }

  pub fn add_param(&mut self, func: FuncId, name: impl Into<String>) -> ParamId {
    let id = ParamId(self.module.params.len() as u32);
    self.module.params.push(Param {
      name: name.into(),
      ty: Type::any(),
    });
    self.module.func_mut(func).params.push(id);
    id
  }

  pub fn add_variable(&mut self, func: FuncId, name: impl Into<String>) -> VarId {
    let id = VarId(self.module.variables.len() as u32);
    self.module.variables.push(Variable {
      name: name.into(),
      owner: func,
      users: Vec::new(),
      ty: Type::any(),
    });
    self.module.func_mut(func).variables.push(id);
    id
  }

  pub fn new_block(&mut self, func: FuncId) -> u32 {
    let f = self.module.func_mut(func);
    let label = f.blocks.len() as u32;
    f.blocks.push(Block {
      label,
      insts: Vec::new(),
    });
    label
  }

  fn intern(&mut self, lit: Literal) -> ValueRef {
    let id = *self.literal_index.entry(lit.clone()).or_insert_with(|| {
      let id = LitId(self.module.literals.len() as u32);
      self.module.literals.push(lit);
      id
    });
    ValueRef::Literal(id)
  }

  pub fn lit_undefined(&mut self) -> ValueRef {
    self.intern(Literal::Undefined)
  }

  pub fn lit_null(&mut self) -> ValueRef {
    self.intern(Literal::Null)
  }

  pub fn lit_bool(&mut self, v: bool) -> ValueRef {
    self.intern(Literal::Bool(v))
  }

  pub fn lit_num(&mut self, v: f64) -> ValueRef {
    self.intern(Literal::Num(OrderedFloat(v)))
  }

  pub fn lit_str(&mut self, v: impl Into<String>) -> ValueRef {
    self.intern(Literal::Str(v.into()))
  }

  pub fn lit_bigint(&mut self, digits: impl Into<String>) -> ValueRef {
    self.intern(Literal::BigInt(digits.into()))
  }

  /// Append a finished instruction, registering it as a user of each operand.
  fn push(&mut self, func: FuncId, block: u32, inst: Inst) -> InstId {
    let id = InstId(self.module.insts.len() as u32);
    for op in &inst.operands {
      match *op {
        ValueRef::Inst(i) => self.module.inst_mut(i).users.push(id),
        ValueRef::Var(v) => self.module.variable_mut(v).users.push(id),
        ValueRef::Function(f) => self.module.func_mut(f).users.push(id),
        ValueRef::Param(_) | ValueRef::Literal(_) => {}
      }
    }
    self.module.insts.push(inst);
    let b = self
      .module
      .func_mut(func)
      .blocks
      .iter_mut()
      .find(|b| b.label == block)
      .expect("appending to unknown block");
    b.insts.push(id);
    id
  }

  /// Kinds without extra payload go through here directly.
  pub fn emit(
    &mut self,
    func: FuncId,
    block: u32,
    t: InstTyp,
    operands: impl IntoIterator<Item = ValueRef>,
  ) -> InstId {
    let mut inst = Inst::new(func, t);
    inst.operands = operands.into_iter().collect();
    self.push(func, block, inst)
  }

  pub fn un(&mut self, func: FuncId, block: u32, op: UnOp, v: impl Into<ValueRef>) -> InstId {
    let mut inst = Inst::new(func, InstTyp::Un);
    inst.un_op = Some(op);
    inst.operands = vec![v.into()];
    self.push(func, block, inst)
  }

  pub fn bin(
    &mut self,
    func: FuncId,
    block: u32,
    op: BinOp,
    l: impl Into<ValueRef>,
    r: impl Into<ValueRef>,
  ) -> InstId {
    let mut inst = Inst::new(func, InstTyp::Bin);
    inst.bin_op = Some(op);
    inst.operands = vec![l.into(), r.into()];
    self.push(func, block, inst)
  }

  pub fn phi(&mut self, func: FuncId, block: u32, entries: Vec<(u32, ValueRef)>) -> InstId {
    let mut inst = Inst::new(func, InstTyp::Phi);
    inst.labels = entries.iter().map(|(label, _)| *label).collect();
    inst.operands = entries.into_iter().map(|(_, v)| v).collect();
    self.push(func, block, inst)
  }

  pub fn alloc_stack(&mut self, func: FuncId, block: u32) -> InstId {
    self.emit(func, block, InstTyp::AllocStack, [])
  }

  pub fn load_stack(&mut self, func: FuncId, block: u32, slot: InstId) -> InstId {
    self.emit(func, block, InstTyp::LoadStack, [slot.into()])
  }

  pub fn store_stack(
    &mut self,
    func: FuncId,
    block: u32,
    value: impl Into<ValueRef>,
    slot: InstId,
  ) -> InstId {
    self.emit(func, block, InstTyp::StoreStack, [value.into(), slot.into()])
  }

  pub fn load_frame(&mut self, func: FuncId, block: u32, var: VarId) -> InstId {
    self.emit(func, block, InstTyp::LoadFrame, [var.into()])
  }

  pub fn store_frame(
    &mut self,
    func: FuncId,
    block: u32,
    value: impl Into<ValueRef>,
    var: VarId,
  ) -> InstId {
    self.emit(func, block, InstTyp::StoreFrame, [value.into(), var.into()])
  }

  pub fn load_param(&mut self, func: FuncId, block: u32, param: ParamId) -> InstId {
    self.emit(func, block, InstTyp::LoadParam, [param.into()])
  }

  pub fn load_const(&mut self, func: FuncId, block: u32, lit: ValueRef) -> InstId {
    assert!(matches!(lit, ValueRef::Literal(_)));
    self.emit(func, block, InstTyp::LoadConst, [lit])
  }

  pub fn mov(&mut self, func: FuncId, block: u32, v: impl Into<ValueRef>) -> InstId {
    self.emit(func, block, InstTyp::Mov, [v.into()])
  }

  pub fn call(
    &mut self,
    func: FuncId,
    block: u32,
    callee: impl Into<ValueRef>,
    args: Vec<ValueRef>,
  ) -> InstId {
    let operands = std::iter::once(callee.into()).chain(args).collect::<Vec<_>>();
    self.emit(func, block, InstTyp::Call, operands)
  }

  pub fn construct(
    &mut self,
    func: FuncId,
    block: u32,
    callee: impl Into<ValueRef>,
    args: Vec<ValueRef>,
  ) -> InstId {
    let operands = std::iter::once(callee.into()).chain(args).collect::<Vec<_>>();
    self.emit(func, block, InstTyp::Construct, operands)
  }

  pub fn call_builtin(
    &mut self,
    func: FuncId,
    block: u32,
    callee: impl Into<ValueRef>,
    args: Vec<ValueRef>,
  ) -> InstId {
    let operands = std::iter::once(callee.into()).chain(args).collect::<Vec<_>>();
    self.emit(func, block, InstTyp::CallBuiltin, operands)
  }

  pub fn load_property(
    &mut self,
    func: FuncId,
    block: u32,
    obj: impl Into<ValueRef>,
    key: ValueRef,
  ) -> InstId {
    self.emit(func, block, InstTyp::LoadProperty, [obj.into(), key])
  }

  pub fn store_property(
    &mut self,
    func: FuncId,
    block: u32,
    value: impl Into<ValueRef>,
    obj: impl Into<ValueRef>,
    key: ValueRef,
  ) -> InstId {
    self.emit(
      func,
      block,
      InstTyp::StoreProperty,
      [value.into(), obj.into(), key],
    )
  }

  pub fn store_own_property(
    &mut self,
    func: FuncId,
    block: u32,
    value: impl Into<ValueRef>,
    obj: impl Into<ValueRef>,
    key: ValueRef,
  ) -> InstId {
    self.emit(
      func,
      block,
      InstTyp::StoreOwnProperty,
      [value.into(), obj.into(), key],
    )
  }

  pub fn store_getter_setter(
    &mut self,
    func: FuncId,
    block: u32,
    getter: impl Into<ValueRef>,
    setter: impl Into<ValueRef>,
    obj: impl Into<ValueRef>,
    key: ValueRef,
  ) -> InstId {
    self.emit(
      func,
      block,
      InstTyp::StoreGetterSetter,
      [getter.into(), setter.into(), obj.into(), key],
    )
  }

  pub fn delete_property(
    &mut self,
    func: FuncId,
    block: u32,
    obj: impl Into<ValueRef>,
    key: ValueRef,
  ) -> InstId {
    self.emit(func, block, InstTyp::DeleteProperty, [obj.into(), key])
  }

  pub fn pr_load(
    &mut self,
    func: FuncId,
    block: u32,
    obj: impl Into<ValueRef>,
    checked: Type,
  ) -> InstId {
    let mut inst = Inst::new(func, InstTyp::PrLoad);
    inst.checked_ty = Some(checked);
    inst.operands = vec![obj.into()];
    self.push(func, block, inst)
  }

  pub fn pr_store(
    &mut self,
    func: FuncId,
    block: u32,
    value: impl Into<ValueRef>,
    obj: impl Into<ValueRef>,
  ) -> InstId {
    self.emit(func, block, InstTyp::PrStore, [value.into(), obj.into()])
  }

  pub fn alloc_object(&mut self, func: FuncId, block: u32) -> InstId {
    self.emit(func, block, InstTyp::AllocObject, [])
  }

  pub fn alloc_array(&mut self, func: FuncId, block: u32) -> InstId {
    self.emit(func, block, InstTyp::AllocArray, [])
  }

  pub fn create_function(&mut self, func: FuncId, block: u32, target: FuncId) -> InstId {
    self.emit(func, block, InstTyp::CreateFunction, [target.into()])
  }

  pub fn create_generator(&mut self, func: FuncId, block: u32, target: FuncId) -> InstId {
    self.emit(func, block, InstTyp::CreateGenerator, [target.into()])
  }

  pub fn throw_if_empty(&mut self, func: FuncId, block: u32, v: impl Into<ValueRef>) -> InstId {
    self.emit(func, block, InstTyp::ThrowIfEmpty, [v.into()])
  }

  pub fn ret(&mut self, func: FuncId, block: u32, v: impl Into<ValueRef>) -> InstId {
    self.emit(func, block, InstTyp::Return, [v.into()])
  }

  pub fn branch(&mut self, func: FuncId, block: u32, target: u32) -> InstId {
    let mut inst = Inst::new(func, InstTyp::Branch);
    inst.labels = vec![target];
    self.push(func, block, inst)
  }

  pub fn cond_branch(
    &mut self,
    func: FuncId,
    block: u32,
    cond: impl Into<ValueRef>,
    on_true: u32,
    on_false: u32,
  ) -> InstId {
    let mut inst = Inst::new(func, InstTyp::CondBranch);
    inst.operands = vec![cond.into()];
    inst.labels = vec![on_true, on_false];
    self.push(func, block, inst)
  }

  pub fn throw(&mut self, func: FuncId, block: u32, v: impl Into<ValueRef>) -> InstId {
    self.emit(func, block, InstTyp::Throw, [v.into()])
  }

  pub fn unreachable(&mut self, func: FuncId, block: u32) -> InstId {
    self.emit(func, block, InstTyp::Unreachable, [])
  }
}

impl Default for ModuleBuilder {
  fn default() -> Self {
    Self::new()
  }
}
