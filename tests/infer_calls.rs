mod common;

use common::infer;
use infer_js::il::builder::ModuleBuilder;
use infer_js::il::inst::BinOp;
use infer_js::il::inst::InstTyp;
use infer_js::Type;

#[test]
fn known_caller_types_params_and_return() {
  // function f(x) { if (x) return "a"; else return 3; }
  // f(true);
  let mut b = ModuleBuilder::new();
  let f = b.new_function("f");
  let x = b.add_param(f, "x");
  let entry = b.new_block(f);
  let then_ = b.new_block(f);
  let else_ = b.new_block(f);
  let cond = b.load_param(f, entry, x);
  b.cond_branch(f, entry, cond, then_, else_);
  let a = b.lit_str("a");
  b.ret(f, then_, a);
  let three = b.lit_num(3.0);
  b.ret(f, else_, three);

  let caller = b.new_function("caller");
  let entry = b.new_block(caller);
  let closure = b.create_function(caller, entry, f);
  let t = b.lit_bool(true);
  let call = b.call(caller, entry, closure, vec![t]);
  b.ret(caller, entry, call);

  let mut module = b.finish();
  infer(&mut module);

  assert_eq!(module.param(x).ty, Type::BOOLEAN);
  assert_eq!(module.inst(cond).ty, Type::BOOLEAN);
  assert_eq!(module.func(f).ret_ty, Type::STRING | Type::NUMBER);
  assert_eq!(module.inst(call).ty, Type::STRING | Type::NUMBER);
}

#[test]
fn identity_function_unions_both_callsites() {
  // function id(x) { return x; } id(1); id("s");
  let mut b = ModuleBuilder::new();
  let id = b.new_function("id");
  let x = b.add_param(id, "x");
  let entry = b.new_block(id);
  let loaded = b.load_param(id, entry, x);
  b.ret(id, entry, loaded);

  let caller = b.new_function("caller");
  let entry = b.new_block(caller);
  let closure = b.create_function(caller, entry, id);
  let one = b.lit_num(1.0);
  let s = b.lit_str("s");
  let call_num = b.call(caller, entry, closure, vec![one]);
  let call_str = b.call(caller, entry, closure, vec![s]);
  let undef = b.lit_undefined();
  b.ret(caller, entry, undef);

  let mut module = b.finish();
  infer(&mut module);

  assert_eq!(module.param(x).ty, Type::NUMBER | Type::STRING);
  assert_eq!(module.func(id).ret_ty, Type::NUMBER | Type::STRING);
  assert_eq!(module.inst(call_num).ty, Type::NUMBER | Type::STRING);
  assert_eq!(module.inst(call_str).ty, Type::NUMBER | Type::STRING);
}

#[test]
fn missing_argument_is_undefined() {
  let mut b = ModuleBuilder::new();
  let f = b.new_function("f");
  let x = b.add_param(f, "x");
  let entry = b.new_block(f);
  let loaded = b.load_param(f, entry, x);
  b.ret(f, entry, loaded);

  let caller = b.new_function("caller");
  let entry = b.new_block(caller);
  let closure = b.create_function(caller, entry, f);
  let call = b.call(caller, entry, closure, vec![]);
  b.ret(caller, entry, call);

  let mut module = b.finish();
  infer(&mut module);

  assert_eq!(module.param(x).ty, Type::UNDEFINED);
  assert_eq!(module.func(f).ret_ty, Type::UNDEFINED);
}

#[test]
fn escaped_closure_gives_params_any() {
  let mut b = ModuleBuilder::new();
  let f = b.new_function("f");
  let x = b.add_param(f, "x");
  let entry = b.new_block(f);
  let loaded = b.load_param(f, entry, x);
  b.ret(f, entry, loaded);

  let caller = b.new_function("caller");
  let held = b.add_variable(caller, "held");
  let entry = b.new_block(caller);
  let closure = b.create_function(caller, entry, f);
  b.store_frame(caller, entry, closure, held);
  let undef = b.lit_undefined();
  b.ret(caller, entry, undef);

  let mut module = b.finish();
  infer(&mut module);

  assert_eq!(module.param(x).ty, Type::any());
  assert_eq!(module.func(f).ret_ty, Type::any());
}

#[test]
fn unknown_callee_result_is_any() {
  // Calling through a parameter: nothing is known about the callee, and
  // adding one to the result can still stringify but cannot be a BigInt.
  let mut b = ModuleBuilder::new();
  let f = b.new_function("f");
  let p = b.add_param(f, "callee");
  let entry = b.new_block(f);
  let callee = b.load_param(f, entry, p);
  let call = b.call(f, entry, callee, vec![]);
  let one = b.lit_num(1.0);
  let plus = b.bin(f, entry, BinOp::Add, call, one);
  b.ret(f, entry, plus);

  let mut module = b.finish();
  infer(&mut module);

  assert_eq!(module.inst(call).ty, Type::any());
  assert_eq!(module.inst(plus).ty, Type::NUMBER | Type::STRING);
}

#[test]
fn builtin_call_is_any() {
  let mut b = ModuleBuilder::new();
  let f = b.new_function("f");
  let entry = b.new_block(f);
  let builtin = b.emit(f, entry, InstTyp::GetBuiltinClosure, []);
  let call = b.call_builtin(f, entry, builtin, vec![]);
  b.ret(f, entry, call);

  let mut module = b.finish();
  infer(&mut module);

  assert_eq!(module.inst(builtin).ty, Type::OBJECT);
  assert_eq!(module.inst(call).ty, Type::any());
}

#[test]
fn construct_unions_callee_return_types() {
  let mut b = ModuleBuilder::new();
  let f = b.new_function("ctor");
  let entry = b.new_block(f);
  let one = b.lit_num(1.0);
  b.ret(f, entry, one);

  let caller = b.new_function("caller");
  let entry = b.new_block(caller);
  let closure = b.create_function(caller, entry, f);
  let new_ = b.construct(caller, entry, closure, vec![]);
  b.ret(caller, entry, new_);

  let mut module = b.finish();
  infer(&mut module);

  assert_eq!(module.inst(new_).ty, Type::NUMBER);
}

#[test]
fn generator_inner_return_is_any() {
  let mut b = ModuleBuilder::new();
  let inner = b.new_function("gen_inner");
  b.mark_generator_inner(inner);
  let entry = b.new_block(inner);
  let one = b.lit_num(1.0);
  b.ret(inner, entry, one);

  let outer = b.new_function("outer");
  let entry = b.new_block(outer);
  let gen = b.create_generator(outer, entry, inner);
  b.ret(outer, entry, gen);

  let mut module = b.finish();
  infer(&mut module);

  // Resumption can inject any value, so the literal return does not pin it.
  assert_eq!(module.func(inner).ret_ty, Type::any());
  assert_eq!(module.inst(gen).ty, Type::OBJECT);
}
