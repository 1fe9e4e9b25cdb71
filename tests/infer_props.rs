mod common;

use common::infer;
use common::single_function;
use infer_js::il::verify::verify_module;
use infer_js::Type;
use infer_js::TypeInference;

#[test]
fn owned_property_load_takes_store_type() {
  // let o = { k: 7 }; o.k
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let k = b.lit_str("k");
  let seven = b.lit_num(7.0);
  b.store_own_property(f, entry, seven, obj, k);
  let load = b.load_property(f, entry, obj, k);
  b.ret(f, entry, load);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(load).ty, Type::NUMBER);
}

#[test]
fn second_store_widens_the_load() {
  // let o = { k: 7 }; o.k = "s"; o.k
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let k = b.lit_str("k");
  let seven = b.lit_num(7.0);
  let s = b.lit_str("s");
  b.store_own_property(f, entry, seven, obj, k);
  b.store_property(f, entry, s, obj, k);
  let load = b.load_property(f, entry, obj, k);
  b.ret(f, entry, load);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(load).ty, Type::NUMBER | Type::STRING);
}

#[test]
fn stores_to_other_keys_do_not_contribute() {
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let k = b.lit_str("k");
  let j = b.lit_str("j");
  let seven = b.lit_num(7.0);
  let s = b.lit_str("s");
  b.store_own_property(f, entry, seven, obj, k);
  b.store_own_property(f, entry, s, obj, j);
  let load = b.load_property(f, entry, obj, k);
  b.ret(f, entry, load);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(load).ty, Type::NUMBER);
}

#[test]
fn load_of_unowned_property_is_any() {
  // The property may come off the prototype chain.
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let k = b.lit_str("k");
  let j = b.lit_str("j");
  let seven = b.lit_num(7.0);
  b.store_own_property(f, entry, seven, obj, k);
  let load = b.load_property(f, entry, obj, j);
  b.ret(f, entry, load);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(load).ty, Type::any());
}

#[test]
fn escaping_receiver_is_any() {
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let k = b.lit_str("k");
  let seven = b.lit_num(7.0);
  b.store_own_property(f, entry, seven, obj, k);
  let load = b.load_property(f, entry, obj, k);
  // Returning the object publishes it; callers may store anything.
  b.ret(f, entry, obj);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(load).ty, Type::any());
}

#[test]
fn getter_setter_defeats_store_tracking() {
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let k = b.lit_str("k");
  let seven = b.lit_num(7.0);
  let undef = b.lit_undefined();
  b.store_own_property(f, entry, seven, obj, k);
  b.store_getter_setter(f, entry, undef, undef, obj, k);
  let load = b.load_property(f, entry, obj, k);
  b.ret(f, entry, load);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(load).ty, Type::any());
}

#[test]
fn array_element_load_is_any() {
  // Array receiver analysis is off; the provider reports unknown.
  let (mut b, f, entry) = single_function();
  let arr = b.alloc_array(f, entry);
  let zero = b.lit_num(0.0);
  let seven = b.lit_num(7.0);
  b.store_property(f, entry, seven, arr, zero);
  let load = b.load_property(f, entry, arr, zero);
  b.ret(f, entry, load);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(arr).ty, Type::OBJECT);
  assert_eq!(module.inst(load).ty, Type::any());
}

#[test]
fn unique_store_loads_are_counted() {
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let k = b.lit_str("k");
  let seven = b.lit_num(7.0);
  b.store_own_property(f, entry, seven, obj, k);
  let load = b.load_property(f, entry, obj, k);
  b.ret(f, entry, load);

  let mut module = b.finish();
  verify_module(&module).expect("test IR should verify");
  let mut pass = TypeInference::new();
  assert!(pass.run_on_module(&mut module));
  assert!(pass.stats().unique_property_loads > 0);
  assert!(pass.stats().insts_typed > 0);
}

#[test]
fn pr_load_uses_its_checked_type() {
  let (mut b, f, entry) = single_function();
  let obj = b.alloc_object(f, entry);
  let loaded = b.pr_load(f, entry, obj, Type::NUMBER);
  b.ret(f, entry, loaded);

  let mut module = b.finish();
  infer(&mut module);
  assert_eq!(module.inst(loaded).ty, Type::NUMBER);
}
