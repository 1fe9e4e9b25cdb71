use crate::il::inst::InstTyp;
use crate::il::FuncId;
use crate::il::InstId;
use crate::il::Module;
use crate::il::ValueRef;
use ahash::HashMap;
use ahash::HashMapExt;
use itertools::Itertools;
use tracing::debug;

/// Answers the inter-procedural reachability queries the inference pass asks.
///
/// `None` means unknown: the function, call, or receiver may flow somewhere
/// the provider cannot enumerate, so any result type is possible. When a
/// query returns `Some`, the set is complete, and its order is a fixed
/// function of module structure (never of hash iteration).
pub trait CallGraphProvider {
  /// Call and construct instructions that may invoke `func`.
  fn known_callsites(&self, func: FuncId) -> Option<&[InstId]>;

  /// Functions a call or construct instruction may invoke.
  fn known_callees(&self, call: InstId) -> Option<&[FuncId]>;

  /// Allocation sites whose objects may reach a property load's receiver.
  fn known_receivers(&self, load: InstId) -> Option<&[InstId]>;

  /// Property stores that may write to objects from an allocation site.
  fn known_stores(&self, alloc: InstId) -> Option<&[InstId]>;
}

/// A conservative provider built per function from def-use lists.
///
/// Precision is intentionally local: a callee is only known when the callee
/// operand is a closure-creation instruction or a direct function reference,
/// a callsite set is only known when every closure for the function is used
/// exclusively as a callee, and a receiver is only known when it is a plain
/// object allocation whose uses all stay property-shaped. Array receivers
/// are reported unknown even though the transfer code can union element
/// stores; index-insensitive unioning for arrays has not been validated.
pub struct SimpleCallGraphProvider {
  func: FuncId,
  callsites: Option<Vec<InstId>>,
  callees: HashMap<InstId, Option<Vec<FuncId>>>,
  receivers: HashMap<InstId, Option<Vec<InstId>>>,
  stores: HashMap<InstId, Option<Vec<InstId>>>,
}

impl SimpleCallGraphProvider {
  /// Analyze `func` against the module. Only structure is read, so the
  /// provider stays valid while the pass rewrites types.
  pub fn build(module: &Module, func: FuncId) -> Self {
    let callsites = collect_callsites(module, func);
    if callsites.is_none() {
      debug!(func = %func, "callsites unknown");
    };

    let mut callees = HashMap::new();
    let mut receivers = HashMap::new();
    let mut stores = HashMap::new();
    for inst_id in module.func_inst_ids(func).collect_vec() {
      let inst = module.inst(inst_id);
      match inst.t {
        InstTyp::Call | InstTyp::Construct => {
          callees.insert(inst_id, resolve_callees(module, inst_id));
        }
        InstTyp::LoadProperty => {
          let recv = resolve_receivers(module, inst_id);
          if let Some(recv) = &recv {
            for &alloc in recv {
              stores
                .entry(alloc)
                .or_insert_with(|| collect_stores(module, alloc));
            }
          };
          receivers.insert(inst_id, recv);
        }
        _ => {}
      }
    }

    Self {
      func,
      callsites,
      callees,
      receivers,
      stores,
    }
  }
}

impl CallGraphProvider for SimpleCallGraphProvider {
  fn known_callsites(&self, func: FuncId) -> Option<&[InstId]> {
    assert_eq!(func, self.func, "provider was built for another function");
    self.callsites.as_deref()
  }

  fn known_callees(&self, call: InstId) -> Option<&[FuncId]> {
    self
      .callees
      .get(&call)
      .expect("not a call instruction of this function")
      .as_deref()
  }

  fn known_receivers(&self, load: InstId) -> Option<&[InstId]> {
    self
      .receivers
      .get(&load)
      .expect("not a property load of this function")
      .as_deref()
  }

  fn known_stores(&self, alloc: InstId) -> Option<&[InstId]> {
    self.stores.get(&alloc).and_then(|s| s.as_deref())
  }
}

/// All callsites of `func`, or `None` when any closure escapes.
fn collect_callsites(module: &Module, func: FuncId) -> Option<Vec<InstId>> {
  let mut sites = Vec::new();
  for &user in &module.func(func).users {
    let inst = module.inst(user);
    match inst.t {
      InstTyp::CreateFunction | InstTyp::CreateGenerator => {
        // The closure object must only ever be called.
        for &closure_user in &inst.users {
          if !is_exclusive_callee(module, closure_user, ValueRef::Inst(user)) {
            return None;
          }
          sites.push(closure_user);
        }
      }
      // A direct function reference used as a callee.
      InstTyp::Call | InstTyp::Construct
        if is_exclusive_callee(module, user, ValueRef::Function(func)) =>
      {
        sites.push(user);
      }
      _ => return None,
    }
  }
  sites.sort_unstable();
  sites.dedup();
  Some(sites)
}

/// True when `call` is a call or construct using `value` as the callee and
/// nowhere among the arguments.
fn is_exclusive_callee(module: &Module, call: InstId, value: ValueRef) -> bool {
  let inst = module.inst(call);
  if !matches!(inst.t, InstTyp::Call | InstTyp::Construct) {
    return false;
  }
  inst.callee() == value && !inst.call_args().contains(&value)
}

fn resolve_callees(module: &Module, call: InstId) -> Option<Vec<FuncId>> {
  match module.inst(call).callee() {
    ValueRef::Function(f) => Some(vec![f]),
    ValueRef::Inst(i) => {
      let inst = module.inst(i);
      match inst.t {
        InstTyp::CreateFunction | InstTyp::CreateGenerator => match inst.operands[0] {
          ValueRef::Function(f) => Some(vec![f]),
          _ => None,
        },
        _ => None,
      }
    }
    _ => None,
  }
}

fn resolve_receivers(module: &Module, load: InstId) -> Option<Vec<InstId>> {
  let (obj, _) = module.inst(load).as_load_property();
  match obj {
    ValueRef::Inst(i) => match module.inst(i).t {
      InstTyp::AllocObject => Some(vec![i]),
      // Array receivers are deliberately unknown.
      InstTyp::AllocArray => None,
      _ => None,
    },
    _ => None,
  }
}

/// Every property store targeting `alloc`, or `None` when the allocation
/// escapes or gains an accessor.
fn collect_stores(module: &Module, alloc: InstId) -> Option<Vec<InstId>> {
  let alloc_ref = ValueRef::Inst(alloc);
  let mut stores = Vec::new();
  for &user in &module.inst(alloc).users {
    let inst = module.inst(user);
    match inst.t {
      InstTyp::LoadProperty if inst.operands[0] == alloc_ref => {}
      InstTyp::StoreProperty | InstTyp::StoreOwnProperty => {
        let (value, obj, _) = inst.as_store_property();
        if obj == alloc_ref && value != alloc_ref {
          stores.push(user);
        } else {
          // The allocation is itself being stored somewhere.
          return None;
        }
      }
      // Accessors defeat keyed value tracking; anything else is an escape.
      _ => return None,
    }
  }
  Some(stores)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::il::builder::ModuleBuilder;

  #[test]
  fn direct_closure_call_has_known_callees_and_callsites() {
    let mut b = ModuleBuilder::new();
    let callee = b.new_function("callee");
    let entry = b.new_block(callee);
    let one = b.lit_num(1.0);
    b.ret(callee, entry, one);

    let caller = b.new_function("caller");
    let entry = b.new_block(caller);
    let closure = b.create_function(caller, entry, callee);
    let call = b.call(caller, entry, closure, vec![]);
    b.ret(caller, entry, call);
    let module = b.finish();

    let caller_cg = SimpleCallGraphProvider::build(&module, caller);
    assert_eq!(caller_cg.known_callees(call), Some(&[callee][..]));

    let callee_cg = SimpleCallGraphProvider::build(&module, callee);
    assert_eq!(callee_cg.known_callsites(callee), Some(&[call][..]));
  }

  #[test]
  fn escaping_closure_makes_callsites_unknown() {
    let mut b = ModuleBuilder::new();
    let callee = b.new_function("callee");
    let entry = b.new_block(callee);
    let one = b.lit_num(1.0);
    b.ret(callee, entry, one);

    let caller = b.new_function("caller");
    let v = b.add_variable(caller, "held");
    let entry = b.new_block(caller);
    let closure = b.create_function(caller, entry, callee);
    b.store_frame(caller, entry, closure, v);
    let undef = b.lit_undefined();
    b.ret(caller, entry, undef);
    let module = b.finish();

    let callee_cg = SimpleCallGraphProvider::build(&module, callee);
    assert_eq!(callee_cg.known_callsites(callee), None);
  }

  #[test]
  fn closure_passed_as_argument_escapes() {
    let mut b = ModuleBuilder::new();
    let callee = b.new_function("callee");
    let entry = b.new_block(callee);
    let one = b.lit_num(1.0);
    b.ret(callee, entry, one);

    let caller = b.new_function("caller");
    let entry = b.new_block(caller);
    let closure = b.create_function(caller, entry, callee);
    // Called, but also passed to itself as an argument.
    let call = b.call(caller, entry, closure, vec![ValueRef::Inst(closure)]);
    b.ret(caller, entry, call);
    let module = b.finish();

    let callee_cg = SimpleCallGraphProvider::build(&module, callee);
    assert_eq!(callee_cg.known_callsites(callee), None);
  }

  #[test]
  fn object_receiver_and_stores_are_tracked() {
    let mut b = ModuleBuilder::new();
    let f = b.new_function("f");
    let entry = b.new_block(f);
    let obj = b.alloc_object(f, entry);
    let key = b.lit_str("k");
    let seven = b.lit_num(7.0);
    let store = b.store_own_property(f, entry, seven, obj, key);
    let load = b.load_property(f, entry, obj, key);
    b.ret(f, entry, load);
    let module = b.finish();

    let cg = SimpleCallGraphProvider::build(&module, f);
    assert_eq!(cg.known_receivers(load), Some(&[obj][..]));
    assert_eq!(cg.known_stores(obj), Some(&[store][..]));
  }

  #[test]
  fn array_receivers_are_unknown() {
    let mut b = ModuleBuilder::new();
    let f = b.new_function("f");
    let entry = b.new_block(f);
    let arr = b.alloc_array(f, entry);
    let zero = b.lit_num(0.0);
    let load = b.load_property(f, entry, arr, zero);
    b.ret(f, entry, load);
    let module = b.finish();

    let cg = SimpleCallGraphProvider::build(&module, f);
    assert_eq!(cg.known_receivers(load), None);
  }

  #[test]
  fn escaping_allocation_makes_stores_unknown() {
    let mut b = ModuleBuilder::new();
    let f = b.new_function("f");
    let entry = b.new_block(f);
    let obj = b.alloc_object(f, entry);
    let key = b.lit_str("k");
    let seven = b.lit_num(7.0);
    b.store_own_property(f, entry, seven, obj, key);
    let load = b.load_property(f, entry, obj, key);
    // Returning the object lets callers store to it.
    b.ret(f, entry, obj);
    let module = b.finish();

    let cg = SimpleCallGraphProvider::build(&module, f);
    assert_eq!(cg.known_receivers(load), Some(&[obj][..]));
    assert_eq!(cg.known_stores(obj), None);
  }
}
