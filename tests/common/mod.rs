#![allow(dead_code)]

use infer_js::il::builder::ModuleBuilder;
use infer_js::il::verify::verify_module;
use infer_js::il::FuncId;
use infer_js::il::Module;
use infer_js::run_type_inference;

/// Verify, then run inference. Tests build IR the same way the lowering
/// pipeline would, so a verifier rejection here is a bug in the test.
pub fn infer(module: &mut Module) {
  verify_module(module).expect("test IR should verify");
  assert!(run_type_inference(module));
}

/// A module with one function that just returns the given literal builder
/// result. Returns (module builder, function, entry block).
pub fn single_function() -> (ModuleBuilder, FuncId, u32) {
  let mut b = ModuleBuilder::new();
  let f = b.new_function("f");
  let entry = b.new_block(f);
  (b, f, entry)
}
