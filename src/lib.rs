//! Whole-program type inference over a JavaScript SSA IR.
//!
//! This is the analysis half of an optimizer pipeline: it computes a
//! conservative over-approximation of the runtime type of every instruction
//! result, captured variable, formal parameter, and function return value,
//! and writes the results back into the IR's `Type` attributes where later
//! passes read them. The IR itself (instruction kinds, blocks, def-use
//! lists) lives in [`il`] and is consumed as a fixed data model.
//!
//! The pass is an iterative, inter-procedural, monotone fixpoint: types only
//! move up the lattice within an iteration, phis are revisited through
//! back-edge cycles, and a per-function pre-pass snapshot guarantees that
//! types present before the pass are narrowed, never widened.
//!
//! ```
//! use infer_js::il::builder::ModuleBuilder;
//! use infer_js::il::inst::BinOp;
//! use infer_js::run_type_inference;
//! use infer_js::Type;
//!
//! let mut b = ModuleBuilder::new();
//! let f = b.new_function("f");
//! let entry = b.new_block(f);
//! let one = b.lit_num(1.0);
//! let two = b.lit_num(2.0);
//! let sum = b.bin(f, entry, BinOp::Add, one, two);
//! b.ret(f, entry, sum);
//! let mut module = b.finish();
//!
//! run_type_inference(&mut module);
//! assert_eq!(module.inst(sum).ty, Type::NUMBER);
//! assert_eq!(module.func(f).ret_ty, Type::NUMBER);
//! ```

pub mod callgraph;
pub mod il;
pub mod infer;
pub mod types;

pub use callgraph::CallGraphProvider;
pub use callgraph::SimpleCallGraphProvider;
pub use infer::debug::InferenceDebug;
pub use infer::run_type_inference;
pub use infer::InferenceOptions;
pub use infer::InferenceStats;
pub use infer::TypeInference;
pub use types::Type;
