//! Just-in-time block-to-source compiler core for a visual programming
//! runtime.
//!
//! The runtime executes projects composed of sprite-bound scripts built
//! from nested blocks; a prior pass (outside this crate) lowers those
//! blocks into the [`ir`] this crate consumes. [`codegen::compile_script`]
//! walks a script's IR and emits a source-level program — a string in a
//! target surface language — wrapped in a factory closure that, given a
//! thread handle, returns the runnable script body. The caller evaluates
//! that string with an externally supplied scoped evaluator; this crate
//! never evaluates anything itself.
//!
//! # Key Concepts
//!
//! - [`typed_value::TypedValue`]: a source fragment plus a static type
//!   tag, with coercions that fold at compile time where the input is a
//!   literal.
//! - [`codegen::expressions`] / [`codegen::statements`]: dispatch on IR
//!   node kind to lower expressions and statements respectively.
//! - [`extension::ExtensionRegistry`]: process-wide hook letting callers
//!   register transformers for block kinds this crate doesn't know
//!   about.
//! - [`interpolator`]: a renderer-facing component, unrelated to code
//!   generation, that linearly interpolates sprite visual state between
//!   simulation ticks.

pub mod codegen;
pub mod error;
pub mod extension;
pub mod frame;
pub mod interpolator;
pub mod ir;
pub mod kinds;
pub mod name_pool;
pub mod runtime_helpers;
pub mod typed_value;
pub mod types;

pub use codegen::compile_script;
pub use error::CompileError;
pub use extension::{ExpressionTransformer, ExtensionRegistry, ImportsRecord, StatementTransformer};
pub use ir::{IrNode, Literal, ProcedureEntry, Script};
pub use typed_value::TypedValue;
pub use types::TypeTag;
