//! Extension Hook
//!
//! Process-wide registry mapping extension identifiers to per-block-kind
//! transformer callables, queried before built-in dispatch (spec §4.4).
//! Modeled on the teacher's `CompilerConfig`/`ExternalBuiltin` builder
//! pattern in `config.rs`: external authors register transformers the
//! same way the teacher lets embedders register `ExternalBuiltin`s,
//! including validating identifiers up front rather than failing deep
//! inside codegen.

use crate::codegen::state::CompileState;
use crate::error::CompileError;
use crate::ir::IrNode;
use crate::typed_value::TypedValue;
use std::collections::HashMap;
use std::sync::RwLock;

/// The capability handed to a transformer: constructors for `TypedValue`
/// and the `TypeTag` constants, so extension authors can produce
/// analyzable values rather than opaque strings (spec §4.4: "The imports
/// record exposes the Typed Value constructors and the type-tag
/// constants").
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportsRecord;

impl ImportsRecord {
    pub fn typed(&self, source: impl Into<String>, ty: crate::types::TypeTag) -> TypedValue {
        TypedValue::typed(source, ty)
    }
}

/// Emits code for an unknown expression block kind. Returns the value the
/// block produces.
pub trait ExpressionTransformer: Send + Sync {
    fn lower(
        &self,
        node: &IrNode,
        state: &mut CompileState,
        imports: &ImportsRecord,
    ) -> Result<TypedValue, CompileError>;
}

/// Emits code for an unknown statement block kind, appending to the
/// compiler's output buffer.
pub trait StatementTransformer: Send + Sync {
    fn lower(
        &self,
        node: &IrNode,
        state: &mut CompileState,
        imports: &ImportsRecord,
    ) -> Result<(), CompileError>;
}

#[derive(Default)]
struct ExtensionEntry {
    expressions: HashMap<String, Box<dyn ExpressionTransformer>>,
    statements: HashMap<String, Box<dyn StatementTransformer>>,
}

/// Process-wide mapping from extension identifier to a mapping from block
/// kind to a transformer. Populated at runtime startup; mutable across
/// the process lifetime (spec §3/§5), but concurrent mutation during an
/// in-flight compilation is not supported — callers are expected to
/// finish registering extensions before compiling any script.
#[derive(Default)]
pub struct ExtensionRegistry {
    entries: RwLock<HashMap<String, ExtensionEntry>>,
}

fn validate_identifier(kind: &str, id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{kind} identifier cannot be empty"));
    }
    if !id.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(format!(
            "invalid character in {kind} identifier '{id}': only alphanumerics, '_' and '-' are allowed"
        ));
    }
    Ok(())
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        ExtensionRegistry::default()
    }

    /// Register an expression transformer for `extension_id.block_id`.
    ///
    /// # Panics
    ///
    /// Panics if either identifier contains characters that could not
    /// appear in a well-formed dotted kind string.
    pub fn register_expression(
        &self,
        extension_id: impl Into<String>,
        block_id: impl Into<String>,
        transformer: impl ExpressionTransformer + 'static,
    ) {
        let extension_id = extension_id.into();
        let block_id = block_id.into();
        validate_identifier("extension", &extension_id).expect("invalid extension identifier");
        validate_identifier("block", &block_id).expect("invalid block identifier");
        let mut entries = self.entries.write().expect("extension registry poisoned");
        entries
            .entry(extension_id)
            .or_default()
            .expressions
            .insert(block_id, Box::new(transformer));
    }

    pub fn register_statement(
        &self,
        extension_id: impl Into<String>,
        block_id: impl Into<String>,
        transformer: impl StatementTransformer + 'static,
    ) {
        let extension_id = extension_id.into();
        let block_id = block_id.into();
        validate_identifier("extension", &extension_id).expect("invalid extension identifier");
        validate_identifier("block", &block_id).expect("invalid block identifier");
        let mut entries = self.entries.write().expect("extension registry poisoned");
        entries
            .entry(extension_id)
            .or_default()
            .statements
            .insert(block_id, Box::new(transformer));
    }

    fn block_id(node: &IrNode) -> &str {
        node.kind.splitn(2, '.').nth(1).unwrap_or(&node.kind)
    }

    /// Look up and invoke an expression transformer for `node`, if one is
    /// registered. Per spec §4.4, a transformer panic/error is caught and
    /// logged, and the expression slot receives a `None` (the caller
    /// treats this as the documented open-question path — see
    /// `codegen::expressions::lower_expression`).
    pub fn try_lower_expression(
        &self,
        node: &IrNode,
        state: &mut CompileState,
        imports: &ImportsRecord,
    ) -> Option<Result<TypedValue, CompileError>> {
        let entries = self.entries.read().expect("extension registry poisoned");
        let entry = entries.get(node.extension_id())?;
        let transformer = entry.expressions.get(Self::block_id(node))?;
        match transformer.lower(node, state, imports) {
            Ok(v) => Some(Ok(v)),
            Err(e) => {
                tracing::warn!(kind = %node.kind, error = %e, "extension transformer failed for expression");
                None
            }
        }
    }

    pub fn try_lower_statement(
        &self,
        node: &IrNode,
        state: &mut CompileState,
        imports: &ImportsRecord,
    ) -> Option<Result<(), CompileError>> {
        let entries = self.entries.read().expect("extension registry poisoned");
        let entry = entries.get(node.extension_id())?;
        let transformer = entry.statements.get(Self::block_id(node))?;
        Some(transformer.lower(node, state, imports))
    }

    pub fn has_extension(&self, extension_id: &str) -> bool {
        let entries = self.entries.read().expect("extension registry poisoned");
        entries.contains_key(extension_id)
    }
}
