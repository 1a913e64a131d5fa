//! Intermediate representation consumed by the lowerers.
//!
//! An IR node is an immutable tagged record: a dotted `kind` string (e.g.
//! `op.add`, `control.repeat`) plus named expression inputs, named nested
//! statement stacks, and named static fields. This mirrors how the
//! upstream IR producer hands blocks to the compiler — blocks are not
//! typed per-kind Rust structs there, they are tagged records, and the
//! lowerers are the ones that know what each kind's inputs mean. Modeling
//! it the same way here keeps the Expression/Statement Lowerer dispatch
//! honest to spec §3 and lets the Extension Hook (spec §4.4) treat
//! unrecognized kinds uniformly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A literal value carried by a `constant` node or a static field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Literal {
    pub fn as_text(&self) -> String {
        match self {
            Literal::Text(s) => s.clone(),
            Literal::Number(n) => crate::typed_value::format_number(*n),
            Literal::Bool(b) => b.to_string(),
        }
    }
}

/// One input slot of an IR node: either a nested expression node, or a
/// nested statement stack (used by inline-stack expressions and by
/// statement substacks like `control.if`'s `SUBSTACK`/`SUBSTACK2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Input {
    Node(Box<IrNode>),
    Stack(Vec<IrNode>),
}

/// An immutable tagged IR node. Used for both expression and statement
/// positions; the distinction is purely in how the lowerer that dispatches
/// on `kind` treats the result (a statement lowerer discards any return
/// value, an expression lowerer requires one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrNode {
    pub kind: String,
    #[serde(default)]
    pub inputs: HashMap<String, Input>,
    #[serde(default)]
    pub fields: HashMap<String, Literal>,
}

impl IrNode {
    pub fn new(kind: impl Into<String>) -> Self {
        IrNode {
            kind: kind.into(),
            inputs: HashMap::new(),
            fields: HashMap::new(),
        }
    }

    pub fn with_input(mut self, name: &str, node: IrNode) -> Self {
        self.inputs.insert(name.to_string(), Input::Node(Box::new(node)));
        self
    }

    pub fn with_stack(mut self, name: &str, stack: Vec<IrNode>) -> Self {
        self.inputs.insert(name.to_string(), Input::Stack(stack));
        self
    }

    pub fn with_field(mut self, name: &str, value: Literal) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// The extension identifier this node's kind would dispatch to, i.e.
    /// everything before the first `.`. Spec §4.4: "split the node kind at
    /// the first `.` into an extension identifier and block identifier."
    pub fn extension_id(&self) -> &str {
        self.kind.split('.').next().unwrap_or(&self.kind)
    }

    pub fn input_node(&self, name: &str) -> Option<&IrNode> {
        match self.inputs.get(name) {
            Some(Input::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn input_stack(&self, name: &str) -> Option<&[IrNode]> {
        match self.inputs.get(name) {
            Some(Input::Stack(s)) => Some(s),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Literal> {
        self.fields.get(name)
    }

    pub fn field_text(&self, name: &str) -> Option<String> {
        self.field(name).map(Literal::as_text)
    }
}

/// An entry in the script's procedure table (`procedures-table` in spec
/// §6): `(stack?, yields, arguments)`. `stack` is absent for a procedure
/// prototype with no body (declared but never defined).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureEntry {
    pub stack: Option<Vec<IrNode>>,
    pub yields: bool,
    pub arguments: Vec<String>,
}

/// The script IR passed into the compiler, per spec §6:
/// `(stack, is-warp, is-procedure, yields, warp-timer, arguments,
/// procedure-code?, top-block-id, procedures-table)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub stack: Vec<IrNode>,
    pub is_warp: bool,
    pub is_procedure: bool,
    pub yields: bool,
    pub warp_timer: bool,
    pub arguments: Vec<String>,
    pub procedure_code: Option<String>,
    pub top_block_id: String,
    #[serde(default)]
    pub procedures: HashMap<String, ProcedureEntry>,
}
