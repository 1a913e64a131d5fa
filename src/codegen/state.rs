//! Per-Compile State
//!
//! Everything that lives for the duration of a single script compilation:
//! the emission buffer, the Variable Tracker, the setup-bindings table,
//! the Frame Stack, and the flags read from the script header (spec §3).
//! This plays the role the teacher's `CodeGen` struct plays in
//! `codegen/state.rs` — a single mutable struct threaded through every
//! lowering call by `&mut self` — carried over almost unchanged in shape,
//! just re-purposed from LLVM-IR-specific bookkeeping (virtual register
//! stack, tail-call flags) to this spec's bookkeeping (variable tracker,
//! setup bindings, frame stack).

use crate::frame::FrameStack;
use crate::name_pool::NamePool;
use crate::typed_value::TypedValue;
use indexmap::IndexMap;
use std::collections::HashMap;

/// `variable-tracker`: mapping from IR variable id to its most-recently
/// assigned `TypedValue::Variable` entry (spec §3).
#[derive(Debug, Default)]
pub struct VariableTracker {
    entries: HashMap<String, TypedValue>,
}

impl VariableTracker {
    pub fn new() -> Self {
        VariableTracker::default()
    }

    pub fn get(&self, var_id: &str) -> Option<&TypedValue> {
        self.entries.get(var_id)
    }

    pub fn set(&mut self, var_id: impl Into<String>, value: TypedValue) {
        self.entries.insert(var_id.into(), value);
    }

    /// Clear every entry. Called after any statement that may reorder
    /// thread execution: a yield, a procedure call, a broadcast, or a
    /// stack-descent boundary (spec §3/§5, testable property 5).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `setup-bindings`: an ordered mapping from an arbitrary surface
/// expression to a fresh hoisted name, used to evaluate costly lookups
/// (e.g. sprite-by-name) exactly once per script invocation (spec §3).
/// Backed by an `IndexMap` so entries preserve insertion order for the
/// Factory Assembler, and so a repeated expression within one compile
/// reuses its existing binding instead of emitting it twice.
#[derive(Debug, Default)]
pub struct SetupBindings {
    bindings: IndexMap<String, String>,
    pool: NamePool,
}

impl SetupBindings {
    pub fn new() -> Self {
        SetupBindings { bindings: IndexMap::new(), pool: NamePool::new("setup_") }
    }

    /// Return the hoisted name for `expression`, creating one on first
    /// use. Subsequent calls with the same expression text reuse the
    /// binding (spec §8: "Setup-bindings are emitted exactly once per
    /// distinct source expression within a compilation").
    pub fn get_or_insert(&mut self, expression: &str) -> String {
        if let Some(name) = self.bindings.get(expression) {
            return name.clone();
        }
        let name = self.pool.next();
        self.bindings.insert(expression.to_string(), name.clone());
        name
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything the lowerers need for a single script compilation.
pub struct CompileState {
    pub output: String,
    pub variables: VariableTracker,
    pub setup_bindings: SetupBindings,
    pub frames: FrameStack,
    pub temp_pool: NamePool,

    pub is_warp: bool,
    pub is_procedure: bool,
    pub warp_timer: bool,
    /// Mirrors the script header's declared `yields` flag. Every emitted
    /// `yield`/`yield*` must be consistent with this (spec §7
    /// `YieldMismatch`, §8 invariant 4).
    pub script_yields: bool,
    /// Set during input descent when a `mod` helper call was emitted;
    /// consumed by `motion.setX`/`setY`/`setXY` (spec §4.3).
    pub saw_modulo: bool,
    /// Environment signal (spec §4.2 "List get"): whether the target
    /// surface runtime supports `??`, enabling direct array indexing
    /// instead of the `listGet` helper call.
    pub supports_nullish_coalescing: bool,
    /// The enclosing script's own procedure code, if this compile is for
    /// a procedure definition; used by the procedure-call expression rule
    /// to detect tight direct recursion (spec §4.2).
    pub current_procedure_code: Option<String>,
}

impl CompileState {
    pub fn new(is_warp: bool, is_procedure: bool) -> Self {
        CompileState {
            output: String::new(),
            variables: VariableTracker::new(),
            setup_bindings: SetupBindings::new(),
            frames: FrameStack::new(),
            temp_pool: NamePool::new("tmp_"),
            is_warp,
            is_procedure,
            warp_timer: false,
            script_yields: false,
            saw_modulo: false,
            supports_nullish_coalescing: false,
            current_procedure_code: None,
        }
    }

    /// Emit a suspension point, validating it against `script_yields`
    /// (spec §7 `YieldMismatch`, §8 invariant 4). `kind` is the IR kind
    /// responsible, for the error message.
    pub fn emit_yield(&mut self, kind: &str) -> Result<(), crate::error::CompileError> {
        if !self.script_yields {
            return Err(crate::error::CompileError::YieldMismatch { kind: kind.to_string() });
        }
        self.output.push_str("yield;\n");
        Ok(())
    }

    pub fn emit_yield_delegate(&mut self, expression: &str, kind: &str) -> Result<(), crate::error::CompileError> {
        if !self.script_yields {
            return Err(crate::error::CompileError::YieldMismatch { kind: kind.to_string() });
        }
        self.output.push_str(&format!("yield* {};\n", expression));
        Ok(())
    }

    /// `yield-not-warp`: emits `yield` iff the script is not in warp
    /// mode (spec §5).
    pub fn yield_not_warp(&mut self, kind: &str) -> Result<(), crate::error::CompileError> {
        if !self.is_warp {
            self.emit_yield(kind)?;
        }
        Ok(())
    }

    /// `yield-stuck-or-not-warp`: `if (isStuck()) yield` in warp mode,
    /// plain `yield` otherwise (spec §5).
    pub fn yield_stuck_or_not_warp(&mut self, kind: &str) -> Result<(), crate::error::CompileError> {
        if self.is_warp {
            if !self.script_yields {
                return Err(crate::error::CompileError::YieldMismatch { kind: kind.to_string() });
            }
            self.output.push_str("if (isStuck()) {\nyield;\n}\n");
            Ok(())
        } else {
            self.emit_yield(kind)
        }
    }

    /// `yield-loop`: `yield-stuck-or-not-warp` if the script has a warp
    /// timer, else `yield-not-warp` (spec §5).
    pub fn yield_loop(&mut self, kind: &str) -> Result<(), crate::error::CompileError> {
        if self.warp_timer {
            self.yield_stuck_or_not_warp(kind)
        } else {
            self.yield_not_warp(kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_bindings_emit_each_distinct_expression_once() {
        let mut bindings = SetupBindings::new();
        let a = bindings.get_or_insert("runtime.getSpriteTargetByName(\"Cat\")");
        let b = bindings.get_or_insert("runtime.getSpriteTargetByName(\"Cat\")");
        assert_eq!(a, b);
        let c = bindings.get_or_insert("runtime.getSpriteTargetByName(\"Dog\")");
        assert_ne!(a, c);
        assert_eq!(bindings.iter().count(), 2);
    }

    #[test]
    fn variable_tracker_clears_all_entries() {
        let mut tracker = VariableTracker::new();
        tracker.set("v1", TypedValue::typed("x", crate::types::TypeTag::Unknown));
        assert!(!tracker.is_empty());
        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn yield_mismatch_is_an_error_when_script_does_not_declare_yields() {
        let mut state = CompileState::new(false, false);
        state.script_yields = false;
        assert!(state.yield_not_warp("control.forever").is_err());
    }

    #[test]
    fn yield_not_warp_is_noop_in_warp_mode() {
        let mut state = CompileState::new(true, false);
        state.script_yields = true;
        state.yield_not_warp("control.repeat").unwrap();
        assert!(state.output.is_empty());
    }

    #[test]
    fn yield_loop_uses_stuck_guard_when_warp_timer_set() {
        let mut state = CompileState::new(true, false);
        state.script_yields = true;
        state.warp_timer = true;
        state.yield_loop("control.while").unwrap();
        assert!(state.output.contains("isStuck()"));
    }
}
