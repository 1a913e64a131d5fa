//! Typed Value Abstraction
//!
//! Wraps a source fragment plus a static type tag; exposes coercions that
//! emit optimal surface code, and predicates used by the lowerers'
//! optimization rules (spec §4.1). Three flavors, matching spec §3:
//!
//! - `Typed`: `(source, ty)` — an expression of statically-known type.
//! - `Constant`: `(literal, safe)` — a literal, with compile-time
//!   folding of every coercion; `safe` is false when the literal
//!   coincides with a costume or sound name (see `as_safe`).
//! - `Variable`: `(source, ty, last_assigned)` — a most-recent-assignment
//!   tracker entry, recovering analytic predicates across assignments.
//!
//! This plays the role the teacher's `VirtualValue` enum plays in
//! `codegen/state.rs` and `codegen/virtual_stack.rs` — a small tagged
//! union threaded through codegen that remembers enough about a value to
//! avoid redundant work — generalized from "which SSA register" to
//! "which static type and coercion rule applies".

use crate::ir::Literal;
use crate::types::TypeTag;

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Typed {
        source: String,
        ty: TypeTag,
    },
    Constant {
        literal: Literal,
        safe: bool,
    },
    Variable {
        source: String,
        ty: TypeTag,
        last_assigned: Option<Box<TypedValue>>,
    },
}

/// JS-`Number(...)`-like coercion of a literal's text form to `f64`.
/// Empty (after trimming) coerces to `0.0`; unparseable text coerces to
/// `NaN`, matching `Number("whatever")`.
pub fn numeric_coercion(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Render an `f64` as a surface-language numeric literal, preserving the
/// distinction between `-0` and `0` (spec §8 invariant 2) and using the
/// bare identifiers `Infinity`/`-Infinity`/`NaN` for non-finite values.
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if v == 0.0 {
        if v.is_sign_negative() { "-0".to_string() } else { "0".to_string() }
    } else {
        format!("{}", v)
    }
}

fn to_boolean_literal(literal: &Literal) -> bool {
    match literal {
        Literal::Bool(b) => *b,
        Literal::Number(n) => *n != 0.0 && !n.is_nan(),
        Literal::Text(s) => !(s.is_empty() || s == "0"),
    }
}

/// Parse a `#RRGGBB` or `#RRGGBBAA` literal into its integer value, the
/// way `as-color` folds a hex-literal Constant (spec §4.1).
fn parse_hex_color(text: &str) -> Option<i64> {
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 && hex.len() != 8 {
        return None;
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    i64::from_str_radix(hex, 16).ok()
}

impl TypedValue {
    pub fn typed(source: impl Into<String>, ty: TypeTag) -> Self {
        TypedValue::Typed { source: source.into(), ty }
    }

    pub fn constant(literal: Literal, safe: bool) -> Self {
        TypedValue::Constant { literal, safe }
    }

    /// Returns `(source, ty)` as if `self` were a `Typed` value — the
    /// common case shared by `Typed` and `Variable` in the coercion
    /// table (spec §4.1: "Variable — same rules as Typed using tracker's
    /// type"). Not meaningful for `Constant`, which folds at each
    /// coercion site instead.
    fn as_typed_pair(&self) -> (String, TypeTag) {
        match self {
            TypedValue::Typed { source, ty } => (source.clone(), *ty),
            TypedValue::Variable { source, ty, .. } => (source.clone(), *ty),
            TypedValue::Constant { .. } => unreachable!("Constant has no Typed-equivalent pair"),
        }
    }

    pub fn as_number(&self) -> TypedValue {
        match self {
            TypedValue::Constant { literal, .. } => {
                let v = numeric_coercion(&literal.as_text());
                let source = if v.is_nan() { "0".to_string() } else { format_number(v) };
                TypedValue::typed(source, TypeTag::Number)
            }
            _ => {
                let (s, ty) = self.as_typed_pair();
                let source = match ty {
                    TypeTag::Number => s,
                    TypeTag::NumberOrNan => format!("({} || 0)", s),
                    _ => format!("(+{} || 0)", s),
                };
                TypedValue::typed(source, TypeTag::Number)
            }
        }
    }

    pub fn as_number_or_nan(&self) -> TypedValue {
        match self {
            TypedValue::Constant { .. } => {
                let folded = self.as_number();
                match folded {
                    TypedValue::Typed { source, .. } => TypedValue::typed(source, TypeTag::NumberOrNan),
                    _ => unreachable!(),
                }
            }
            _ => {
                let (s, ty) = self.as_typed_pair();
                let source = match ty {
                    TypeTag::Number | TypeTag::NumberOrNan => s,
                    _ => format!("(+{})", s),
                };
                TypedValue::typed(source, TypeTag::NumberOrNan)
            }
        }
    }

    pub fn as_string(&self) -> TypedValue {
        match self {
            TypedValue::Constant { literal, .. } => {
                let source =
                    serde_json::to_string(&literal.as_text()).expect("string serialization of a string cannot fail");
                TypedValue::typed(source, TypeTag::String)
            }
            _ => {
                let (s, ty) = self.as_typed_pair();
                let source = if ty == TypeTag::String { s } else { format!("(\"\" + {})", s) };
                TypedValue::typed(source, TypeTag::String)
            }
        }
    }

    pub fn as_boolean(&self) -> TypedValue {
        match self {
            TypedValue::Constant { literal, .. } => {
                TypedValue::typed(to_boolean_literal(literal).to_string(), TypeTag::Boolean)
            }
            _ => {
                let (s, ty) = self.as_typed_pair();
                let source = if ty == TypeTag::Boolean { s } else { format!("toBoolean({})", s) };
                TypedValue::typed(source, TypeTag::Boolean)
            }
        }
    }

    pub fn as_color(&self) -> TypedValue {
        match self {
            TypedValue::Constant { literal, .. } => match parse_hex_color(&literal.as_text()) {
                Some(n) => TypedValue::typed(format_number(n as f64), TypeTag::Number),
                None => self.as_unknown(),
            },
            _ => self.as_unknown(),
        }
    }

    pub fn as_unknown(&self) -> TypedValue {
        match self {
            TypedValue::Constant { literal, .. } => match literal {
                Literal::Number(n) => TypedValue::typed(format_number(*n), TypeTag::Unknown),
                Literal::Text(text) => {
                    // A numeric literal if the text round-trips through
                    // our own numeric formatting (spec §4.1).
                    if let Ok(n) = text.trim().parse::<f64>() {
                        if &format_number(n) == text {
                            return TypedValue::typed(text.clone(), TypeTag::Unknown);
                        }
                    }
                    self.as_string()
                }
                Literal::Bool(_) => self.as_string(),
            },
            _ => {
                let (s, _ty) = self.as_typed_pair();
                TypedValue::typed(s, TypeTag::Unknown)
            }
        }
    }

    pub fn as_safe(&self) -> TypedValue {
        match self {
            TypedValue::Constant { safe, .. } => {
                if *safe { self.as_unknown() } else { self.as_string() }
            }
            _ => self.as_unknown(),
        }
    }

    /// `always-number?` (spec §3/§8 invariant 1 & predicates table).
    pub fn always_number(&self) -> bool {
        match self {
            TypedValue::Typed { ty, .. } => ty.always_number(),
            TypedValue::Constant { literal, .. } => {
                let text = literal.as_text();
                let v = numeric_coercion(&text);
                v.is_finite() && (v != 0.0 || !text.trim().is_empty())
            }
            TypedValue::Variable { last_assigned, .. } => {
                last_assigned.as_ref().is_some_and(|v| v.always_number())
            }
        }
    }

    pub fn always_number_or_nan(&self) -> bool {
        match self {
            TypedValue::Typed { ty, .. } => ty.always_number_or_nan(),
            TypedValue::Constant { literal, .. } => !numeric_coercion(&literal.as_text()).is_nan(),
            TypedValue::Variable { last_assigned, .. } => {
                last_assigned.as_ref().is_some_and(|v| v.always_number_or_nan())
            }
        }
    }

    pub fn never_number(&self) -> bool {
        match self {
            TypedValue::Typed { ty, .. } => ty.never_number(),
            TypedValue::Constant { literal, .. } => numeric_coercion(&literal.as_text()).is_nan(),
            TypedValue::Variable { last_assigned, .. } => {
                last_assigned.as_ref().is_some_and(|v| v.never_number())
            }
        }
    }

    /// An "optimization-safe" Constant for the equality rule in spec
    /// §4.2: numeric coercion non-zero, and the literal's coerced
    /// textual form equals the literal's own textual form (so folding it
    /// to a bare numeric `===` cannot change observable behavior).
    pub fn is_optimization_safe_constant(&self) -> bool {
        if let TypedValue::Constant { literal, .. } = self {
            let text = literal.as_text();
            let v = numeric_coercion(&text);
            v != 0.0 && format_number(v) == text
        } else {
            false
        }
    }

    /// Source fragment for a value already known to have one (`Typed` or
    /// `Variable`). For `Constant`s, use `as_unknown()` first.
    pub fn source(&self) -> Option<&str> {
        match self {
            TypedValue::Typed { source, .. } | TypedValue::Variable { source, .. } => Some(source),
            TypedValue::Constant { .. } => None,
        }
    }

    /// Copy the referent's last-assigned value rather than aliasing it,
    /// per spec §3/§9: "if the variable is assigned another Variable, the
    /// inner last-assigned is copied to prevent self-referential cycles."
    pub fn resolve_for_assignment(value: TypedValue) -> Option<Box<TypedValue>> {
        match value {
            TypedValue::Variable { last_assigned, .. } => last_assigned,
            other => Some(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_number_as_number_is_identity() {
        let v = TypedValue::typed("x", TypeTag::Number);
        assert_eq!(v.as_number(), TypedValue::typed("x", TypeTag::Number));
    }

    #[test]
    fn coercion_idempotence_for_number_or_nan() {
        let v = TypedValue::typed("x", TypeTag::NumberOrNan);
        let once = v.as_number();
        // Re-wrap as Typed(number) per spec §8 invariant 1 and coerce again.
        let twice = once.as_number();
        assert_eq!(once, twice);
    }

    #[test]
    fn signed_zero_constant_preserved() {
        let v = TypedValue::constant(Literal::Text("-0".to_string()), true);
        assert_eq!(v.as_number(), TypedValue::typed("-0", TypeTag::Number));
    }

    #[test]
    fn nan_text_constant_folds_to_zero() {
        let v = TypedValue::constant(Literal::Text("banana".to_string()), true);
        assert_eq!(v.as_number(), TypedValue::typed("0", TypeTag::Number));
    }

    #[test]
    fn unknown_typed_coerces_to_number_with_fallback() {
        let v = TypedValue::typed("s", TypeTag::Unknown);
        assert_eq!(v.as_number(), TypedValue::typed("(+s || 0)", TypeTag::Number));
    }

    #[test]
    fn number_or_nan_typed_coerces_with_or_zero() {
        let v = TypedValue::typed("s", TypeTag::NumberOrNan);
        assert_eq!(v.as_number(), TypedValue::typed("(s || 0)", TypeTag::Number));
    }

    #[test]
    fn as_string_wraps_non_string_typed() {
        let v = TypedValue::typed("s", TypeTag::Number);
        assert_eq!(v.as_string(), TypedValue::typed("(\"\" + s)", TypeTag::String));
    }

    #[test]
    fn as_string_is_identity_for_string_typed() {
        let v = TypedValue::typed("s", TypeTag::String);
        assert_eq!(v.as_string(), TypedValue::typed("s", TypeTag::String));
    }

    #[test]
    fn constant_string_as_string_is_json_escaped() {
        let v = TypedValue::constant(Literal::Text("hi \"there\"".to_string()), true);
        assert_eq!(
            v.as_string(),
            TypedValue::typed("\"hi \\\"there\\\"\"", TypeTag::String)
        );
    }

    #[test]
    fn constant_boolean_coercion_empty_string_is_false() {
        let v = TypedValue::constant(Literal::Text(String::new()), true);
        assert_eq!(v.as_boolean(), TypedValue::typed("false", TypeTag::Boolean));
    }

    #[test]
    fn constant_boolean_coercion_zero_string_is_false() {
        let v = TypedValue::constant(Literal::Text("0".to_string()), true);
        assert_eq!(v.as_boolean(), TypedValue::typed("false", TypeTag::Boolean));
    }

    #[test]
    fn constant_boolean_coercion_other_string_is_true() {
        let v = TypedValue::constant(Literal::Text("false".to_string()), true);
        assert_eq!(v.as_boolean(), TypedValue::typed("true", TypeTag::Boolean));
    }

    #[test]
    fn as_color_parses_hex_literal() {
        let v = TypedValue::constant(Literal::Text("#ff0000".to_string()), true);
        assert_eq!(v.as_color(), TypedValue::typed("16711680", TypeTag::Number));
    }

    #[test]
    fn as_color_falls_back_to_unknown_for_non_hex() {
        let v = TypedValue::constant(Literal::Text("hello".to_string()), false);
        assert_eq!(v.as_color(), v.as_unknown());
    }

    #[test]
    fn as_safe_uses_string_form_for_unsafe_constant() {
        let v = TypedValue::constant(Literal::Text("cat".to_string()), false);
        assert_eq!(v.as_safe(), TypedValue::typed("\"cat\"", TypeTag::Unknown).as_string());
    }

    #[test]
    fn always_number_requires_nonempty_text_when_zero() {
        let empty = TypedValue::constant(Literal::Text(String::new()), true);
        assert!(!empty.always_number());
        let explicit_zero = TypedValue::constant(Literal::Text("0".to_string()), true);
        assert!(explicit_zero.always_number());
    }

    #[test]
    fn variable_predicates_are_false_without_last_assigned() {
        let v = TypedValue::Variable { source: "v".to_string(), ty: TypeTag::Unknown, last_assigned: None };
        assert!(!v.always_number());
        assert!(!v.always_number_or_nan());
        assert!(!v.never_number());
    }

    #[test]
    fn variable_predicates_delegate_to_last_assigned() {
        let inner = TypedValue::constant(Literal::Number(5.0), true);
        let v = TypedValue::Variable {
            source: "v".to_string(),
            ty: TypeTag::Unknown,
            last_assigned: Some(Box::new(inner)),
        };
        assert!(v.always_number());
    }

    #[test]
    fn assigning_a_variable_copies_its_last_assigned_to_avoid_cycles() {
        let inner = TypedValue::constant(Literal::Number(1.0), true);
        let b = TypedValue::Variable {
            source: "b".to_string(),
            ty: TypeTag::Unknown,
            last_assigned: Some(Box::new(inner.clone())),
        };
        let resolved = TypedValue::resolve_for_assignment(b);
        assert_eq!(resolved, Some(Box::new(inner)));
    }

    #[test]
    fn is_optimization_safe_constant_rejects_nonroundtripping_text() {
        let v = TypedValue::constant(Literal::Text("010".to_string()), true);
        assert!(!v.is_optimization_safe_constant());
        let five = TypedValue::constant(Literal::Number(5.0), true);
        assert!(five.is_optimization_safe_constant());
    }
}
