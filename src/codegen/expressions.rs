//! Expression Lowerer
//!
//! Dispatches on expression-node kind; returns a `TypedValue`. Houses the
//! arithmetic/comparison/sensing/list/variable/procedure-call expression
//! rules with their type rules and optimizations (spec §4.2). This is the
//! largest lowerer, the way the teacher's `codegen_word_call` dispatch in
//! `codegen/statements.rs` together with `codegen/inline/dispatch.rs`
//! dominates that crate — here split by rule family instead of by
//! register-allocation strategy, since this crate has no virtual
//! registers to spill.

use super::state::CompileState;
use crate::error::CompileError;
use crate::extension::{ExtensionRegistry, ImportsRecord};
use crate::ir::{IrNode, Literal};
use crate::runtime_helpers::{helpers, SIMPLE_EXPRESSION_PRIMITIVES};
use crate::typed_value::{numeric_coercion, TypedValue};
use crate::types::TypeTag;

/// Top-level expression dispatch (spec §4.2, §4.4).
pub fn lower_expression(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    // Extension Hook: queried before built-in dispatch (spec §4.4).
    if registry.has_extension(node.extension_id()) {
        if let Some(result) = registry.try_lower_expression(node, state, imports) {
            return result;
        }
        // A transformer was registered for this extension but either
        // failed (already logged by the registry) or declined this block
        // kind. Spec §9's open question: substitute an empty-string
        // constant rather than propagating a null value downstream.
        return Ok(TypedValue::constant(Literal::Text(String::new()), true));
    }

    match node.kind.as_str() {
        "constant" => lower_constant(node),
        "var.get" => Ok(lower_var_get(node, state)?),
        "args.boolean" | "args.stringNumber" => lower_argument(node),
        "op.equals" => lower_equals(node, state, registry, imports),
        "op.less" => lower_ordering(node, state, registry, imports, false),
        "op.greater" => lower_ordering(node, state, registry, imports, true),
        "op.add" => lower_binary_nan(node, state, registry, imports, "+"),
        "op.subtract" => lower_binary_nan(node, state, registry, imports, "-"),
        "op.multiply" => lower_binary_nan(node, state, registry, imports, "*"),
        "op.divide" => lower_binary_nan(node, state, registry, imports, "/"),
        "op.mod" => lower_mod(node, state, registry, imports),
        "op.and" => lower_boolean_binary(node, state, registry, imports, "&&"),
        "op.or" => lower_boolean_binary(node, state, registry, imports, "||"),
        "op.not" => lower_not(node, state, registry, imports),
        "op.join" => lower_join(node, state, registry, imports),
        "op.letterOf" => lower_letter_of(node, state, registry, imports),
        "op.length" => lower_string_length(node, state, registry, imports),
        "op.contains" => lower_string_contains(node, state, registry, imports),
        "op.round" => lower_unary_math(node, state, registry, imports, "Math.round", TypeTag::Number),
        "op.abs" => lower_unary_math(node, state, registry, imports, "Math.abs", TypeTag::Number),
        "op.ceiling" => lower_unary_math(node, state, registry, imports, "Math.ceil", TypeTag::Number),
        "op.floor" => lower_unary_math(node, state, registry, imports, "Math.floor", TypeTag::Number),
        "op.sqrt" => lower_unary_math(node, state, registry, imports, "Math.sqrt", TypeTag::NumberOrNan),
        "op.ln" => lower_unary_math(node, state, registry, imports, "Math.log", TypeTag::NumberOrNan),
        "op.log" => lower_unary_math(node, state, registry, imports, "Math.log10", TypeTag::NumberOrNan),
        "op.e^" => lower_unary_math(node, state, registry, imports, "Math.exp", TypeTag::Number),
        "op.10^" => lower_pow10(node, state, registry, imports),
        "op.advlog" => lower_advlog(node, state, registry, imports),
        "op.asin" => lower_inverse_trig(node, state, registry, imports, "Math.asin"),
        "op.acos" => lower_inverse_trig(node, state, registry, imports, "Math.acos"),
        "op.atan" => lower_atan(node, state, registry, imports),
        "op.sin" => lower_trig(node, state, registry, imports, "Math.sin"),
        "op.cos" => lower_trig(node, state, registry, imports, "Math.cos"),
        "op.tan" => lower_tan(node, state, registry, imports),
        "op.random" => lower_random(node, state, registry, imports),
        "list.get" => lower_list_get(node, state, registry, imports),
        "list.contains" => {
            lower_list_simple(node, state, registry, imports, helpers::LIST_CONTAINS, TypeTag::Boolean)
        }
        "list.indexOf" => {
            lower_list_simple(node, state, registry, imports, helpers::LIST_INDEX_OF, TypeTag::Number)
        }
        "list.length" => lower_list_length(node),
        "list.contents" => {
            lower_list_simple(node, state, registry, imports, helpers::LIST_CONTENTS, TypeTag::String)
        }
        "sensing.of" => lower_sensing_of(node, state, registry, imports),
        "sensing.distance" => {
            lower_helper_call1(node, state, registry, imports, helpers::DISTANCE, "TARGET", TypeTag::NumberOrNan)
        }
        "sensing.daysSince2000" => Ok(imports.typed(format!("{}()", helpers::DAYS_SINCE_2000), TypeTag::NumberOrNan)),
        "control.inlineStackOutput" => lower_inline_stack_output(node, state, registry, imports),
        "procedures.call" => procedure_call_fragment(node, state, registry, imports, true),
        "compat" => lower_compat_expression(node, state),
        "noop" => lower_noop(),
        other if SIMPLE_EXPRESSION_PRIMITIVES.contains_key(other) => {
            lower_simple_primitive(node, state, registry, imports, other)
        }
        other => Err(CompileError::UnknownKind { kind: other.to_string() }),
    }
}

fn lower_input(
    node: &IrNode,
    name: &str,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let input = node
        .input_node(name)
        .ok_or_else(|| CompileError::Logic(format!("'{}' is missing required input '{}'", node.kind, name)))?;
    lower_expression(input, state, registry, imports)
}

fn src(value: &TypedValue) -> String {
    value.source().expect("coercion results are always Typed").to_string()
}

fn lowercased(value: &TypedValue) -> String {
    format!("{}.toLowerCase()", src(&value.as_string()))
}

fn list_reference(id: &str) -> String {
    format!("lists[{}]", serde_json::to_string(id).expect("string serialization cannot fail"))
}

fn variable_source(id: &str) -> String {
    format!("variables[{}].value", serde_json::to_string(id).expect("string serialization cannot fail"))
}

fn sanitize_ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn is_integer_constant(value: &TypedValue) -> bool {
    if let TypedValue::Constant { literal, .. } = value {
        let n = numeric_coercion(&literal.as_text());
        n.is_finite() && n.fract() == 0.0
    } else {
        false
    }
}

fn lower_constant(node: &IrNode) -> Result<TypedValue, CompileError> {
    let literal = node
        .field("VALUE")
        .cloned()
        .ok_or_else(|| CompileError::Logic("constant node missing VALUE field".to_string()))?;
    let safe = !matches!(node.field("SAFE"), Some(Literal::Bool(false)));
    Ok(TypedValue::constant(literal, safe))
}

fn lower_var_get(node: &IrNode, state: &CompileState) -> Result<TypedValue, CompileError> {
    let id = node
        .field_text("VAR_ID")
        .ok_or_else(|| CompileError::Logic("var.get missing VAR_ID field".to_string()))?;
    if let Some(tracked) = state.variables.get(&id) {
        return Ok(tracked.clone());
    }
    Ok(TypedValue::Variable { source: variable_source(&id), ty: TypeTag::Unknown, last_assigned: None })
}

fn lower_argument(node: &IrNode) -> Result<TypedValue, CompileError> {
    let name = node
        .field_text("NAME")
        .ok_or_else(|| CompileError::Logic(format!("{} missing NAME field", node.kind)))?;
    let ty = if node.kind == "args.boolean" { TypeTag::Boolean } else { TypeTag::Unknown };
    Ok(TypedValue::typed(format!("p{}", sanitize_ident(&name)), ty))
}

/// A Constant that fails its own round-trip (`is_optimization_safe_constant`
/// is false) cannot have its text spliced as a bare numeral — `"010"`
/// would reparse as octal `8`. Such a Constant is treated as never-number
/// for this rule specifically, so equality against it always falls back
/// to its always-safe string form rather than risk misreading the
/// literal (spec §8 scenario 1).
fn equality_never_number(value: &TypedValue) -> bool {
    match value {
        TypedValue::Constant { .. } => !value.is_optimization_safe_constant(),
        _ => value.never_number(),
    }
}

fn equality_always_number(value: &TypedValue) -> bool {
    match value {
        TypedValue::Constant { .. } => value.is_optimization_safe_constant(),
        _ => value.always_number(),
    }
}

fn lower_equals(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let lhs = lower_input(node, "OPERAND1", state, registry, imports)?;
    let rhs = lower_input(node, "OPERAND2", state, registry, imports)?;
    let fragment = if equality_never_number(&lhs) || equality_never_number(&rhs) {
        format!("({} === {})", lowercased(&lhs), lowercased(&rhs))
    } else if (equality_always_number(&lhs) && equality_always_number(&rhs))
        || lhs.is_optimization_safe_constant()
        || rhs.is_optimization_safe_constant()
    {
        format!("({} === {})", src(&lhs.as_number()), src(&rhs.as_number()))
    } else {
        format!("{}({}, {})", helpers::COMPARE_EQUAL, src(&lhs.as_unknown()), src(&rhs.as_unknown()))
    };
    Ok(imports.typed(fragment, TypeTag::Boolean))
}

fn lower_ordering(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    greater: bool,
) -> Result<TypedValue, CompileError> {
    let lhs = lower_input(node, "OPERAND1", state, registry, imports)?;
    let rhs = lower_input(node, "OPERAND2", state, registry, imports)?;
    let strict_op = if greater { ">" } else { "<" };
    let fragment = if lhs.never_number() || rhs.never_number() {
        format!("({} {} {})", lowercased(&lhs), strict_op, lowercased(&rhs))
    } else if lhs.always_number() && rhs.always_number() {
        format!("({} {} {})", src(&lhs.as_number()), strict_op, src(&rhs.as_number()))
    } else if lhs.always_number_or_nan() && rhs.always_number_or_nan() {
        let complementary_op = if greater { "<=" } else { ">=" };
        format!(
            "!({} {} {})",
            src(&lhs.as_number_or_nan()),
            complementary_op,
            src(&rhs.as_number_or_nan())
        )
    } else {
        let helper = if greater { helpers::COMPARE_GREATER_THAN } else { helpers::COMPARE_LESS_THAN };
        format!("{}({}, {})", helper, src(&lhs.as_unknown()), src(&rhs.as_unknown()))
    };
    Ok(imports.typed(fragment, TypeTag::Boolean))
}

fn lower_binary_nan(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    op: &str,
) -> Result<TypedValue, CompileError> {
    let lhs = lower_input(node, "NUM1", state, registry, imports)?;
    let rhs = lower_input(node, "NUM2", state, registry, imports)?;
    let fragment = format!("({} {} {})", src(&lhs.as_number_or_nan()), op, src(&rhs.as_number_or_nan()));
    Ok(imports.typed(fragment, TypeTag::NumberOrNan))
}

fn lower_mod(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let lhs = lower_input(node, "NUM1", state, registry, imports)?;
    let rhs = lower_input(node, "NUM2", state, registry, imports)?;
    let fragment = format!("{}({}, {})", helpers::MOD, src(&lhs.as_number_or_nan()), src(&rhs.as_number_or_nan()));
    // Flagged so motion.setX/setY/setXY know to clear interpolation state
    // after the position changes (spec §4.3, §8 scenario 7).
    state.saw_modulo = true;
    Ok(imports.typed(fragment, TypeTag::NumberOrNan))
}

fn lower_boolean_binary(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    op: &str,
) -> Result<TypedValue, CompileError> {
    let lhs = lower_input(node, "OPERAND1", state, registry, imports)?;
    let rhs = lower_input(node, "OPERAND2", state, registry, imports)?;
    let fragment = format!("({} {} {})", src(&lhs.as_boolean()), op, src(&rhs.as_boolean()));
    Ok(imports.typed(fragment, TypeTag::Boolean))
}

fn lower_not(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, "OPERAND", state, registry, imports)?;
    Ok(imports.typed(format!("!({})", src(&operand.as_boolean())), TypeTag::Boolean))
}

fn lower_join(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let lhs = lower_input(node, "STRING1", state, registry, imports)?;
    let rhs = lower_input(node, "STRING2", state, registry, imports)?;
    Ok(imports.typed(format!("({} + {})", src(&lhs.as_string()), src(&rhs.as_string())), TypeTag::String))
}

fn lower_letter_of(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let letter = lower_input(node, "LETTER", state, registry, imports)?;
    let text = lower_input(node, "STRING", state, registry, imports)?;
    let idx = src(&letter.as_number());
    let s = src(&text.as_string());
    Ok(imports.typed(format!("(({}).charAt(({}|0)-1))", s, idx), TypeTag::String))
}

fn lower_string_length(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let text = lower_input(node, "STRING", state, registry, imports)?;
    Ok(imports.typed(format!("({}).length", src(&text.as_string())), TypeTag::Number))
}

fn lower_string_contains(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let haystack = lower_input(node, "STRING1", state, registry, imports)?;
    let needle = lower_input(node, "STRING2", state, registry, imports)?;
    let fragment = format!("({}).toLowerCase().includes(({}).toLowerCase())", src(&haystack.as_string()), src(&needle.as_string()));
    Ok(imports.typed(fragment, TypeTag::Boolean))
}

fn lower_unary_math(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    fn_name: &str,
    result_ty: TypeTag,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, "NUM", state, registry, imports)?;
    let operand_src = if result_ty == TypeTag::Number { src(&operand.as_number()) } else { src(&operand.as_number_or_nan()) };
    Ok(imports.typed(format!("{}({})", fn_name, operand_src), result_ty))
}

fn lower_pow10(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, "NUM", state, registry, imports)?;
    Ok(imports.typed(format!("Math.pow(10, {})", src(&operand.as_number())), TypeTag::Number))
}

/// Resolved per spec §9's open question: the intended output places
/// logarithms as `log(right)/log(left)`, regardless of the unbalanced
/// parenthesis in the original source this was distilled from.
fn lower_advlog(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let left_base = lower_input(node, "NUM1", state, registry, imports)?;
    let right_value = lower_input(node, "NUM2", state, registry, imports)?;
    let fragment = format!("(Math.log({}) / Math.log({}))", src(&right_value.as_number_or_nan()), src(&left_base.as_number_or_nan()));
    Ok(imports.typed(fragment, TypeTag::NumberOrNan))
}

fn lower_inverse_trig(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    fn_name: &str,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, "NUM", state, registry, imports)?;
    let fragment = format!("({}({}) * (180 / Math.PI))", fn_name, src(&operand.as_number_or_nan()));
    Ok(imports.typed(fragment, TypeTag::NumberOrNan))
}

fn lower_atan(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, "NUM", state, registry, imports)?;
    let fragment = format!("(Math.atan({}) * (180 / Math.PI))", src(&operand.as_number_or_nan()));
    Ok(imports.typed(fragment, TypeTag::Number))
}

/// Sine/cosine are rounded to 10 decimal places to canonicalize
/// near-zero artifacts (spec §4.2, §8 scenario 6); degree inputs are
/// scaled by π/180.
fn lower_trig(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    fn_name: &str,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, "NUM", state, registry, imports)?;
    let fragment = format!(
        "(Math.round({}({} * Math.PI / 180) * 1e10) / 1e10)",
        fn_name,
        src(&operand.as_number_or_nan())
    );
    Ok(imports.typed(fragment, TypeTag::NumberOrNan))
}

fn lower_tan(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, "NUM", state, registry, imports)?;
    let fragment = format!("{}({} * Math.PI / 180)", helpers::TAN, src(&operand.as_number_or_nan()));
    Ok(imports.typed(fragment, TypeTag::NumberOrNan))
}

fn lower_random(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let from = lower_input(node, "FROM", state, registry, imports)?;
    let to = lower_input(node, "TO", state, registry, imports)?;
    let helper = if is_integer_constant(&from) && is_integer_constant(&to) {
        helpers::RANDOM_INT
    } else {
        helpers::RANDOM_FLOAT
    };
    let fragment = format!("{}({}, {})", helper, src(&from.as_number()), src(&to.as_number()));
    Ok(imports.typed(fragment, TypeTag::NumberOrNan))
}

fn lower_list_get(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let list_id = node.field_text("LIST").ok_or_else(|| CompileError::Logic("list.get missing LIST field".to_string()))?;
    let list_ref = list_reference(&list_id);
    let index = lower_input(node, "INDEX", state, registry, imports)?;
    let is_last = matches!(&index, TypedValue::Constant { literal: Literal::Text(t), .. } if t == "last");

    if state.supports_nullish_coalescing {
        if is_last {
            return Ok(imports.typed(
                format!("({list_ref}.value[{list_ref}.value.length-1] ?? \"\")"),
                TypeTag::Unknown,
            ));
        }
        if index.always_number_or_nan() {
            let idx = src(&index.as_number_or_nan());
            return Ok(imports.typed(format!("({list_ref}.value[({idx}|0)-1] ?? \"\")"), TypeTag::Unknown));
        }
    }

    Ok(imports.typed(format!("{}({}, {})", helpers::LIST_GET, list_ref, src(&index.as_unknown())), TypeTag::Unknown))
}

fn lower_list_simple(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    helper: &str,
    ty: TypeTag,
) -> Result<TypedValue, CompileError> {
    let list_id = node.field_text("LIST").ok_or_else(|| CompileError::Logic(format!("{} missing LIST field", node.kind)))?;
    let list_ref = list_reference(&list_id);
    if helper == helpers::LIST_CONTENTS {
        return Ok(imports.typed(format!("{}({})", helper, list_ref), ty));
    }
    let item = lower_input(node, "ITEM", state, registry, imports)?;
    Ok(imports.typed(format!("{}({}, {})", helper, list_ref, src(&item.as_unknown())), ty))
}

fn lower_list_length(node: &IrNode) -> Result<TypedValue, CompileError> {
    let list_id = node.field_text("LIST").ok_or_else(|| CompileError::Logic("list.length missing LIST field".to_string()))?;
    Ok(TypedValue::typed(format!("{}.value.length", list_reference(&list_id)), TypeTag::Number))
}

fn lower_helper_call1(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    helper: &str,
    input_name: &str,
    ty: TypeTag,
) -> Result<TypedValue, CompileError> {
    let operand = lower_input(node, input_name, state, registry, imports)?;
    Ok(imports.typed(format!("{}({})", helper, src(&operand.as_unknown())), ty))
}

/// Sensing `of`: a constant target resolves object and variable
/// references at setup time (hoisted via `setup-bindings`); non-constant
/// targets route through the dynamic lookup path instead (spec §4.2).
fn lower_sensing_of(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let property = node
        .field_text("PROPERTY")
        .ok_or_else(|| CompileError::Logic("sensing.of missing PROPERTY field".to_string()))?;
    let property_literal = serde_json::to_string(&property).expect("string serialization cannot fail");

    if let Some(target_name) = node.field_text("OBJECT") {
        let lookup_expr = if target_name == "_stage_" {
            "runtime.getTargetForStage()".to_string()
        } else {
            format!(
                "runtime.getSpriteTargetByName({})",
                serde_json::to_string(&target_name).expect("string serialization cannot fail")
            )
        };
        let bound = state.setup_bindings.get_or_insert(&lookup_expr);
        return Ok(imports.typed(format!("sensingOfProperty({}, {})", bound, property_literal), TypeTag::Unknown));
    }

    let target = lower_input(node, "OBJECT", state, registry, imports)?;
    let fragment = format!("sensingOfProperty({}, {})", src(&target.as_unknown()), property_literal);
    Ok(imports.typed(fragment, TypeTag::Unknown))
}

/// Inline-stack expression: a stack block used in an expression slot.
/// Emits a self-invoked suspendable sub-function around a descended
/// statement list; after descent, restores the outer `emitted-source`
/// buffer and returns the sub-expression as the value (spec §4.2).
fn lower_inline_stack_output(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    let result_source = node.field_text("RESULT_VAR").unwrap_or_else(|| "undefined".to_string());

    let saved_output = std::mem::take(&mut state.output);
    super::statements::lower_statement_list(&stack, state, registry, imports, false)?;
    let inner_body = std::mem::replace(&mut state.output, saved_output);

    let fragment = format!("(yield* (function* () {{\n{}return {};\n}})())", inner_body, result_source);
    Ok(imports.typed(fragment, TypeTag::Unknown))
}

fn lower_compat_expression(node: &IrNode, state: &CompileState) -> Result<TypedValue, CompileError> {
    if !state.script_yields {
        return Err(CompileError::YieldMismatch { kind: node.kind.clone() });
    }
    let opcode = node.field_text("OPCODE").unwrap_or_default();
    let opcode_literal = serde_json::to_string(&opcode).expect("string serialization cannot fail");
    let fragment = format!("(yield* {}(thread, {}))", helpers::EXECUTE_IN_COMPATIBILITY_LAYER, opcode_literal);
    Ok(TypedValue::typed(fragment, TypeTag::Unknown))
}

/// An "unexpected noop" is logged and does not abort compilation: per
/// spec §9's open question, a failed/undefined value substitutes an
/// empty-string constant instead of propagating a null downstream.
fn lower_noop() -> Result<TypedValue, CompileError> {
    tracing::warn!("unexpected noop block encountered during lowering");
    Ok(TypedValue::constant(Literal::Text(String::new()), true))
}

fn lower_simple_primitive(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    kind: &str,
) -> Result<TypedValue, CompileError> {
    let entry = SIMPLE_EXPRESSION_PRIMITIVES.get(kind).expect("dispatched only for a registered simple kind");
    let mut args = Vec::with_capacity(entry.inputs.len());
    for input_name in entry.inputs {
        let value = lower_input(node, input_name, state, registry, imports)?;
        args.push(src(&value.as_unknown()));
    }
    Ok(imports.typed(format!("{}({})", entry.primitive, args.join(", ")), TypeTag::Unknown))
}

/// Shared by the expression form (`procedures.call` reporting a value)
/// and the statement form (`procedures.call` as a void call): if the IR
/// marks the callee as yielding, prepend a suspension delegator; if the
/// callee matches the enclosing script's own procedure code and we are
/// not in warp mode, insert a yield before the call to avoid tight direct
/// recursion. Clears the Variable Tracker after the call (spec §4.2).
pub(super) fn procedure_call_fragment(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    is_expression: bool,
) -> Result<TypedValue, CompileError> {
    let proc_code = node
        .field_text("PROC_CODE")
        .ok_or_else(|| CompileError::Logic("procedures.call missing PROC_CODE field".to_string()))?;
    let callee_yields = matches!(node.field("YIELDS"), Some(Literal::Bool(true)));

    let mut arg_names: Vec<&String> = node.inputs.keys().filter(|k| k.starts_with("ARG")).collect();
    arg_names.sort();
    let mut args = Vec::with_capacity(arg_names.len());
    for name in arg_names {
        let value = lower_input(node, name, state, registry, imports)?;
        args.push(src(&value.as_unknown()));
    }

    let is_self_recursive = state.current_procedure_code.as_deref() == Some(proc_code.as_str());
    if is_self_recursive && !state.is_warp {
        state.yield_not_warp(&node.kind)?;
    }

    let proc_literal = serde_json::to_string(&proc_code).expect("string serialization cannot fail");
    let call = format!("callProcedure(thread, {}, [{}])", proc_literal, args.join(", "));
    let fragment = if callee_yields {
        if !state.script_yields {
            return Err(CompileError::YieldMismatch { kind: node.kind.clone() });
        }
        format!("(yield* {})", call)
    } else {
        call
    };

    state.variables.clear();

    if is_expression {
        Ok(imports.typed(fragment, TypeTag::Unknown))
    } else {
        state.output.push_str(&fragment);
        state.output.push_str(";\n");
        Ok(TypedValue::constant(Literal::Text(String::new()), true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Literal;

    fn state() -> CompileState {
        let mut s = CompileState::new(false, false);
        s.script_yields = true;
        s
    }

    fn registry() -> ExtensionRegistry {
        ExtensionRegistry::new()
    }

    const IMPORTS: ImportsRecord = ImportsRecord;

    fn constant_text(text: &str) -> IrNode {
        IrNode::new("constant").with_field("VALUE", Literal::Text(text.to_string()))
    }

    fn constant_number(n: f64) -> IrNode {
        IrNode::new("constant").with_field("VALUE", Literal::Number(n))
    }

    #[test]
    fn scenario_1_nonroundtripping_numeric_strings_compare_as_strings() {
        let node = IrNode::new("op.equals")
            .with_input("OPERAND1", constant_text("10"))
            .with_input("OPERAND2", constant_text("010"));
        let mut s = state();
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        let fragment = value.source().unwrap();
        assert!(fragment.contains("toLowerCase"), "expected string compare, got {fragment}");
    }

    #[test]
    fn scenario_2_optimization_safe_constant_compares_numerically() {
        let add = IrNode::new("op.add")
            .with_input("NUM1", constant_number(2.0))
            .with_input("NUM2", constant_number(3.0));
        let node = IrNode::new("op.equals")
            .with_input("OPERAND1", constant_number(5.0))
            .with_input("OPERAND2", add);
        let mut s = state();
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        let fragment = value.source().unwrap();
        assert_eq!(fragment, "(5 === ((2 + 3) || 0))");
    }

    #[test]
    fn scenario_6_cosine_of_90_degrees_rounds_to_zero() {
        let node = IrNode::new("op.cos").with_input("NUM", constant_number(90.0));
        let mut s = state();
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        assert_eq!(
            value.source().unwrap(),
            "(Math.round(Math.cos(90 * Math.PI / 180) * 1e10) / 1e10)"
        );
    }

    #[test]
    fn scenario_5_list_get_last_uses_direct_indexing() {
        let node = IrNode::new("list.get")
            .with_field("LIST", Literal::Text("myList".to_string()))
            .with_input("INDEX", constant_text("last"));
        let mut s = state();
        s.supports_nullish_coalescing = true;
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        let expected = "(lists[\"myList\"].value[lists[\"myList\"].value.length-1] ?? \"\")";
        assert_eq!(value.source().unwrap(), expected);
    }

    #[test]
    fn list_get_numeric_index_uses_direct_indexing_when_supported() {
        let node = IrNode::new("list.get")
            .with_field("LIST", Literal::Text("myList".to_string()))
            .with_input("INDEX", constant_number(2.0));
        let mut s = state();
        s.supports_nullish_coalescing = true;
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        assert_eq!(value.source().unwrap(), "(lists[\"myList\"].value[(2|0)-1] ?? \"\")");
    }

    #[test]
    fn list_get_falls_back_to_helper_without_nullish_support() {
        let node = IrNode::new("list.get")
            .with_field("LIST", Literal::Text("myList".to_string()))
            .with_input("INDEX", constant_number(2.0));
        let mut s = state();
        s.supports_nullish_coalescing = false;
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        assert_eq!(value.source().unwrap(), "listGet(lists[\"myList\"], 2)");
    }

    #[test]
    fn list_get_last_falls_back_to_helper_without_nullish_support() {
        let node = IrNode::new("list.get")
            .with_field("LIST", Literal::Text("myList".to_string()))
            .with_input("INDEX", constant_text("last"));
        let mut s = state();
        s.supports_nullish_coalescing = false;
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        assert_eq!(value.source().unwrap(), "listGet(lists[\"myList\"], \"last\")");
    }

    #[test]
    fn unknown_kind_is_reported() {
        let node = IrNode::new("your mom");
        let mut s = state();
        let err = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap_err();
        assert!(matches!(err, CompileError::UnknownKind { .. }));
    }

    #[test]
    fn noop_logs_and_returns_empty_string_constant() {
        let node = IrNode::new("noop");
        let mut s = state();
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        assert_eq!(value, TypedValue::constant(Literal::Text(String::new()), true));
    }

    #[test]
    fn mod_marks_saw_modulo() {
        let node = IrNode::new("op.mod")
            .with_input("NUM1", constant_number(10.0))
            .with_input("NUM2", constant_number(3.0));
        let mut s = state();
        assert!(!s.saw_modulo);
        lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        assert!(s.saw_modulo);
    }

    #[test]
    fn advlog_emits_log_right_over_log_left() {
        let node = IrNode::new("op.advlog")
            .with_input("NUM1", constant_number(2.0))
            .with_input("NUM2", constant_number(8.0));
        let mut s = state();
        let value = lower_expression(&node, &mut s, &registry(), &IMPORTS).unwrap();
        assert_eq!(value.source().unwrap(), "(Math.log(8) / Math.log(2))");
    }
}
