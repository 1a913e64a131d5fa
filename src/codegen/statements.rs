//! Statement Lowerer
//!
//! Dispatches on statement-node kind; appends to the emitted body buffer.
//! Houses control flow, variable/list mutation, motion/looks/pen/sound
//! side-effects, procedure call statements, and wait/yield insertion
//! (spec §4.3). Mirrors the teacher's `codegen/control_flow.rs` +
//! `codegen/statements.rs` split, collapsed into one file here since this
//! crate has a single flat emission buffer rather than basic blocks.

use super::expressions;
use super::state::CompileState;
use crate::error::CompileError;
use crate::extension::{ExtensionRegistry, ImportsRecord};
use crate::ir::IrNode;
use crate::runtime_helpers::{helpers, SimplePrimitive, SIMPLE_STATEMENT_PRIMITIVES};
use crate::typed_value::TypedValue;
use crate::types::TypeTag;

/// Top-level statement dispatch (spec §4.3, §4.4).
pub fn lower_statement(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    if registry.has_extension(node.extension_id()) {
        if let Some(result) = registry.try_lower_statement(node, state, imports) {
            return result;
        }
        return Ok(());
    }

    match node.kind.as_str() {
        "control.if" => lower_if(node, state, registry, imports),
        "control.repeat" => lower_repeat(node, state, registry, imports),
        "control.while" => lower_while(node, state, registry, imports),
        "control.for" => lower_for(node, state, registry, imports),
        "control.forever" => lower_forever(node, state, registry, imports),
        "control.wait" => lower_wait(node, state, registry, imports),
        "control.waitUntil" | "control.waitOrUntil" => lower_wait_until(node, state, registry, imports),
        "control.allAtOnce" => lower_all_at_once(node, state, registry, imports),
        "control.stopAll" | "control.stopOthers" | "control.stopScript" => lower_stop(node, state),
        "control.runAsSprite" => lower_run_as_sprite(node, state, registry, imports),
        "control.switch" => lower_switch(node, state, registry, imports),
        "control.case" => lower_case(node, state, registry, imports),
        "control.exitCase" => lower_exit_case(node, state, registry, imports),
        "control.newScript" => lower_new_script(node, state, registry, imports),
        "event.broadcast" => lower_broadcast(node, state, registry, imports, false),
        "event.broadcastAndWait" => lower_broadcast(node, state, registry, imports, true),
        "list.forEach" => lower_list_for_each(node, state, registry, imports),
        "list.insert" => lower_list_mutation(node, state, registry, imports, helpers::LIST_INSERT, &["INDEX", "ITEM"]),
        "list.replace" => lower_list_mutation(node, state, registry, imports, helpers::LIST_REPLACE, &["INDEX", "ITEM"]),
        "list.delete" => lower_list_mutation(node, state, registry, imports, helpers::LIST_DELETE, &["INDEX"]),
        "motion.setX" | "motion.setY" | "motion.setXY" => lower_set_position(node, state, registry, imports),
        "procedures.return" => lower_procedures_return(node, state, registry, imports),
        "procedures.call" => expressions::procedure_call_fragment(node, state, registry, imports, false).map(|_| ()),
        "tw.debugger" => {
            state.output.push_str("debugger;\n");
            Ok(())
        }
        "var.set" => lower_var_set(node, state, registry, imports),
        "sensing.set.of" => lower_sensing_set_of(node, state, registry, imports),
        "visualReport" => lower_visual_report(node, state, registry, imports),
        "addons.call" => lower_addons_call(node, state, registry, imports),
        "compat" => lower_compat_statement(node, state),
        other if SIMPLE_STATEMENT_PRIMITIVES.contains_key(other) => {
            lower_simple_statement(node, state, registry, imports, other)
        }
        other => Err(CompileError::UnknownKind { kind: other.to_string() }),
    }
}

/// Stack descent contract (spec §4.3): push a Frame, clear the Variable
/// Tracker, iterate statements marking `is-last-block` on the final
/// element, then clear the tracker again and pop the Frame.
pub(crate) fn lower_statement_list(
    stack: &[IrNode],
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    is_loop: bool,
) -> Result<(), CompileError> {
    state.frames.push(is_loop);
    state.variables.clear();
    for (i, node) in stack.iter().enumerate() {
        state.frames.set_last_block(i + 1 == stack.len());
        lower_statement(node, state, registry, imports)?;
    }
    state.variables.clear();
    state.frames.pop();
    Ok(())
}

fn lower_expr(
    node: &IrNode,
    name: &str,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<TypedValue, CompileError> {
    let input = node
        .input_node(name)
        .ok_or_else(|| CompileError::Logic(format!("'{}' is missing required input '{}'", node.kind, name)))?;
    expressions::lower_expression(input, state, registry, imports)
}

fn src(value: &TypedValue) -> String {
    value.source().expect("coercion results are always Typed").to_string()
}

fn list_reference(id: &str) -> String {
    format!("lists[{}]", serde_json::to_string(id).expect("string serialization cannot fail"))
}

fn variable_source(id: &str) -> String {
    format!("variables[{}].value", serde_json::to_string(id).expect("string serialization cannot fail"))
}

fn sorted_arg_inputs(node: &IrNode) -> Vec<&String> {
    let mut keys: Vec<&String> = node.inputs.keys().filter(|k| k.starts_with("ARG")).collect();
    keys.sort();
    keys
}

fn lower_if(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let cond = lower_expr(node, "CONDITION", state, registry, imports)?;
    state.output.push_str(&format!("if ({}) {{\n", src(&cond.as_boolean())));
    let then_stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&then_stack, state, registry, imports, false)?;
    state.output.push_str("}\n");
    if let Some(else_stack) = node.input_stack("SUBSTACK2") {
        if !else_stack.is_empty() {
            let else_stack = else_stack.to_vec();
            state.output.push_str("else {\n");
            lower_statement_list(&else_stack, state, registry, imports, false)?;
            state.output.push_str("}\n");
        }
    }
    Ok(())
}

/// `c = asNumber(N); for (; c >= 0.5; c--) { body; yield-loop }`. The
/// `>= 0.5` threshold matches legacy rounding (spec §4.3, §8 scenario 3).
fn lower_repeat(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let times = lower_expr(node, "TIMES", state, registry, imports)?;
    let counter = state.temp_pool.next();
    state.output.push_str(&format!(
        "let {c} = {times};\nfor (; {c} >= 0.5; {c}--) {{\n",
        c = counter,
        times = src(&times.as_number())
    ));
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, true)?;
    state.yield_loop(&node.kind)?;
    state.output.push_str("}\n");
    Ok(())
}

fn lower_while(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    state.output.push_str("while (true) {\n");
    let cond = lower_expr(node, "CONDITION", state, registry, imports)?;
    state.output.push_str(&format!("if (!({})) {{\nbreak;\n}}\n", src(&cond.as_boolean())));
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, true)?;
    state.yield_loop(&node.kind)?;
    state.output.push_str("}\n");
    Ok(())
}

/// Counter temporary starts at 0, pre-incremented each iteration, and
/// assigned into the IR variable before the body runs (spec §4.3).
fn lower_for(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let to = lower_expr(node, "TO", state, registry, imports)?;
    let var_id = node
        .field_text("VARIABLE")
        .ok_or_else(|| CompileError::Logic("control.for missing VARIABLE field".to_string()))?;
    let counter = state.temp_pool.next();
    let bound = state.temp_pool.next();
    state.output.push_str(&format!(
        "let {c} = 0;\nconst {bound} = {to};\nwhile ({c} < {bound}) {{\n{c}++;\n{var} = {c};\n",
        c = counter,
        bound = bound,
        to = src(&to.as_number()),
        var = variable_source(&var_id)
    ));
    state.variables.set(
        var_id.clone(),
        TypedValue::Variable {
            source: variable_source(&var_id),
            ty: TypeTag::Number,
            last_assigned: Some(Box::new(TypedValue::typed(counter.clone(), TypeTag::Number))),
        },
    );
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, true)?;
    state.yield_loop(&node.kind)?;
    state.output.push_str("}\n");
    Ok(())
}

fn lower_forever(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    state.output.push_str("while (true) {\n");
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, true)?;
    state.yield_loop(&node.kind)?;
    state.output.push_str("}\n");
    Ok(())
}

/// Record `thread.timer`, request a redraw, yield at least once
/// unconditionally (even for `0`), then spin on elapsed time with
/// stuck-or-not-warp yields; null the timer on exit (spec §4.3, §8
/// scenario 4).
fn lower_wait(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let seconds = lower_expr(node, "DURATION", state, registry, imports)?;
    let seconds_src = src(&seconds.as_number());
    state
        .output
        .push_str(&format!("thread.timer = {}();\nruntime.requestRedraw();\n", helpers::TIMER));
    state.emit_yield(&node.kind)?;
    state.output.push_str(&format!("while (thread.timer.timeElapsed() < ({} * 1000)) {{\n", seconds_src));
    state.yield_stuck_or_not_warp(&node.kind)?;
    state.output.push_str("}\nthread.timer = null;\n");
    Ok(())
}

fn lower_wait_until(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    state.variables.clear();
    let cond = lower_expr(node, "CONDITION", state, registry, imports)?;
    state.output.push_str(&format!("while (!({})) {{\n", src(&cond.as_boolean())));
    state.yield_stuck_or_not_warp(&node.kind)?;
    state.output.push_str("}\n");
    Ok(())
}

fn lower_all_at_once(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    let saved_warp = state.is_warp;
    state.is_warp = true;
    let result = lower_statement_list(&stack, state, registry, imports, false);
    state.is_warp = saved_warp;
    result
}

fn lower_stop(node: &IrNode, state: &mut CompileState) -> Result<(), CompileError> {
    match node.kind.as_str() {
        "control.stopAll" => state.output.push_str("runtime.stopAll();\nretire();\n"),
        "control.stopOthers" => state.output.push_str("runtime.stopForTarget(target, thread);\n"),
        "control.stopScript" => {
            if state.is_procedure {
                state.output.push_str("return;\n");
            } else {
                state.output.push_str("retire();\n");
            }
        }
        other => unreachable!("lower_stop dispatched for non-stop kind {other}"),
    }
    Ok(())
}

/// Save the current target in a temporary, wrap the nested descent in
/// exception-safe code that sets and restores `thread.target`,
/// `thread.spoofing`, and `thread.spoofTarget` (spec §4.3).
fn lower_run_as_sprite(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let target = lower_expr(node, "TARGET", state, registry, imports)?;
    let target_src = src(&target.as_unknown());
    let saved_target = state.temp_pool.next();
    let saved_spoofing = state.temp_pool.next();
    let saved_spoof_target = state.temp_pool.next();
    state.output.push_str(&format!(
        "const {st} = thread.target;\nconst {ss} = thread.spoofing;\nconst {sp} = thread.spoofTarget;\ntry {{\nthread.target = {t};\nthread.spoofing = true;\nthread.spoofTarget = {t};\ntarget = {t};\n",
        st = saved_target,
        ss = saved_spoofing,
        sp = saved_spoof_target,
        t = target_src
    ));
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, false)?;
    state.output.push_str(&format!(
        "}} finally {{\nthread.target = {st};\nthread.spoofing = {ss};\nthread.spoofTarget = {sp};\n}}\n",
        st = saved_target,
        ss = saved_spoofing,
        sp = saved_spoof_target,
    ));
    Ok(())
}

/// `control.switch`/`control.case`/`control.exitCase` map onto a native
/// `switch` statement so JS's own case fall-through is preserved rather
/// than reimplemented (spec §9 open question).
fn lower_switch(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let subject = lower_expr(node, "VALUE", state, registry, imports)?;
    state.output.push_str(&format!("switch ({}) {{\n", src(&subject.as_unknown())));
    let cases = node.input_stack("CASES").unwrap_or(&[]).to_vec();
    for case in &cases {
        lower_statement(case, state, registry, imports)?;
    }
    state.output.push_str("}\n");
    Ok(())
}

fn lower_case(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let label = lower_case_label(node, state, registry, imports)?;
    state.output.push_str(&format!("case {}:\n", label));
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, false)
}

/// Distinguished from `control.case` only by the trailing `break`, which
/// ends fall-through for this branch and the ones it falls into (spec §9
/// open question).
fn lower_exit_case(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let label = lower_case_label(node, state, registry, imports)?;
    state.output.push_str(&format!("case {}:\n", label));
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, false)?;
    state.output.push_str("break;\n");
    Ok(())
}

fn lower_case_label(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<String, CompileError> {
    if node.input_node("VALUE").is_some() {
        let value = lower_expr(node, "VALUE", state, registry, imports)?;
        Ok(src(&value.as_unknown()))
    } else {
        Ok("default".to_string())
    }
}

/// Spawns a detached suspendable sub-function for the nested stack on the
/// sequencer rather than awaiting it inline (spec §6 `_pushThread`).
fn lower_new_script(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    let saved_output = std::mem::take(&mut state.output);
    lower_statement_list(&stack, state, registry, imports, false)?;
    let inner_body = std::mem::replace(&mut state.output, saved_output);
    state
        .output
        .push_str(&format!("runtime._pushThread(target, (function* () {{\n{}}})());\n", inner_body));
    Ok(())
}

/// Spawn hats, then `yield*` the `waitThreads` helper; marks the
/// compilation as having yielded (spec §4.3).
fn lower_broadcast(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    wait: bool,
) -> Result<(), CompileError> {
    let message = lower_expr(node, "BROADCAST_INPUT", state, registry, imports)?;
    let message_src = src(&message.as_string());
    if wait {
        state.emit_yield_delegate(&format!("{}({}({}))", helpers::WAIT_THREADS, helpers::START_HATS, message_src), &node.kind)?;
        state.variables.clear();
    } else {
        state.output.push_str(&format!("{}({});\n", helpers::START_HATS, message_src));
        state.variables.clear();
    }
    Ok(())
}

fn lower_list_for_each(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let list_id = node
        .field_text("LIST")
        .ok_or_else(|| CompileError::Logic("list.forEach missing LIST field".to_string()))?;
    let var_id = node
        .field_text("VARIABLE")
        .ok_or_else(|| CompileError::Logic("list.forEach missing VARIABLE field".to_string()))?;
    let list_ref = list_reference(&list_id);
    let counter = state.temp_pool.next();
    state.output.push_str(&format!(
        "let {c} = 0;\nwhile ({c} < {list}.value.length) {{\n{var} = {list}.value[{c}];\n{c}++;\n",
        c = counter,
        list = list_ref,
        var = variable_source(&var_id)
    ));
    let stack = node.input_stack("SUBSTACK").unwrap_or(&[]).to_vec();
    lower_statement_list(&stack, state, registry, imports, true)?;
    state.yield_loop(&node.kind)?;
    state.output.push_str("}\n");
    Ok(())
}

fn lower_list_mutation(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    helper: &str,
    extra_inputs: &[&str],
) -> Result<(), CompileError> {
    let list_id = node.field_text("LIST").ok_or_else(|| CompileError::Logic(format!("{} missing LIST field", node.kind)))?;
    let mut args = vec![list_reference(&list_id)];
    for name in extra_inputs {
        let value = lower_expr(node, name, state, registry, imports)?;
        args.push(src(&value.as_unknown()));
    }
    state.output.push_str(&format!("{}({});\n", helper, args.join(", ")));
    Ok(())
}

/// Clears `saw-modulo`; if the input lowering had to emit the modulo
/// helper, nulls the target's interpolation state after the position
/// change so the interpolator does not lerp across a wrap (spec §4.3, §8
/// scenario 7).
fn lower_set_position(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    state.saw_modulo = false;
    match node.kind.as_str() {
        "motion.setX" => {
            let x = lower_expr(node, "X", state, registry, imports)?;
            state.output.push_str(&format!("setXPosition({});\n", src(&x.as_number())));
        }
        "motion.setY" => {
            let y = lower_expr(node, "Y", state, registry, imports)?;
            state.output.push_str(&format!("setYPosition({});\n", src(&y.as_number())));
        }
        "motion.setXY" => {
            let x = lower_expr(node, "X", state, registry, imports)?;
            let y = lower_expr(node, "Y", state, registry, imports)?;
            state.output.push_str(&format!("setXY({}, {});\n", src(&x.as_number()), src(&y.as_number())));
        }
        other => unreachable!("lower_set_position dispatched for non-position kind {other}"),
    }
    if state.saw_modulo {
        state.output.push_str("target.interpolationData = null;\n");
    }
    Ok(())
}

fn lower_procedures_return(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    if node.input_node("VALUE").is_some() {
        let value = lower_expr(node, "VALUE", state, registry, imports)?;
        state.output.push_str(&format!("return {};\n", src(&value.as_unknown())));
    } else {
        state.output.push_str("return;\n");
    }
    Ok(())
}

fn lower_var_set(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let var_id = node
        .field_text("VAR_ID")
        .ok_or_else(|| CompileError::Logic("var.set missing VAR_ID field".to_string()))?;
    let value = lower_expr(node, "VALUE", state, registry, imports)?;
    state.output.push_str(&format!("{} = {};\n", variable_source(&var_id), src(&value.as_unknown())));
    let last_assigned = TypedValue::resolve_for_assignment(value);
    state.variables.set(
        var_id.clone(),
        TypedValue::Variable { source: variable_source(&var_id), ty: TypeTag::Unknown, last_assigned },
    );
    Ok(())
}

fn lower_sensing_set_of(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let property = node
        .field_text("PROPERTY")
        .ok_or_else(|| CompileError::Logic("sensing.set.of missing PROPERTY field".to_string()))?;
    let property_literal = serde_json::to_string(&property).expect("string serialization cannot fail");
    let value = lower_expr(node, "VALUE", state, registry, imports)?;
    let value_src = src(&value.as_unknown());

    let target_src = if let Some(target_name) = node.field_text("OBJECT") {
        let lookup_expr = if target_name == "_stage_" {
            "runtime.getTargetForStage()".to_string()
        } else {
            format!(
                "runtime.getSpriteTargetByName({})",
                serde_json::to_string(&target_name).expect("string serialization cannot fail")
            )
        };
        state.setup_bindings.get_or_insert(&lookup_expr)
    } else {
        let target = lower_expr(node, "OBJECT", state, registry, imports)?;
        src(&target.as_unknown())
    };

    state
        .output
        .push_str(&format!("sensingSetOfProperty({}, {}, {});\n", target_src, property_literal, value_src));
    Ok(())
}

fn lower_visual_report(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let block_id = node.field_text("BLOCK_ID").unwrap_or_default();
    let literal = serde_json::to_string(&block_id).expect("string serialization cannot fail");
    let value = lower_expr(node, "VALUE", state, registry, imports)?;
    state.output.push_str(&format!("runtime.visualReport({}, {});\n", literal, src(&value.as_unknown())));
    Ok(())
}

fn lower_addons_call(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
) -> Result<(), CompileError> {
    let addon_id = node.field_text("ADDON_ID").unwrap_or_default();
    let block_id = node.field_text("BLOCK_ID").unwrap_or_default();
    let addon_literal = serde_json::to_string(&addon_id).expect("string serialization cannot fail");
    let block_literal = serde_json::to_string(&block_id).expect("string serialization cannot fail");

    let mut args = Vec::new();
    for name in sorted_arg_inputs(node) {
        let value = expressions::lower_expression(
            node.input_node(name).expect("name came from node.inputs"),
            state,
            registry,
            imports,
        )?;
        args.push(src(&value.as_unknown()));
    }

    state
        .output
        .push_str(&format!("runtime.getAddonBlock({}, {})({});\n", addon_literal, block_literal, args.join(", ")));
    Ok(())
}

fn lower_compat_statement(node: &IrNode, state: &mut CompileState) -> Result<(), CompileError> {
    let opcode = node.field_text("OPCODE").unwrap_or_default();
    let literal = serde_json::to_string(&opcode).expect("string serialization cannot fail");
    let call = format!("{}(thread, {})", helpers::EXECUTE_IN_COMPATIBILITY_LAYER, literal);
    // spec §5: compat calls are a suspension point only when last-in-loop;
    // the last-in-loop flag is what triggers re-entry via delegation.
    if state.frames.is_last_block_in_loop() {
        state.emit_yield_delegate(&call, &node.kind)
    } else {
        state.output.push_str(&format!("{};\n", call));
        Ok(())
    }
}

fn lower_simple_statement(
    node: &IrNode,
    state: &mut CompileState,
    registry: &ExtensionRegistry,
    imports: &ImportsRecord,
    kind: &str,
) -> Result<(), CompileError> {
    let entry: &SimplePrimitive =
        SIMPLE_STATEMENT_PRIMITIVES.get(kind).expect("dispatched only for a registered simple kind");
    let mut args = Vec::with_capacity(entry.inputs.len());
    for input_name in entry.inputs {
        let value = lower_expr(node, input_name, state, registry, imports)?;
        args.push(src(&value.as_unknown()));
    }
    state.output.push_str(&format!("{}({});\n", entry.primitive, args.join(", ")));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Literal;

    fn registry() -> ExtensionRegistry {
        ExtensionRegistry::new()
    }

    const IMPORTS: ImportsRecord = ImportsRecord;

    fn constant_number(n: f64) -> IrNode {
        IrNode::new("constant").with_field("VALUE", Literal::Number(n))
    }

    #[test]
    fn scenario_3_repeat_uses_half_threshold() {
        let node = IrNode::new("control.repeat")
            .with_input("TIMES", constant_number(3.0))
            .with_stack("SUBSTACK", vec![]);
        let mut state = CompileState::new(false, false);
        state.script_yields = true;
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.output.contains(">= 0.5"));
    }

    #[test]
    fn scenario_4_wait_zero_yields_unconditionally() {
        let node = IrNode::new("control.wait").with_input("DURATION", constant_number(0.0));
        let mut state = CompileState::new(false, false);
        state.script_yields = true;
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.output.contains("yield;\n"));
        assert!(state.output.contains("thread.timer = null;"));
    }

    #[test]
    fn scenario_7_set_xy_nulls_interpolation_after_modulo() {
        let modulo = IrNode::new("op.mod")
            .with_input("NUM1", constant_number(10.0))
            .with_input("NUM2", constant_number(3.0));
        let node = IrNode::new("motion.setXY").with_input("X", modulo).with_input("Y", constant_number(0.0));
        let mut state = CompileState::new(false, false);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.output.contains("target.interpolationData = null;"));
    }

    #[test]
    fn set_x_without_modulo_does_not_touch_interpolation() {
        let node = IrNode::new("motion.setX").with_input("X", constant_number(5.0));
        let mut state = CompileState::new(false, false);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(!state.output.contains("interpolationData"));
    }

    #[test]
    fn if_without_else_emits_no_empty_else() {
        let node = IrNode::new("control.if").with_input("CONDITION", constant_number(1.0)).with_stack("SUBSTACK", vec![]);
        let mut state = CompileState::new(false, false);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(!state.output.contains("else"));
    }

    #[test]
    fn stop_script_inside_procedure_returns_instead_of_retiring() {
        let node = IrNode::new("control.stopScript");
        let mut state = CompileState::new(false, true);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.output.contains("return;"));
        assert!(!state.output.contains("retire()"));
    }

    #[test]
    fn unknown_statement_kind_is_reported() {
        let node = IrNode::new("your mom");
        let mut state = CompileState::new(false, false);
        let err = lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap_err();
        assert!(matches!(err, CompileError::UnknownKind { .. }));
    }

    #[test]
    fn var_set_populates_tracker_for_subsequent_reads() {
        let node = IrNode::new("var.set")
            .with_field("VAR_ID", Literal::Text("v".to_string()))
            .with_input("VALUE", constant_number(5.0));
        let mut state = CompileState::new(false, false);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.variables.get("v").is_some());
    }

    #[test]
    fn switch_preserves_native_fallthrough_syntax() {
        let case = IrNode::new("control.case").with_input("VALUE", constant_number(1.0)).with_stack("SUBSTACK", vec![]);
        let exit = IrNode::new("control.exitCase").with_input("VALUE", constant_number(2.0)).with_stack("SUBSTACK", vec![]);
        let node = IrNode::new("control.switch")
            .with_input("VALUE", constant_number(1.0))
            .with_stack("CASES", vec![case, exit]);
        let mut state = CompileState::new(false, false);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.output.contains("switch ("));
        assert!(state.output.contains("case 1:\n"));
        assert!(state.output.contains("case 2:\nbreak;\n"));
    }

    fn constant_text(s: &str) -> IrNode {
        IrNode::new("constant").with_field("VALUE", Literal::Text(s.to_string()))
    }

    #[test]
    fn compat_statement_delegates_when_last_in_loop() {
        let node = IrNode::new("compat").with_field("OPCODE", Literal::Text("looks_someBlock".to_string()));
        let mut state = CompileState::new(false, false);
        state.script_yields = true;
        state.frames.push(true);
        state.frames.set_last_block(true);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.output.contains("yield* executeInCompatibilityLayer"));
    }

    #[test]
    fn compat_statement_does_not_delegate_when_not_last_in_loop() {
        let node = IrNode::new("compat").with_field("OPCODE", Literal::Text("looks_someBlock".to_string()));
        let mut state = CompileState::new(false, false);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(!state.output.contains("yield*"));
        assert!(state.output.contains("executeInCompatibilityLayer(thread,"));
    }

    fn populate_tracker(state: &mut CompileState) {
        let set_node = IrNode::new("var.set")
            .with_field("VAR_ID", Literal::Text("v".to_string()))
            .with_input("VALUE", constant_number(5.0));
        lower_statement(&set_node, state, &registry(), &IMPORTS).unwrap();
        assert!(state.variables.get("v").is_some());
    }

    #[test]
    fn broadcast_and_wait_clears_tracker() {
        let node = IrNode::new("event.broadcastAndWait").with_input("BROADCAST_INPUT", constant_text("go"));
        let mut state = CompileState::new(false, false);
        state.script_yields = true;
        populate_tracker(&mut state);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(state.variables.get("v").is_none());
    }

    #[test]
    fn broadcast_without_wait_also_clears_tracker() {
        let node = IrNode::new("event.broadcast").with_input("BROADCAST_INPUT", constant_text("go"));
        let mut state = CompileState::new(false, false);
        populate_tracker(&mut state);
        lower_statement(&node, &mut state, &registry(), &IMPORTS).unwrap();
        assert!(!state.output.contains("yield"));
        assert!(state.variables.get("v").is_none());
    }
}
