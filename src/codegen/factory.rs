//! Factory Assembler
//!
//! Wraps the accumulated statement-lowering output in a factory closure:
//! binds the thread handle, hoists the setup-bindings, selects a plain or
//! suspendable function form for the inner script, and appends the
//! terminal `retire` for top-level scripts (spec §4.5). Plays the role
//! the teacher's `codegen_main`/`emit_runtime_decls` pairing plays in
//! `codegen/program.rs` — a final assembly pass that wraps per-word
//! bodies the lowering stages already produced into one complete
//! top-level unit, rather than doing any lowering itself.

use super::state::CompileState;
use crate::name_pool::{factory_pool, script_pool, suspendable_script_pool};

/// Assemble the final factory source for one script compilation.
///
/// `arguments` names the script's formal parameters in declaration
/// order (spec §6: `scriptFn(p0, p1, …)`); `is_procedure` suppresses the
/// terminal `retire()` a top-level hat script otherwise gets (spec §4.5
/// step 6, §4.3 "stop-script inside a procedure").
pub fn assemble(state: &CompileState, arguments: &[String], is_procedure: bool) -> String {
    let factory_name = factory_pool().next();
    let script_name = if state.script_yields { suspendable_script_pool().next() } else { script_pool().next() };

    let params = arguments.join(", ");
    let mut out = String::new();

    out.push_str(&format!("(function {}(thread) {{\n", factory_name));
    out.push_str("const __target = thread.target;\n");
    out.push_str("let target = __target;\n");
    out.push_str("const runtime = __target.runtime;\n");
    out.push_str("const stage = runtime.getTargetForStage();\n");

    for (expression, name) in state.setup_bindings.iter() {
        out.push_str(&format!("const {} = {};\n", name, expression));
    }

    if state.script_yields {
        out.push_str(&format!("return function* {}({}) {{\n", script_name, params));
    } else {
        out.push_str(&format!("return function {}({}) {{\n", script_name, params));
    }

    out.push_str("target = __target;\n");
    out.push_str("if (thread.spoofing) {\ntarget = thread.spoofTarget;\n}\n");

    out.push_str(&state.output);

    if !is_procedure {
        out.push_str("retire();\n");
    }

    out.push_str("};\n");
    out.push_str("})");

    out
}
