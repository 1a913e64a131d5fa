//! Kinds Catalog
//!
//! Every expression and statement kind string documented in spec §6, as
//! typed constants. Nothing in `codegen` reads these at lowering time —
//! dispatch still matches on string literals, the same way the teacher's
//! central `codegen.rs` dispatch match does for its own opcodes — but the
//! catalog gives the kind vocabulary one place to live instead of only
//! existing implicitly as scattered match-arm patterns, and the tests
//! below cross-check it against both the data-driven primitive tables in
//! [`crate::runtime_helpers`] and the literal dispatch source itself.

/// Every `kind` string `codegen::expressions::lower_expression` dispatches
/// on, directly or through `SIMPLE_EXPRESSION_PRIMITIVES`.
pub const EXPRESSION_KINDS: &[&str] = &[
    "args.boolean",
    "args.stringNumber",
    "compat",
    "constant",
    "control.inlineStackOutput",
    "keyboard.pressed",
    "list.contains",
    "list.contents",
    "list.get",
    "list.indexOf",
    "list.length",
    "looks.backdropName",
    "looks.backdropNumber",
    "looks.costumeName",
    "looks.costumeNumber",
    "looks.size",
    "math.polygon",
    "motion.direction",
    "motion.x",
    "motion.y",
    "mouse.down",
    "mouse.x",
    "mouse.y",
    "noop",
    "op.10^",
    "op.abs",
    "op.acos",
    "op.add",
    "op.advlog",
    "op.and",
    "op.asin",
    "op.atan",
    "op.ceiling",
    "op.contains",
    "op.cos",
    "op.divide",
    "op.e^",
    "op.equals",
    "op.floor",
    "op.greater",
    "op.join",
    "op.length",
    "op.less",
    "op.letterOf",
    "op.ln",
    "op.log",
    "op.mod",
    "op.multiply",
    "op.not",
    "op.or",
    "op.random",
    "op.round",
    "op.sin",
    "op.sqrt",
    "op.subtract",
    "op.tan",
    "pmEventsExpansion.broadcastFunction",
    "procedures.call",
    "sensing.answer",
    "sensing.colorTouchingColor",
    "sensing.date",
    "sensing.dayofweek",
    "sensing.daysSince2000",
    "sensing.distance",
    "sensing.hour",
    "sensing.minute",
    "sensing.month",
    "sensing.of",
    "sensing.second",
    "sensing.touching",
    "sensing.touchingColor",
    "sensing.username",
    "sensing.year",
    "timer.get",
    "tw.lastKeyPressed",
    "var.get",
];

/// Every `kind` string `codegen::statements::lower_statement` dispatches
/// on, directly or through `SIMPLE_STATEMENT_PRIMITIVES`.
pub const STATEMENT_KINDS: &[&str] = &[
    "addons.call",
    "compat",
    "control.allAtOnce",
    "control.case",
    "control.createClone",
    "control.deleteClone",
    "control.exitCase",
    "control.for",
    "control.forever",
    "control.if",
    "control.newScript",
    "control.repeat",
    "control.runAsSprite",
    "control.stopAll",
    "control.stopOthers",
    "control.stopScript",
    "control.switch",
    "control.wait",
    "control.waitOrUntil",
    "control.waitUntil",
    "control.while",
    "event.broadcast",
    "event.broadcastAndWait",
    "list.add",
    "list.delete",
    "list.deleteAll",
    "list.forEach",
    "list.hide",
    "list.insert",
    "list.replace",
    "list.show",
    "looks.changeEffect",
    "looks.changeSize",
    "looks.clearEffects",
    "looks.goForwardBackwardLayers",
    "looks.goToFront",
    "looks.hide",
    "looks.nextBackdrop",
    "looks.nextCostume",
    "looks.say",
    "looks.sayForSecs",
    "looks.setEffect",
    "looks.setSize",
    "looks.show",
    "looks.switchBackdropTo",
    "looks.switchCostumeTo",
    "looks.think",
    "looks.thinkForSecs",
    "motion.changeX",
    "motion.changeY",
    "motion.ifOnEdgeBounce",
    "motion.setDirection",
    "motion.setRotationStyle",
    "motion.setX",
    "motion.setXY",
    "motion.setY",
    "motion.step",
    "pen.changeHue",
    "pen.changeSize",
    "pen.clear",
    "pen.penDown",
    "pen.penUp",
    "pen.setColor",
    "pen.setHue",
    "pen.setSize",
    "pen.stamp",
    "procedures.call",
    "procedures.return",
    "sensing.set.of",
    "timer.reset",
    "tw.debugger",
    "var.hide",
    "var.set",
    "var.show",
    "visualReport",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_helpers::{SIMPLE_EXPRESSION_PRIMITIVES, SIMPLE_STATEMENT_PRIMITIVES};
    use std::collections::HashSet;

    fn no_duplicates(kinds: &[&str]) -> bool {
        let set: HashSet<&str> = kinds.iter().copied().collect();
        set.len() == kinds.len()
    }

    #[test]
    fn expression_kinds_has_no_duplicates() {
        assert!(no_duplicates(EXPRESSION_KINDS));
    }

    #[test]
    fn statement_kinds_has_no_duplicates() {
        assert!(no_duplicates(STATEMENT_KINDS));
    }

    #[test]
    fn catalog_is_superset_of_simple_expression_table() {
        for key in SIMPLE_EXPRESSION_PRIMITIVES.keys() {
            assert!(EXPRESSION_KINDS.contains(key), "{key} missing from EXPRESSION_KINDS");
        }
    }

    #[test]
    fn catalog_is_superset_of_simple_statement_table() {
        for key in SIMPLE_STATEMENT_PRIMITIVES.keys() {
            assert!(STATEMENT_KINDS.contains(key), "{key} missing from STATEMENT_KINDS");
        }
    }

    /// Every catalog entry must actually appear as a quoted pattern in the
    /// dispatch source, so the catalog can't silently drift from what is
    /// really matched.
    #[test]
    fn expression_kinds_all_appear_in_dispatch_source() {
        let source = include_str!("codegen/expressions.rs");
        for kind in EXPRESSION_KINDS {
            let needle = format!("\"{kind}\"");
            assert!(source.contains(&needle), "{kind} not found as a literal in expressions.rs");
        }
    }

    #[test]
    fn statement_kinds_all_appear_in_dispatch_source() {
        let source = include_str!("codegen/statements.rs");
        for kind in STATEMENT_KINDS {
            let needle = format!("\"{kind}\"");
            assert!(source.contains(&needle), "{kind} not found as a literal in statements.rs");
        }
    }
}
