//! Frame Stack
//!
//! Tracks nested control structures during descent; answers "is the
//! current block the terminal block of the innermost enclosing loop?"
//! (spec §3, §4.3). Structurally this plays the same role the teacher's
//! `codegen_depth` counter and block-label stack play in
//! `codegen/control_flow.rs` — structural context threaded through
//! recursive descent — generalized here into an explicit LIFO so the
//! last-in-loop analysis in spec §4.3 can walk it.

/// `(is-loop, is-last-block)` — pushed on entering a statement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub is_loop: bool,
    pub is_last_block: bool,
}

/// LIFO of `Frame`s maintained for the duration of a single compile.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        FrameStack { frames: Vec::new() }
    }

    pub fn push(&mut self, is_loop: bool) {
        self.frames.push(Frame {
            is_loop,
            is_last_block: false,
        });
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Mark (or unmark) whether the top frame's current statement is the
    /// final one in its enclosing statement list.
    pub fn set_last_block(&mut self, is_last: bool) {
        if let Some(top) = self.frames.last_mut() {
            top.is_last_block = is_last;
        }
    }

    /// `is-last-block-in-loop?` from spec §4.3: scanning the frame stack
    /// upward (from the innermost frame out), the current position is
    /// last-in-loop iff every frame up to and including the first loop
    /// frame is itself marked last-block. As soon as a frame is found
    /// whose `is_last_block` is false, the last-ness chain is broken and
    /// the answer is false; as soon as a last-block frame that is also a
    /// loop frame is found, the answer is true; a non-loop last-block
    /// frame just continues the scan outward.
    pub fn is_last_block_in_loop(&self) -> bool {
        for frame in self.frames.iter().rev() {
            if !frame.is_last_block {
                return false;
            }
            if frame.is_loop {
                return true;
            }
        }
        false
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_is_not_in_loop() {
        let frames = FrameStack::new();
        assert!(!frames.is_last_block_in_loop());
    }

    #[test]
    fn last_statement_of_loop_body_is_in_loop_last() {
        let mut frames = FrameStack::new();
        frames.push(true); // loop frame
        frames.set_last_block(true);
        assert!(frames.is_last_block_in_loop());
    }

    #[test]
    fn non_last_statement_is_not_in_loop_last() {
        let mut frames = FrameStack::new();
        frames.push(true);
        frames.set_last_block(false);
        assert!(!frames.is_last_block_in_loop());
    }

    #[test]
    fn last_statement_of_non_loop_nested_in_loop_is_in_loop_last() {
        // if-statement's last block, where the if itself is the last
        // statement of an enclosing loop body.
        let mut frames = FrameStack::new();
        frames.push(true); // loop
        frames.set_last_block(true);
        frames.push(false); // if-branch frame, not itself a loop
        frames.set_last_block(true);
        assert!(frames.is_last_block_in_loop());
    }

    #[test]
    fn last_statement_of_non_loop_nested_in_non_last_branch_is_not_in_loop_last() {
        let mut frames = FrameStack::new();
        frames.push(true);
        frames.set_last_block(false); // the loop body's if-statement isn't last
        frames.push(false);
        frames.set_last_block(true);
        assert!(!frames.is_last_block_in_loop());
    }
}
