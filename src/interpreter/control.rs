//! Control-flow state: the FOR stack, the GOSUB stack, and the DATA
//! cursor (spec §4.E).

use crate::value::Name;

/// A program counter is a `(line, part)` pair: the statement part at
/// index `part` within line `line` (spec §4.E, §9).
pub type Pc = (u32, usize);

/// One active `FOR` loop: the resume point is the statement immediately
/// after the `FOR` (the same convention `Gosub` uses for its return
/// address), so `NEXT` re-enters the loop body rather than re-running
/// the `FOR` clause itself and resetting the loop variable.
#[derive(Clone, Debug, PartialEq)]
pub struct ForFrame {
    pub var: Name,
    pub limit: f64,
    pub step: f64,
    pub resume: Pc,
}

impl ForFrame {
    /// `true` once the loop variable has crossed `limit` in the
    /// direction `step` moves (spec §4.D: `step>0 ∧ v>limit` or
    /// `step<0 ∧ v<limit`).
    pub fn finished(&self, current: f64) -> bool {
        if self.step > 0.0 {
            current > self.limit
        } else {
            current < self.limit
        }
    }
}

/// Bounded stacks for `GOSUB`/`FOR`, guarding against runaway
/// recursion with *Stack Overflow* rather than an unbounded `Vec`.
const MAX_DEPTH: usize = 255;

#[derive(Default)]
pub struct ControlState {
    pub for_stack: Vec<ForFrame>,
    pub gosub_stack: Vec<Pc>,
    /// Index into the flattened `DATA` item list `READ` draws from next.
    pub data_cursor: usize,
}

impl ControlState {
    pub fn new() -> Self {
        ControlState::default()
    }

    pub fn push_for(&mut self, frame: ForFrame) -> Result<(), crate::error::ErrorKind> {
        if self.for_stack.len() >= MAX_DEPTH {
            return Err(crate::error::ErrorKind::StackOverflow);
        }
        self.for_stack.push(frame);
        Ok(())
    }

    pub fn push_gosub(&mut self, pc: Pc) -> Result<(), crate::error::ErrorKind> {
        if self.gosub_stack.len() >= MAX_DEPTH {
            return Err(crate::error::ErrorKind::StackOverflow);
        }
        self.gosub_stack.push(pc);
        Ok(())
    }

    /// Finds the innermost active `FOR` frame matching `name` (or the
    /// single innermost frame if `name` is `None`, as a bare `NEXT`
    /// matches whatever loop is innermost). A named `NEXT` must match the
    /// *top* frame exactly; it does not search further down the stack
    /// (pinned against `applesoft.py`'s `cmd_next`, which raises "Next
    /// without for" on any mismatch rather than closing intervening
    /// loops).
    pub fn find_for(&self, name: Option<&Name>) -> Option<usize> {
        if self.for_stack.is_empty() {
            return None;
        }
        let top = self.for_stack.len() - 1;
        match name {
            None => Some(top),
            Some(n) if &self.for_stack[top].var == n => Some(top),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(var: &str) -> ForFrame {
        ForFrame {
            var: Name::new(var),
            limit: 10.0,
            step: 1.0,
            resume: (10, 1),
        }
    }

    #[test]
    fn bare_next_matches_innermost_frame() {
        let mut cs = ControlState::new();
        cs.push_for(frame("I")).unwrap();
        cs.push_for(frame("J")).unwrap();
        assert_eq!(cs.find_for(None), Some(1));
    }

    #[test]
    fn named_next_matching_top_frame_succeeds() {
        let mut cs = ControlState::new();
        cs.push_for(frame("I")).unwrap();
        cs.push_for(frame("J")).unwrap();
        assert_eq!(cs.find_for(Some(&Name::new("J"))), Some(1));
    }

    #[test]
    fn named_next_not_matching_top_frame_is_next_without_for() {
        // Mirrors applesoft.py's cmd_next: a mismatched NEXT var errors
        // rather than closing intervening loops up to the named one.
        let mut cs = ControlState::new();
        cs.push_for(frame("I")).unwrap();
        cs.push_for(frame("J")).unwrap();
        assert_eq!(cs.find_for(Some(&Name::new("I"))), None);
    }

    #[test]
    fn stack_overflow_past_max_depth() {
        let mut cs = ControlState::new();
        for _ in 0..MAX_DEPTH {
            cs.push_for(frame("I")).unwrap();
        }
        assert_eq!(
            cs.push_for(frame("I")).unwrap_err(),
            crate::error::ErrorKind::StackOverflow
        );
    }
}
