//! Message Processing Sequence
//!
//! The per-message stack machine that tracks where in the nested chain graph
//! processing currently is. Each frame references a shared chain and holds a
//! cursor into it; the bottom frame is the entry chain, the top frame the most
//! deeply nested active chain.
//!
//! ```text
//!   level 2  [ X  Y ]        cursor 0   <- top, current receiver X
//!   level 1  [ B  C  D ]     cursor 1   <- resumes at D when level 2 is done
//!   level 0  [ A ]           cursor 0   <- entry chain
//! ```
//!
//! A sequence is owned by exactly one processing task at a time and performs
//! no synchronization of its own. It never logs: every failure is returned to
//! the caller with the level and step it concerns.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    domain::{
        chain::{AfterAction, Chain, Step},
        error::RuntimeError,
        fault::Fault,
        record::{FaultCoordinates, MessageContext}
    },
    port::receiver::Receiver
};

/// One activation of a chain
struct Frame {
    chain:  Arc<Chain>,
    /// -1 until the first advance into this chain, `len` once exhausted
    cursor: isize,
    /// Set on frames pushed by `catch_fault`
    after:  Option<AfterAction>
}

impl Frame {
    fn new(chain: Arc<Chain>, after: Option<AfterAction>) -> Self {
        Self { chain, cursor: -1, after }
    }

    fn current(&self) -> Option<&Step> {
        usize::try_from(self.cursor).ok().and_then(|index| self.chain.step(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// Frames remain and `end` was not called
    Active,
    /// Every frame was popped by `advance`
    Exhausted,
    /// `end` was called, directly or by a failing completion callback
    Terminated
}

pub struct MessageProcessingSequence {
    frames:           Vec<Frame>,
    max_depth:        usize,
    terminated:       bool,
    completion_fault: Option<Fault>
}

impl MessageProcessingSequence {
    /// Create a sequence positioned on the first step of `entry`.
    pub fn new(max_depth: usize, entry: Arc<Chain>) -> Result<Self, RuntimeError> {
        if max_depth < 1 {
            return Err(RuntimeError::InvalidConfiguration("stack depth must be at least 1".to_string()));
        }
        if entry.is_empty() {
            return Err(RuntimeError::InvalidConfiguration(format!("entry chain '{}' has no steps", entry.name())));
        }

        let mut frames = Vec::with_capacity(max_depth);
        frames.push(Frame { chain: entry, cursor: 0, after: None });

        Ok(Self { frames, max_depth, terminated: false, completion_fault: None })
    }

    pub fn state(&self) -> SequenceState {
        if self.terminated {
            SequenceState::Terminated
        } else if self.frames.is_empty() {
            SequenceState::Exhausted
        } else {
            SequenceState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SequenceState::Active
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of frames on the stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Fault raised by a completion callback that terminated this sequence
    pub fn completion_fault(&self) -> Option<&Fault> {
        self.completion_fault.as_ref()
    }

    /// Step at the top frame's cursor.
    ///
    /// `None` once the sequence is finished, and right after
    /// `invoke_nested_chain` until the next `advance`.
    pub fn current_step(&self) -> Option<&Step> {
        if self.terminated {
            return None;
        }
        self.frames.last().and_then(Frame::current)
    }

    pub fn current_receiver(&self) -> Option<&Arc<dyn Receiver>> {
        self.current_step().map(|step| &step.receiver)
    }

    pub fn current_arguments(&self) -> Option<&Value> {
        self.current_step().map(|step| step.arguments.as_ref())
    }

    /// Move to the next step, popping every exhausted frame on the way.
    ///
    /// Returns `false` once the stack is empty or the sequence is terminated,
    /// and keeps returning `false` afterwards.
    pub fn advance(&mut self) -> bool {
        if self.terminated {
            return false;
        }

        loop {
            let Some(top) = self.frames.last_mut() else {
                return false;
            };

            top.cursor += 1;
            if (top.cursor as usize) < top.chain.len() {
                return true;
            }

            let finished = self.frames.pop();
            if let Some(after) = finished.and_then(|frame| frame.after) {
                if let Err(fault) = after.run(self) {
                    self.completion_fault = Some(fault);
                    self.terminated = true;
                }
                if self.terminated {
                    return false;
                }
            }
        }
    }

    /// Push `chain` as a new top frame without advancing into it.
    pub fn invoke_nested_chain(&mut self, chain: Arc<Chain>) -> Result<(), RuntimeError> {
        self.ensure_active()?;
        if self.frames.len() >= self.max_depth {
            return Err(RuntimeError::NestedStackOverflow { max_depth: self.max_depth });
        }

        self.frames.push(Frame::new(chain, None));
        Ok(())
    }

    /// Route `fault` to the nearest enclosing chain that declares a fallback for it.
    ///
    /// Frames above the catching frame are discarded, the cause and catch
    /// coordinates are written into `context`, and the fallback chain is
    /// pushed (not yet advanced). On failure the stack is left untouched.
    pub fn catch_fault(&mut self, fault: &Fault, context: &mut MessageContext) -> Result<(), RuntimeError> {
        self.ensure_active()?;

        let cause_level = self.frames.len() - 1;
        let cause_step = self.frames[cause_level].cursor;

        let found = self
            .frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(level, frame)| frame.chain.exceptional_entry(fault).map(|entry| (level, entry.clone())));

        let Some((catch_level, entry)) = found else {
            return Err(RuntimeError::NoExceptionHandler { fault: fault.clone(), level: cause_level, step: cause_step });
        };

        if catch_level + 2 > self.max_depth {
            return Err(RuntimeError::NestedStackOverflow { max_depth: self.max_depth });
        }

        self.frames.truncate(catch_level + 1);
        let catch_step = self.frames[catch_level].cursor;

        FaultCoordinates { cause_level, cause_step, catch_level, catch_step }.write(context);

        self.frames.push(Frame::new(entry.chain, Some(entry.after)));
        Ok(())
    }

    /// Reposition so that the next `advance` makes `step` of `level` current.
    ///
    /// Frames above `level` are discarded. `step` may equal the chain length,
    /// in which case the next `advance` leaves that level.
    pub fn go_to(&mut self, level: usize, step: usize) -> Result<(), RuntimeError> {
        self.ensure_active()?;

        let invalid = RuntimeError::InvalidPosition { level, step: step as isize };
        let Some(frame) = self.frames.get(level) else {
            return Err(invalid);
        };
        if step > frame.chain.len() {
            return Err(invalid);
        }

        self.frames.truncate(level + 1);
        self.frames[level].cursor = step as isize - 1;
        Ok(())
    }

    /// Stop processing; every later `advance` returns `false`.
    pub fn end(&mut self) {
        self.terminated = true;
    }

    /// Index of the top frame, `None` once the stack is empty
    pub fn current_level(&self) -> Option<usize> {
        self.frames.len().checked_sub(1)
    }

    pub fn step_at_level(&self, level: usize) -> Result<isize, RuntimeError> {
        self.frames
            .get(level)
            .map(|frame| frame.cursor)
            .ok_or(RuntimeError::InvalidPosition { level, step: -1 })
    }

    /// Chain running at `level`
    pub fn chain_at_level(&self, level: usize) -> Option<&Arc<Chain>> {
        self.frames.get(level).map(|frame| &frame.chain)
    }

    fn ensure_active(&self) -> Result<(), RuntimeError> {
        match self.state() {
            SequenceState::Active => Ok(()),
            _ => Err(RuntimeError::SequenceFinished)
        }
    }
}

impl std::fmt::Debug for MessageProcessingSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageProcessingSequence")
            .field(
                "frames",
                &self.frames.iter().map(|frame| (frame.chain.name(), frame.cursor)).collect::<Vec<_>>()
            )
            .field("max_depth", &self.max_depth)
            .field("terminated", &self.terminated)
            .finish()
    }
}
