//! Activation records for in-progress calls.
//!
//! Records live in a generational arena and are linked to their caller by
//! index, so the stack can be walked from any record toward the outermost
//! call. A record is *pending* from the moment it is pushed until its
//! arguments have all been collected.

use std::collections::HashMap;
use std::fmt;

use generational_arena::{Arena, Index};

use super::object::Value;

pub type FrameId = Index;

bitflags! {
    pub struct FrameFlags: u8 {
        const PENDING = 0b001;
        const REIFIED = 0b010;
        /// Stand-in parent pushed while a pending record must not host
        /// anything visible.
        const EPHEMERAL = 0b100;
    }
}

#[derive(Debug)]
pub struct Frame {
    parent: Option<FrameId>,
    callable: Value,
    label: Option<String>,
    args: Vec<Option<Value>>,
    locals: HashMap<String, Value>,
    flags: FrameFlags,
}

impl Frame {
    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn callable(&self) -> &Value {
        &self.callable
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Argument slots, `None` for the ones not yet collected.
    pub fn args(&self) -> &[Option<Value>] {
        &self.args
    }

    pub fn is_pending(&self) -> bool {
        self.flags.contains(FrameFlags::PENDING)
    }

    pub fn is_reified(&self) -> bool {
        self.flags.contains(FrameFlags::REIFIED)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.flags.contains(FrameFlags::EPHEMERAL)
    }

    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn local_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.locals.get_mut(name)
    }

    pub fn declare(&mut self, name: String, value: Value) {
        self.locals.insert(name, value);
    }
}

/// An outside reference to an activation record. Only valid while the
/// record is on the stack; lookups through a stale handle find nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(FrameId);

impl FrameHandle {
    pub fn id(self) -> FrameId {
        self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "<frame {}.{}>", index, generation)
    }
}

#[derive(Debug, Default)]
pub struct CallStack {
    arena: Arena<Frame>,
    top: Option<FrameId>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a record for `callable` with `arity` empty argument slots. The
    /// record starts out pending.
    pub fn push(&mut self, callable: Value, label: Option<String>, arity: usize) -> FrameId {
        let frame = Frame {
            parent: self.top,
            callable,
            label,
            args: vec![None; arity],
            locals: HashMap::new(),
            flags: FrameFlags::PENDING,
        };
        let id = self.arena.insert(frame);
        self.top = Some(id);
        id
    }

    pub fn push_ephemeral(&mut self) -> FrameId {
        let id = self.push(Value::Null, None, 0);
        self.frame_mut(id).flags = FrameFlags::EPHEMERAL;
        id
    }

    pub fn fulfill(&mut self, id: FrameId, slot: usize, value: Value) {
        let frame = self.frame_mut(id);
        assert!(frame.is_pending(), "argument filled after collection finished");
        frame.args[slot] = Some(value);
    }

    pub fn finish_args(&mut self, id: FrameId) {
        self.frame_mut(id).flags.remove(FrameFlags::PENDING);
    }

    pub fn pop(&mut self, id: FrameId) -> Frame {
        assert_eq!(self.top, Some(id), "popped a frame that is not on top");
        let frame = self
            .arena
            .remove(id)
            .unwrap_or_else(|| panic!("frame {:?} popped twice", id));
        self.top = frame.parent;
        frame
    }

    pub fn top(&self) -> Option<FrameId> {
        self.top
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.arena.get_mut(id)
    }

    /// Like `get`, for records the caller knows are live.
    pub fn frame(&self, id: FrameId) -> &Frame {
        self.arena
            .get(id)
            .unwrap_or_else(|| panic!("frame {:?} has already returned", id))
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        self.arena
            .get_mut(id)
            .unwrap_or_else(|| panic!("frame {:?} has already returned", id))
    }

    /// Hand out a handle for a live record. Reifying the same record again
    /// gives an equal handle without touching anything else.
    pub fn reify(&mut self, id: FrameId) -> FrameHandle {
        let frame = self.frame_mut(id);
        if !frame.is_reified() {
            frame.flags.insert(FrameFlags::REIFIED);
            trace!("reified {:?} ({:?})", id, frame.label);
        }
        FrameHandle(id)
    }

    pub fn resolve(&self, handle: FrameHandle) -> Option<&Frame> {
        self.arena.get(handle.0)
    }

    pub fn depth(&self) -> usize {
        self.arena.len()
    }

    /// Iterate from `start` toward the outermost caller.
    pub fn walk(&self, start: Option<FrameId>) -> Walk<'_> {
        Walk {
            stack: self,
            next: start,
        }
    }
}

pub struct Walk<'s> {
    stack: &'s CallStack,
    next: Option<FrameId>,
}

impl<'s> Iterator for Walk<'s> {
    type Item = (FrameId, &'s Frame);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let frame = self.stack.frame(id);
        self.next = frame.parent;
        Some((id, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(stack: &CallStack) -> Vec<Option<String>> {
        stack
            .walk(stack.top())
            .map(|(_, frame)| frame.label().map(str::to_string))
            .collect()
    }

    #[test]
    fn push_links_to_caller() {
        let mut stack = CallStack::new();
        let outer = stack.push(Value::Null, Some("outer".to_string()), 0);
        stack.finish_args(outer);
        let inner = stack.push(Value::Null, Some("inner".to_string()), 2);

        assert_eq!(stack.frame(inner).parent(), Some(outer));
        assert!(stack.frame(inner).is_pending());
        assert!(!stack.frame(outer).is_pending());
        assert_eq!(
            labels(&stack),
            vec![Some("inner".to_string()), Some("outer".to_string())]
        );
    }

    #[test]
    fn args_fill_while_pending() {
        let mut stack = CallStack::new();
        let id = stack.push(Value::Null, None, 2);
        stack.fulfill(id, 0, Value::Integer(4));
        assert_eq!(stack.frame(id).args(), &[Some(Value::Integer(4)), None]);
        stack.fulfill(id, 1, Value::Boolean(true));
        stack.finish_args(id);
        assert!(!stack.frame(id).is_pending());
        assert_eq!(
            stack.frame(id).args(),
            &[Some(Value::Integer(4)), Some(Value::Boolean(true))]
        );
    }

    #[test]
    fn reify_is_idempotent() {
        let mut stack = CallStack::new();
        let id = stack.push(Value::Null, None, 0);
        assert!(!stack.frame(id).is_reified());
        let first = stack.reify(id);
        let second = stack.reify(id);
        assert_eq!(first, second);
        assert!(stack.frame(id).is_reified());
        assert!(stack.resolve(first).is_some());
    }

    #[test]
    fn handles_go_stale_after_pop() {
        let mut stack = CallStack::new();
        let id = stack.push(Value::Null, None, 0);
        let handle = stack.reify(id);
        stack.pop(id);
        assert!(stack.resolve(handle).is_none());

        // A new record may reuse the slot, but not the generation.
        let reused = stack.push(Value::Null, None, 0);
        assert_ne!(stack.reify(reused), handle);
        assert!(stack.resolve(handle).is_none());
    }

    #[test]
    #[should_panic(expected = "has already returned")]
    fn reify_after_pop_panics() {
        let mut stack = CallStack::new();
        let id = stack.push(Value::Null, None, 0);
        stack.pop(id);
        stack.reify(id);
    }

    #[test]
    #[should_panic(expected = "not on top")]
    fn pop_out_of_order_panics() {
        let mut stack = CallStack::new();
        let outer = stack.push(Value::Null, None, 0);
        stack.push(Value::Null, None, 0);
        stack.pop(outer);
    }

    #[test]
    fn ephemeral_frames_are_not_pending() {
        let mut stack = CallStack::new();
        let pending = stack.push(Value::Null, None, 1);
        let ephemeral = stack.push_ephemeral();
        assert!(stack.frame(ephemeral).is_ephemeral());
        assert!(!stack.frame(ephemeral).is_pending());
        assert_eq!(stack.pop(ephemeral).parent(), Some(pending));
        assert_eq!(stack.top(), Some(pending));
    }
}
