//! Deferred notification scheduling.
//!
//! Lifecycle hooks never run inside a render pass. Renders enqueue tasks
//! here and the stage drains the queue afterwards, so hooks always observe
//! a settled tree. Mounted and register-events notices enqueue in render
//! order; children-rendered notices are parked while any render frame is
//! still on the stack and released when the outermost frame finishes,
//! which puts a descendant's children-rendered notice ahead of its
//! ancestors'.

use std::collections::VecDeque;

use maquette_socle::Identity;

use crate::component::StoreEvent;

/// What a deferred task delivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Mounted,
    RegisterEvents,
    ChildrenRendered,
    /// Store update whose owner was busy when the write fanned out.
    StoreUpdate(StoreEvent),
}

/// One deferred hook invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub owner: Identity,
    pub notice: Notice,
}

/// Task queue plus the render call stack it is sequenced against.
#[derive(Debug, Default)]
pub struct Schedule {
    queue: VecDeque<Task>,
    stack: Vec<Identity>,
    parked: Vec<Task>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task at the back of the queue.
    pub fn defer(&mut self, owner: Identity, notice: Notice) {
        self.queue.push_back(Task { owner, notice });
    }

    /// Enqueue a children-rendered task. While a render frame is on the
    /// stack the task is parked instead and joins the queue when the
    /// outermost frame finishes.
    pub fn defer_children_rendered(&mut self, owner: Identity) {
        let task = Task { owner, notice: Notice::ChildrenRendered };
        if self.stack.is_empty() {
            self.queue.push_back(task);
        } else {
            self.parked.push(task);
        }
    }

    /// Push a render frame for `identity`.
    pub fn begin_render(&mut self, identity: Identity) {
        self.stack.push(identity);
    }

    /// Pop the current render frame. Leaving the outermost frame releases
    /// every parked task into the queue, in park order.
    pub fn finish_render(&mut self) {
        self.stack.pop();
        if self.stack.is_empty() && !self.parked.is_empty() {
            self.queue.extend(self.parked.drain(..));
        }
    }

    /// Whether `identity` has a render frame on the stack right now.
    pub fn rendering(&self, identity: &Identity) -> bool {
        self.stack.iter().any(|frame| frame == identity)
    }

    /// Current render nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Take the next runnable task.
    pub fn next_task(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Tasks waiting in the queue, parked ones excluded.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Tasks parked behind the render stack.
    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.parked.is_empty() && self.stack.is_empty()
    }
}
