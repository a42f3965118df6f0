//! Callback queue: register a callback with a deadline, have it fire
//! exactly once, either on success (`exec`) or when the deadline passes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::trace;

use crate::error::CqueError;

/// Why a queued callback fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqueOutcome {
    Success,
    Timeout,
}

type Callback = Box<dyn FnMut(CqueOutcome, &[u8])>;

struct QueuedCallback {
    callback: Callback,
    deadline: Instant,
    data: Vec<u8>,
}

/// Registry of pending callbacks keyed by a monotonic id
#[derive(Default)]
pub struct CallbackQueue {
    pending: HashMap<u32, QueuedCallback>,
    next_id: u32,
}

impl CallbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; returns the id to pass to `exec` later
    pub fn add<F>(&mut self, callback: F, timeout: Duration, data: Vec<u8>) -> u32
    where
        F: FnMut(CqueOutcome, &[u8]) + 'static,
    {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.insert(
            id,
            QueuedCallback {
                callback: Box::new(callback),
                deadline: Instant::now() + timeout,
                data,
            },
        );
        id
    }

    /// Fire the callback for `id` with the success outcome and remove it
    pub fn exec(&mut self, id: u32) -> Result<(), CqueError> {
        let mut queued = self.pending.remove(&id).ok_or(CqueError::UnknownId(id))?;
        (queued.callback)(CqueOutcome::Success, &queued.data);
        Ok(())
    }

    pub fn remove(&mut self, id: u32) -> Result<(), CqueError> {
        self.pending
            .remove(&id)
            .map(|_| ())
            .ok_or(CqueError::UnknownId(id))
    }

    /// Fire every callback whose deadline has passed with the timeout
    /// outcome; driven from reactor housekeeping
    pub fn poll_timeouts(&mut self, now: Instant) -> usize {
        let expired: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, queued)| queued.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(mut queued) = self.pending.remove(id) {
                trace!("callback id {id} timed out");
                (queued.callback)(CqueOutcome::Timeout, &queued.data);
            }
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
