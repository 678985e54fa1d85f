// Gantry: A Transportation Control Kernel for Automated Guided Vehicles
// Copyright (C) 2026  The Gantry Developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Event hub
//!
//! A synchronous in-process broadcaster for [`Event`]s. Listeners register
//! together with a filter predicate; `process_event` iterates the listener
//! list in registration order and delivers the event, on the calling
//! thread, to every listener whose filter accepts it. Listeners must not
//! block and must not call back into the kernel.
//!
//! Remote subscribers that cannot receive callbacks use a [`PollQueue`]: a
//! bounded per-subscriber buffer with a timed pull API. On overflow the
//! oldest entries are discarded and a lost-events marker is enqueued in
//! their place.

use crate::model::event::Event;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Receiver side of the hub: gets every event its filter accepts.
pub trait EventListener: Send {
    /// Deliver one event. Called synchronously on the emitting thread; the
    /// implementation must return quickly.
    fn handle_event(&self, event: &Event);
}

/// Predicate deciding which events a listener receives.
pub type EventFilter = Box<dyn Fn(&Event) -> bool + Send>;

/// Token identifying a registration, used to unsubscribe.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    filter: EventFilter,
    listener: Box<dyn EventListener>,
}

/// # Event hub
///
/// The single in-process broadcaster. Events emitted by one mutation arrive
/// at each subscriber in the order they were produced, because delivery is
/// synchronous and the listener list is iterated in registration order.
#[derive(Default)]
pub struct EventHub {
    registrations: Mutex<Vec<Registration>>,
    next_id: Mutex<u64>,
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.registrations.lock().map(|r| r.len()).unwrap_or(0);
        f.debug_struct("EventHub").field("listeners", &count).finish()
    }
}

impl EventHub {
    /// Create a hub with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener with a filter. Returns a token for
    /// [`EventHub::unsubscribe`].
    pub fn subscribe(&self, filter: EventFilter, listener: Box<dyn EventListener>) -> SubscriptionId {
        let mut next = self.next_id.lock().unwrap();
        let id = SubscriptionId(*next);
        *next += 1;
        drop(next);
        self.registrations.lock().unwrap().push(Registration { id, filter, listener });
        id
    }

    /// Register a listener that receives every event.
    pub fn subscribe_all(&self, listener: Box<dyn EventListener>) -> SubscriptionId {
        self.subscribe(Box::new(|_| true), listener)
    }

    /// Remove a registration. Unknown tokens are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.registrations.lock().unwrap().retain(|r| r.id != id);
    }

    /// Deliver an event to every listener whose filter accepts it, in
    /// registration order, on the calling thread.
    pub fn process_event(&self, event: &Event) {
        let registrations = self.registrations.lock().unwrap();
        for registration in registrations.iter() {
            if (registration.filter)(event) {
                registration.listener.handle_event(event);
            }
        }
    }
}

/// One entry handed out by [`PollQueue::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    /// A buffered event.
    Delivered(Event),
    /// Marker replacing events that were discarded on overflow.
    EventsLost,
}

struct PollQueueState {
    entries: VecDeque<QueueEntry>,
}

/// # Bounded poll queue
///
/// Buffer between the hub and a remote subscriber that pulls events instead
/// of receiving callbacks. The buffer holds at most `capacity` entries;
/// when it overflows, the oldest entries are dropped and a single
/// [`QueueEntry::EventsLost`] marker takes their place at the head of the
/// queue.
pub struct PollQueue {
    state: Mutex<PollQueueState>,
    capacity: usize,
    available: Condvar,
}

impl std::fmt::Debug for PollQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollQueue").field("capacity", &self.capacity).finish()
    }
}

impl PollQueue {
    /// Create a queue buffering at most `capacity` entries. A capacity of
    /// zero is raised to one so the lost-events marker always fits.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PollQueueState { entries: VecDeque::new() }),
            capacity: capacity.max(1),
            available: Condvar::new(),
        })
    }

    /// Remove and return all buffered entries, waiting up to `timeout` for
    /// at least one to arrive. Returns an empty vector on timeout.
    pub fn poll(&self, timeout: Duration) -> Vec<QueueEntry> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        while state.entries.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Vec::new();
            }
            let (next, result) = self.available.wait_timeout(state, deadline - now).unwrap();
            state = next;
            if result.timed_out() && state.entries.is_empty() {
                return Vec::new();
            }
        }
        state.entries.drain(..).collect()
    }

    fn push(&self, entry: QueueEntry) {
        let mut state = self.state.lock().unwrap();
        state.entries.push_back(entry);
        if state.entries.len() > self.capacity {
            while state.entries.len() >= self.capacity {
                state.entries.pop_front();
            }
            if state.entries.front() != Some(&QueueEntry::EventsLost) {
                state.entries.push_front(QueueEntry::EventsLost);
            }
        }
        drop(state);
        self.available.notify_one();
    }
}

impl EventListener for Arc<PollQueue> {
    fn handle_event(&self, event: &Event) {
        self.push(QueueEntry::Delivered(event.clone()));
    }
}
