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

//! Test the event hub and the bounded poll queues.

use crate::hub::{EventHub, EventListener, PollQueue, QueueEntry};
use crate::model::event::{Event, MessageLevel};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn message(text: &str) -> Event {
    Event::Message { level: MessageLevel::Info, text: text.to_string() }
}

struct Tagger {
    tag: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl EventListener for Tagger {
    fn handle_event(&self, _event: &Event) {
        self.log.lock().unwrap().push(self.tag);
    }
}

#[test]
fn test_delivery_in_registration_order() {
    let hub = EventHub::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    hub.subscribe_all(Box::new(Tagger { tag: "first", log: log.clone() }));
    hub.subscribe_all(Box::new(Tagger { tag: "second", log: log.clone() }));

    hub.process_event(&message("hello"));
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn test_filtered_delivery() {
    let hub = EventHub::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    hub.subscribe(
        Box::new(|e: &Event| e.is_message()),
        Box::new(Tagger { tag: "messages", log: log.clone() }),
    );
    hub.subscribe(Box::new(|_| false), Box::new(Tagger { tag: "nothing", log: log.clone() }));

    hub.process_event(&message("hello"));
    hub.process_event(&Event::SchedulerChanged(crate::model::types::VehicleId(0)));
    assert_eq!(*log.lock().unwrap(), vec!["messages"]);
}

#[test]
fn test_unsubscribe() {
    let hub = EventHub::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let id = hub.subscribe_all(Box::new(Tagger { tag: "gone", log: log.clone() }));
    hub.unsubscribe(id);
    hub.process_event(&message("hello"));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_poll_queue_buffers_and_drains() {
    let hub = EventHub::new();
    let queue = PollQueue::new(8);
    hub.subscribe_all(Box::new(queue.clone()));

    hub.process_event(&message("one"));
    hub.process_event(&message("two"));

    let polled = queue.poll(Duration::from_millis(10));
    assert_eq!(
        polled,
        vec![QueueEntry::Delivered(message("one")), QueueEntry::Delivered(message("two"))]
    );
    // drained: the next poll times out empty
    assert!(queue.poll(Duration::from_millis(10)).is_empty());
}

#[test]
fn test_poll_queue_overflow_marks_lost_events() {
    let hub = EventHub::new();
    let queue = PollQueue::new(3);
    hub.subscribe_all(Box::new(queue.clone()));

    for i in 0..5 {
        hub.process_event(&message(&format!("m{}", i)));
    }

    let polled = queue.poll(Duration::from_millis(10));
    // the oldest entries were dropped, a single marker takes their place
    assert_eq!(polled[0], QueueEntry::EventsLost);
    assert_eq!(polled.last(), Some(&QueueEntry::Delivered(message("m4"))));
    assert!(polled.len() <= 3);
}

#[test]
fn test_poll_timeout_returns_quickly() {
    let queue = PollQueue::new(4);
    let start = Instant::now();
    let polled = queue.poll(Duration::from_millis(30));
    assert!(polled.is_empty());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(25), "poll returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "poll blocked far too long: {:?}", elapsed);
}
