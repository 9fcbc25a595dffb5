// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::thread;
use std::time::{Duration, Instant};

use galley_kitchen::{
	Command, Courier, Dispatcher, DispatcherConfig, FoodOffering, Inbox, Liveness, Message,
	MessageQueue, Order, QueueReceiver, QueueSender, RetryPolicy, Stage, StageKind,
};

/// Stage stand-in that only exposes an inbox
struct Probe {
	kind: StageKind,
	sender: QueueSender,
	receiver: Option<QueueReceiver>,
	liveness: Liveness,
	out: Option<QueueSender>,
	subscribes: bool,
}

impl Probe {
	fn new(kind: StageKind, capacity: usize) -> Self {
		let (sender, receiver) = MessageQueue::new(capacity).split();
		Self {
			kind,
			sender,
			receiver: Some(receiver),
			liveness: Liveness::new(true),
			out: None,
			subscribes: true,
		}
	}

	fn producer() -> Self {
		Self {
			subscribes: false,
			..Self::new(StageKind::Generator, 1)
		}
	}

	fn take_receiver(&mut self) -> QueueReceiver {
		self.receiver.take().unwrap()
	}
}

impl Stage for Probe {
	fn kind(&self) -> StageKind {
		self.kind
	}

	fn name(&self) -> &str {
		self.kind.name()
	}

	fn in_queue(&self) -> Option<Inbox> {
		self.subscribes.then(|| Inbox {
			kind: self.kind,
			name: self.kind.name().to_string(),
			sender: self.sender.clone(),
			liveness: self.liveness.clone(),
		})
	}

	fn set_out_queue(&mut self, out: QueueSender) {
		self.out = Some(out);
	}

	fn is_alive(&self) -> bool {
		self.liveness.is_alive()
	}

	fn run(&mut self) -> usize {
		0
	}
}

fn fast_config(attempts: u32, backoff_ms: u64) -> DispatcherConfig {
	DispatcherConfig {
		queue_capacity: 64,
		poll_timeout: Duration::from_millis(5),
		retry: RetryPolicy::new(attempts, Duration::from_millis(backoff_ms)),
		max_retry_threads: 4,
	}
}

fn unready_order() -> Message {
	Message::Order(Order::new(FoodOffering::Sandwich))
}

fn ready_order() -> Message {
	let mut order = Order::new(FoodOffering::Sandwich);
	order.mark_ready(1);
	Message::Order(order)
}

fn arrived_courier() -> Message {
	let mut courier = Courier::new(3);
	courier.mark_arrived(1);
	Message::Courier(courier)
}

#[test]
fn test_register_wires_every_stage() {
	let mut dispatcher = Dispatcher::new(fast_config(3, 1));
	let mut producer = Probe::producer();
	let mut cooker = Probe::new(StageKind::Cooker, 4);

	dispatcher.register(&mut producer);
	dispatcher.register(&mut cooker);

	assert_eq!(dispatcher.subscriber_count(), 1);
	assert!(producer.out.is_some());
	assert!(cooker.out.is_some());
}

#[test]
fn test_fan_out_follows_filters() {
	let mut dispatcher = Dispatcher::new(fast_config(3, 1));
	let mut cooker = Probe::new(StageKind::Cooker, 16);
	let mut matcher = Probe::new(StageKind::Matcher, 16);
	dispatcher.register(&mut cooker);
	dispatcher.register(&mut matcher);

	let publisher = dispatcher.publisher();
	let stop = dispatcher.stop_signal();
	let handle = thread::spawn(move || dispatcher.run());

	for message in [
		unready_order(),
		ready_order(),
		arrived_courier(),
		Message::Command(Command::exit(1)),
	] {
		publisher.try_enqueue(message).unwrap();
	}
	thread::sleep(Duration::from_millis(50));
	stop.stop();
	let report = handle.join().unwrap();

	let cooked = cooker.take_receiver().drain();
	let matched = matcher.take_receiver().drain();
	assert_eq!(report.routed, 4);
	assert_eq!(report.delivered, 5);
	assert_eq!(cooked.len(), 2);
	assert!(cooked[1].is_command());
	assert_eq!(matched.len(), 3);
	assert!(matched[0].as_order().unwrap().is_ready());
	assert!(matched[1].as_courier().unwrap().is_arrived());
}

#[test]
fn test_full_inbox_is_retried_until_delivered() {
	let mut dispatcher = Dispatcher::new(fast_config(6, 10));
	let mut cooker = Probe::new(StageKind::Cooker, 1);
	dispatcher.register(&mut cooker);
	let inbox = cooker.take_receiver();

	let publisher = dispatcher.publisher();
	let stop = dispatcher.stop_signal();
	let handle = thread::spawn(move || dispatcher.run());

	let first = unready_order();
	let second = unready_order();
	let expected = vec![first.seq(), second.seq()];
	publisher.try_enqueue(first).unwrap();
	publisher.try_enqueue(second).unwrap();

	// Slow consumer: frees the slot only after the first retry has failed
	thread::sleep(Duration::from_millis(15));
	let mut received = Vec::new();
	let deadline = Instant::now() + Duration::from_secs(2);
	while received.len() < 2 && Instant::now() < deadline {
		match inbox.recv_timeout(Duration::from_millis(10)) {
			Ok(message) => received.push(message.seq()),
			Err(_) => continue,
		}
	}
	stop.stop();
	let report = handle.join().unwrap();

	assert_eq!(received, expected);
	assert_eq!(report.retried, 1);
	assert_eq!(report.redelivered, 1);
	assert_eq!(report.dropped, 0);
}

#[test]
fn test_delivery_dropped_after_retries_exhausted() {
	let mut dispatcher = Dispatcher::new(fast_config(3, 2));
	let mut cooker = Probe::new(StageKind::Cooker, 1);
	dispatcher.register(&mut cooker);
	let inbox = cooker.take_receiver();

	let publisher = dispatcher.publisher();
	let stop = dispatcher.stop_signal();
	let handle = thread::spawn(move || dispatcher.run());

	let kept = unready_order();
	let kept_seq = kept.seq();
	publisher.try_enqueue(kept).unwrap();
	publisher.try_enqueue(unready_order()).unwrap();

	thread::sleep(Duration::from_millis(100));
	stop.stop();
	let report = handle.join().unwrap();

	let left = inbox.drain();
	assert_eq!(left.len(), 1);
	assert_eq!(left[0].seq(), kept_seq);
	assert_eq!(report.retried, 1);
	assert_eq!(report.dropped, 1);
	assert_eq!(report.redelivered, 0);
}

#[test]
fn test_retry_abandoned_when_subscriber_stops() {
	let mut dispatcher = Dispatcher::new(fast_config(50, 5));
	let mut cooker = Probe::new(StageKind::Cooker, 1);
	dispatcher.register(&mut cooker);
	let inbox = cooker.take_receiver();
	let liveness = cooker.liveness.clone();

	let publisher = dispatcher.publisher();
	let stop = dispatcher.stop_signal();
	let handle = thread::spawn(move || dispatcher.run());

	publisher.try_enqueue(unready_order()).unwrap();
	publisher.try_enqueue(unready_order()).unwrap();

	thread::sleep(Duration::from_millis(20));
	liveness.set(false);
	thread::sleep(Duration::from_millis(80));
	stop.stop();
	let report = handle.join().unwrap();

	assert_eq!(inbox.len(), 1);
	assert_eq!(report.dropped, 1);
}

#[test]
fn test_inactive_subscriber_gets_nothing() {
	let mut dispatcher = Dispatcher::new(fast_config(3, 1));
	let mut cooker = Probe::new(StageKind::Cooker, 4);
	cooker.liveness.set(false);
	dispatcher.register(&mut cooker);

	let publisher = dispatcher.publisher();
	let stop = dispatcher.stop_signal();
	let handle = thread::spawn(move || dispatcher.run());

	publisher.try_enqueue(unready_order()).unwrap();
	thread::sleep(Duration::from_millis(30));
	stop.stop();
	let report = handle.join().unwrap();

	assert_eq!(report.routed, 1);
	assert_eq!(report.delivered, 0);
	assert!(cooker.take_receiver().is_empty());
}

#[test]
fn test_stops_promptly() {
	let dispatcher = Dispatcher::new(fast_config(3, 1));
	let stop = dispatcher.stop_signal();
	let handle = thread::spawn(move || dispatcher.run());

	thread::sleep(Duration::from_millis(10));
	let started = Instant::now();
	stop.stop();
	handle.join().unwrap();
	assert!(started.elapsed() < Duration::from_millis(500));
}
