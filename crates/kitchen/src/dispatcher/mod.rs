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

//! Central message hub
//!
//! The dispatcher owns the main queue. Every stage publishes into it and
//! every consuming stage subscribes with its own inbox. The loop pops one
//! message at a time and fans it out, in registration order, to each
//! subscriber that is alive and admits it. A full inbox does not stall the
//! loop: the delivery moves to a retry task on the dispatcher's pool.

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
	config::KitchenConfig,
	message::Message,
	pool::{TaskHandle, TaskSet, WorkerPool},
	queue::{MessageQueue, QueueError, QueueReceiver, QueueSender},
	retry::{Delivery, RetryPolicy, deliver_with_retry},
	stage::{Inbox, Stage},
};

/// Global stop flag observed by the dispatcher loop
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
	pub fn stop(&self) {
		self.0.store(true, Ordering::Release);
	}

	pub fn is_stopped(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
	/// Capacity of the main queue
	pub queue_capacity: usize,
	pub poll_timeout: Duration,
	pub retry: RetryPolicy,
	/// Upper bound on concurrent retry tasks
	pub max_retry_threads: usize,
}

impl DispatcherConfig {
	pub fn from_config(config: &KitchenConfig) -> Self {
		Self {
			queue_capacity: config.max_queue,
			poll_timeout: config.poll_timeout(),
			retry: RetryPolicy::new(config.msg_retry, config.tick()),
			max_retry_threads: config.max_pool_threads.min(config.max_queue),
		}
	}
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self::from_config(&KitchenConfig::default())
	}
}

/// Counters collected by one dispatcher run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
	/// Messages popped from the main queue
	pub routed: u64,
	/// Deliveries that landed on the first try
	pub delivered: u64,
	/// Deliveries handed to a retry task
	pub retried: u64,
	/// Retry tasks that eventually delivered
	pub redelivered: u64,
	/// Deliveries given up on
	pub dropped: u64,
}

impl DispatchReport {
	fn record(&mut self, delivery: Delivery) {
		match delivery {
			Delivery::Delivered { .. } => self.redelivered += 1,
			Delivery::Abandoned | Delivery::Exhausted => self.dropped += 1,
		}
	}
}

/// Fan-out hub between stages
pub struct Dispatcher {
	config: DispatcherConfig,
	sender: QueueSender,
	receiver: QueueReceiver,
	subscribers: Vec<Inbox>,
	stop: StopSignal,
}

impl Dispatcher {
	pub fn new(config: DispatcherConfig) -> Self {
		let (sender, receiver) = MessageQueue::new(config.queue_capacity).split();
		Self {
			config,
			sender,
			receiver,
			subscribers: Vec::new(),
			stop: StopSignal::default(),
		}
	}

	/// Subscribe the stage's inbox, if it has one, and wire its output to
	/// the main queue
	pub fn register(&mut self, stage: &mut dyn Stage) {
		if let Some(inbox) = stage.in_queue() {
			debug!(target: "dispatcher", stage = %inbox.name, "Subscriber registered");
			self.subscribers.push(inbox);
		}
		stage.set_out_queue(self.sender.clone());
	}

	pub fn stop_signal(&self) -> StopSignal {
		self.stop.clone()
	}

	/// Sender end of the main queue
	pub fn publisher(&self) -> QueueSender {
		self.sender.clone()
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers.len()
	}

	pub fn subscribers(&self) -> &[Inbox] {
		&self.subscribers
	}

	/// Route until the stop signal is raised, then wait for retries
	pub fn run(self) -> DispatchReport {
		let Self {
			config,
			sender,
			receiver,
			subscribers,
			stop,
		} = self;
		// Only stages hold the main queue's sender from here on
		drop(sender);

		info!(
			target: "dispatcher",
			subscribers = subscribers.len(),
			capacity = config.queue_capacity,
			"Dispatcher started"
		);

		let mut pool = WorkerPool::new("dispatch-retry", config.max_retry_threads);
		let mut retries: TaskSet<Delivery> = TaskSet::new();
		let mut report = DispatchReport::default();

		while !stop.is_stopped() {
			let message = match receiver.recv_timeout(config.poll_timeout) {
				Ok(message) => message,
				Err(QueueError::Timeout) => {
					collect(&mut retries, &mut report);
					continue;
				}
				Err(e) => {
					// Every publisher is gone; wait for the stop signal
					debug!(target: "dispatcher", error = %e, "Main queue idle");
					std::thread::sleep(config.poll_timeout);
					continue;
				}
			};
			report.routed += 1;

			for inbox in &subscribers {
				if !inbox.is_alive() || !inbox.admits(&message) {
					continue;
				}

				match inbox.sender.try_enqueue(message.clone()) {
					Ok(()) => report.delivered += 1,
					Err(rejected) if rejected.reason == QueueError::Disconnected => {
						warn!(target: "dispatcher", stage = %inbox.name, seq = message.seq(), "Subscriber disconnected, dropping");
						report.dropped += 1;
					}
					Err(rejected) => {
						debug!(
							target: "dispatcher",
							stage = %inbox.name,
							seq = message.seq(),
							reason = %rejected.reason,
							"Subscriber busy, retrying in background"
						);
						report.retried += 1;
						retries.push(spawn_retry(&mut pool, inbox, rejected.message, config.retry));
					}
				}
			}

			collect(&mut retries, &mut report);
		}

		info!(target: "dispatcher", outstanding = retries.len(), "Stop signal received, joining retry tasks");
		for result in retries.join_all() {
			match result {
				Ok(delivery) => report.record(delivery),
				Err(e) => {
					error!(target: "dispatcher", error = %e, "Retry task lost");
					report.dropped += 1;
				}
			}
		}
		pool.shutdown();

		info!(
			target: "dispatcher",
			routed = report.routed,
			delivered = report.delivered,
			retried = report.retried,
			redelivered = report.redelivered,
			dropped = report.dropped,
			"Dispatcher stopped"
		);
		report
	}
}

fn spawn_retry(
	pool: &mut WorkerPool,
	inbox: &Inbox,
	message: Message,
	retry: RetryPolicy,
) -> TaskHandle<Delivery> {
	let target = inbox.sender.clone();
	let liveness = inbox.liveness.clone();
	pool.submit(move || deliver_with_retry(&target, message, &retry, || liveness.is_alive()))
}

fn collect(retries: &mut TaskSet<Delivery>, report: &mut DispatchReport) {
	for result in retries.reap() {
		match result {
			Ok(delivery) => report.record(delivery),
			Err(e) => {
				error!(target: "dispatcher", error = %e, "Retry task lost");
				report.dropped += 1;
			}
		}
	}
}
