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

use std::{thread, time::Duration};

use tracing::{info, warn};

use super::{StageError, StageSettings};
use crate::{
	message::Message,
	pool::{PoolError, TaskSet, WorkerPool},
	queue::QueueSender,
	retry::{Delivery, RetryPolicy, deliver_with_retry},
};

/// Sleep-then-publish work of the delay stages
///
/// Each scheduled message waits on a private worker pool, gets stamped,
/// and is published back to the main queue with bounded retry.
pub(crate) struct DelayedPublisher {
	name: String,
	out: Option<QueueSender>,
	pool: WorkerPool,
	tasks: TaskSet<Delivery>,
	retry: RetryPolicy,
	tick: Duration,
}

impl DelayedPublisher {
	pub(crate) fn new(name: &str, settings: &StageSettings) -> Self {
		Self {
			name: name.to_string(),
			out: None,
			pool: WorkerPool::new(format!("{}-pool", name), settings.max_pool_threads),
			tasks: TaskSet::new(),
			retry: settings.retry,
			tick: settings.tick,
		}
	}

	pub(crate) fn set_out(&mut self, out: QueueSender) {
		self.out = Some(out);
	}

	/// Publish `message` after `ticks` simulated seconds
	///
	/// `stamp` runs right before publishing.
	pub(crate) fn schedule<F>(&mut self, ticks: u32, mut message: Message, stamp: F) -> Result<(), StageError>
	where
		F: FnOnce(&mut Message) + Send + 'static,
	{
		let out = self
			.out
			.clone()
			.ok_or_else(|| StageError::NotWired(self.name.clone()))?;
		let delay = self.tick * ticks;
		let retry = self.retry;

		let handle = self.pool.submit(move || {
			thread::sleep(delay);
			stamp(&mut message);
			deliver_with_retry(&out, message, &retry, || true)
		});
		self.tasks.push(handle);
		self.collect();
		Ok(())
	}

	/// Log the outcome of finished tasks
	fn collect(&mut self) {
		for result in self.tasks.reap() {
			self.report(result);
		}
	}

	fn report(&self, result: Result<Delivery, PoolError>) {
		match result {
			Ok(delivery) if delivery.is_delivered() => {}
			Ok(delivery) => {
				warn!(target: "stage", stage = %self.name, outcome = ?delivery, "Delayed message was not published")
			}
			Err(e) => warn!(target: "stage", stage = %self.name, error = %e, "Delayed task failed"),
		}
	}

	/// Wait for every scheduled task and stop the pool
	pub(crate) fn drain(&mut self) {
		let outstanding = self.tasks.len();
		if outstanding > 0 {
			info!(target: "stage", stage = %self.name, outstanding = outstanding, "Waiting for outstanding tasks");
		}
		for result in self.tasks.join_all() {
			self.report(result);
		}
		self.pool.shutdown();
	}
}
