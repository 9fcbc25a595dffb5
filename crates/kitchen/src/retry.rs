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

use tracing::{debug, error, warn};

use crate::{
	config::MSG_RETRY,
	message::Message,
	queue::{QueueError, QueueSender},
};

/// Bounded retry with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total enqueue attempts before the message is dropped
	pub attempts: u32,
	/// Backoff unit; attempt `i` (0-based) waits `(i + 1) * backoff` after failing
	pub backoff: Duration,
}

impl RetryPolicy {
	pub fn new(attempts: u32, backoff: Duration) -> Self {
		Self { attempts, backoff }
	}

	pub fn delay_for(&self, attempt: u32) -> Duration {
		self.backoff * (attempt + 1)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			attempts: MSG_RETRY,
			backoff: Duration::from_secs(1),
		}
	}
}

/// Outcome of a retried delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	/// Enqueued on the given attempt (1-based)
	Delivered { attempts: u32 },
	/// Receiver went away; the message was dropped
	Abandoned,
	/// Every attempt failed; the message was dropped
	Exhausted,
}

impl Delivery {
	pub fn is_delivered(&self) -> bool {
		matches!(self, Delivery::Delivered { .. })
	}
}

/// Enqueue `message` into `target`, retrying with backoff
///
/// `is_alive` is consulted before every attempt; once it reports false the
/// delivery is abandoned instead of spinning against a dead consumer. A
/// disconnected queue is treated the same way.
pub fn deliver_with_retry(
	target: &QueueSender,
	message: Message,
	policy: &RetryPolicy,
	is_alive: impl Fn() -> bool,
) -> Delivery {
	let seq = message.seq();
	let mut message = message;

	for attempt in 0..policy.attempts {
		if !is_alive() {
			warn!(target: "retry", seq = seq, attempt = attempt, "Receiver is inactive, dropping message");
			return Delivery::Abandoned;
		}

		match target.try_enqueue(message) {
			Ok(()) => {
				if attempt > 0 {
					debug!(target: "retry", seq = seq, attempts = attempt + 1, "Message re-sent");
				}
				return Delivery::Delivered {
					attempts: attempt + 1,
				};
			}
			Err(rejected) if rejected.reason == QueueError::Disconnected => {
				warn!(target: "retry", seq = seq, "Receiver disconnected, dropping message");
				return Delivery::Abandoned;
			}
			Err(rejected) => {
				warn!(
					target: "retry",
					seq = seq,
					attempt = attempt,
					reason = %rejected.reason,
					"Failed to enqueue message"
				);
				message = rejected.message;
				if attempt + 1 < policy.attempts {
					thread::sleep(policy.delay_for(attempt));
				}
			}
		}
	}

	error!(target: "retry", seq = seq, attempts = policy.attempts, "Dropping message after exhausting retries");
	Delivery::Exhausted
}
