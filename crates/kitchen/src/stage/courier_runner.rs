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

use tracing::info;

use super::{Consume, Inbox, Stage, StageCore, StageError, StageKind, StageSettings, delayed::DelayedPublisher};
use crate::{
	message::{Message, now_millis},
	queue::QueueSender,
};

/// Moves dispatched couriers to the kitchen
pub struct CourierRunner {
	core: StageCore,
	travel: Travel,
}

struct Travel {
	publisher: DelayedPublisher,
}

impl CourierRunner {
	pub fn new(settings: StageSettings) -> Self {
		let name = StageKind::CourierRunner.name();
		Self {
			travel: Travel {
				publisher: DelayedPublisher::new(name, &settings),
			},
			core: StageCore::new(StageKind::CourierRunner, name, settings),
		}
	}
}

impl Consume for Travel {
	fn handle(&mut self, message: Message) -> Result<bool, StageError> {
		let Message::Courier(courier) = message else {
			return Err(StageError::Unexpected {
				stage: StageKind::CourierRunner.name().to_string(),
				seq: message.seq(),
			});
		};

		let period = courier.arrive_period;
		self.publisher.schedule(period, Message::Courier(courier), |message| {
			if let Message::Courier(courier) = message
				&& courier.mark_arrived(now_millis())
			{
				info!(
					target: "stage::courier_runner",
					courier = %courier.name,
					order_id = courier.assigned_order_id.as_deref().unwrap_or("-"),
					arrive_time = courier.arrive_time.unwrap_or_default(),
					"Courier arrived"
				);
			}
		})?;
		Ok(true)
	}

	fn finish(&mut self) {
		self.publisher.drain();
	}
}

impl Stage for CourierRunner {
	fn kind(&self) -> StageKind {
		self.core.kind()
	}

	fn name(&self) -> &str {
		self.core.name()
	}

	fn in_queue(&self) -> Option<Inbox> {
		Some(self.core.inbox())
	}

	fn set_out_queue(&mut self, out: QueueSender) {
		self.travel.publisher.set_out(out);
	}

	fn is_alive(&self) -> bool {
		self.core.is_alive()
	}

	fn run(&mut self) -> usize {
		let Self { core, travel } = self;
		core.run_consumer(travel)
	}
}
