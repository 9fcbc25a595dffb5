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

use tracing::{debug, info};

use super::{Consume, Inbox, Stage, StageCore, StageError, StageKind, StageSettings, delayed::DelayedPublisher};
use crate::{
	message::{Message, now_millis},
	queue::QueueSender,
};

/// Prepares orders
///
/// Every unready order sleeps for its food's prep time on the cooker's
/// pool, gets its ready time stamped and goes back to the main queue.
pub struct FoodCooker {
	core: StageCore,
	kitchen: Cooking,
}

struct Cooking {
	publisher: DelayedPublisher,
}

impl FoodCooker {
	pub fn new(settings: StageSettings) -> Self {
		let name = StageKind::Cooker.name();
		Self {
			kitchen: Cooking {
				publisher: DelayedPublisher::new(name, &settings),
			},
			core: StageCore::new(StageKind::Cooker, name, settings),
		}
	}
}

impl Consume for Cooking {
	fn handle(&mut self, message: Message) -> Result<bool, StageError> {
		let Message::Order(order) = message else {
			return Err(StageError::Unexpected {
				stage: StageKind::Cooker.name().to_string(),
				seq: message.seq(),
			});
		};

		let prep_time = order.prep_time;
		debug!(
			target: "stage::cooker",
			order_id = %order.id,
			food = order.food.name(),
			prep_time = prep_time,
			"Cooking order"
		);

		self.publisher.schedule(prep_time, Message::Order(order), |message| {
			if let Message::Order(order) = message
				&& order.mark_ready(now_millis())
			{
				info!(
					target: "stage::cooker",
					order_id = %order.id,
					ready_time = order.ready_time.unwrap_or_default(),
					"Order prepared"
				);
			}
		})?;
		Ok(true)
	}

	fn finish(&mut self) {
		self.publisher.drain();
	}
}

impl Stage for FoodCooker {
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
		self.kitchen.publisher.set_out(out);
	}

	fn is_alive(&self) -> bool {
		self.core.is_alive()
	}

	fn run(&mut self) -> usize {
		let Self { core, kitchen } = self;
		core.run_consumer(kitchen)
	}
}
