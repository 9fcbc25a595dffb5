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

use tracing::{info, warn};

use super::{Consume, Inbox, Stage, StageCore, StageError, StageKind, StageSettings};
use crate::{
	config::{COURIER_END, COURIER_START},
	message::{Courier, Message},
	queue::QueueSender,
	random::{DelaySource, UniformDelay},
	retry::{Delivery, RetryPolicy, deliver_with_retry},
};

/// Sends one courier per incoming order
///
/// The courier is assigned to the order and published synchronously; its
/// travel time is drawn uniformly from `[COURIER_START, COURIER_END]`.
pub struct CourierDispatcher {
	core: StageCore,
	dispatch: Dispatch,
}

struct Dispatch {
	out: Option<QueueSender>,
	delays: Box<dyn DelaySource>,
	retry: RetryPolicy,
}

impl CourierDispatcher {
	pub fn new(settings: StageSettings) -> Self {
		Self::with_delay_source(settings, Box::new(UniformDelay::new()))
	}

	pub fn with_delay_source(settings: StageSettings, delays: Box<dyn DelaySource>) -> Self {
		Self {
			dispatch: Dispatch {
				out: None,
				delays,
				retry: settings.retry,
			},
			core: StageCore::new(StageKind::CourierDispatch, StageKind::CourierDispatch.name(), settings),
		}
	}
}

impl Consume for Dispatch {
	fn handle(&mut self, message: Message) -> Result<bool, StageError> {
		let Message::Order(order) = message else {
			return Err(StageError::Unexpected {
				stage: StageKind::CourierDispatch.name().to_string(),
				seq: message.seq(),
			});
		};
		let out = self
			.out
			.as_ref()
			.ok_or_else(|| StageError::NotWired(StageKind::CourierDispatch.name().to_string()))?;

		let mut courier = Courier::new(self.delays.uniform(COURIER_START, COURIER_END));
		courier.assign(order.id.as_str());
		info!(
			target: "stage::courier_dispatch",
			courier = %courier.name,
			order_id = %order.id,
			arrive_in = courier.arrive_period,
			"Courier dispatched"
		);

		let name = courier.name.clone();
		match deliver_with_retry(out, Message::Courier(courier), &self.retry, || true) {
			Delivery::Delivered { .. } => {}
			outcome => warn!(
				target: "stage::courier_dispatch",
				courier = %name,
				order_id = %order.id,
				outcome = ?outcome,
				"Courier was not published"
			),
		}
		Ok(true)
	}
}

impl Stage for CourierDispatcher {
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
		self.dispatch.out = Some(out);
	}

	fn is_alive(&self) -> bool {
		self.core.is_alive()
	}

	fn run(&mut self) -> usize {
		let Self { core, dispatch } = self;
		core.run_consumer(dispatch)
	}
}
