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

use std::{
	thread,
	time::{Duration, Instant},
};

use tracing::{error, info, warn};

use super::{Inbox, Liveness, Stage, StageKind, StageSettings};
use crate::{
	config::KitchenConfig,
	message::{Command, FoodOffering, Message, Order},
	queue::{QueueError, QueueSender},
	random::{DelaySource, UniformDelay},
};

/// Produces orders at a fixed rate, then announces the total
///
/// Publishes `orders_per_second` orders per tick until `total_orders` have
/// gone out, then one exit command carrying the total. A full main queue
/// is retried with a growing backoff; orders are never dropped.
pub struct OrderGenerator {
	total_orders: usize,
	orders_per_second: usize,
	random_food: bool,
	tick: Duration,
	/// Backoff ceiling in ticks
	max_backoff: u32,
	foods: Box<dyn DelaySource>,
	out: Option<QueueSender>,
	liveness: Liveness,
}

impl OrderGenerator {
	pub fn new(config: &KitchenConfig, settings: &StageSettings) -> Self {
		Self::with_delay_source(config, settings, Box::new(UniformDelay::new()))
	}

	pub fn with_delay_source(
		config: &KitchenConfig,
		settings: &StageSettings,
		foods: Box<dyn DelaySource>,
	) -> Self {
		Self {
			total_orders: config.total_orders,
			orders_per_second: config.orders_per_second.max(1),
			random_food: config.random_food,
			tick: settings.tick,
			max_backoff: settings.grace_ticks.max(1),
			foods,
			out: None,
			liveness: Liveness::default(),
		}
	}

	fn next_order(&mut self) -> Order {
		let food = if self.random_food {
			FoodOffering::random(self.foods.as_mut())
		} else {
			FoodOffering::CheesePizza
		};
		Order::new(food)
	}

	/// Enqueue, backing off while the queue is full
	///
	/// Returns false once the main queue is gone.
	fn publish(&self, out: &QueueSender, message: Message, errors: &mut u32) -> bool {
		let mut message = message;
		loop {
			match out.try_enqueue(message) {
				Ok(()) => {
					*errors = errors.saturating_sub(1);
					return true;
				}
				Err(rejected) if rejected.reason == QueueError::Disconnected => {
					error!(target: "stage::generator", seq = rejected.message.seq(), "Main queue disconnected");
					return false;
				}
				Err(rejected) => {
					*errors = (*errors + 1).min(self.max_backoff);
					warn!(
						target: "stage::generator",
						seq = rejected.message.seq(),
						errors = *errors,
						"Main queue full, backing off"
					);
					message = rejected.message;
					thread::sleep(self.tick * *errors);
				}
			}
		}
	}

	fn generate(&mut self, out: &QueueSender) -> usize {
		let mut published = 0usize;
		let mut errors = 0u32;

		while published < self.total_orders {
			let started = Instant::now();
			let batch = self.orders_per_second.min(self.total_orders - published);

			for _ in 0..batch {
				let order = self.next_order();
				let (id, created, prep_time) = (order.id.clone(), order.create_time, order.prep_time);
				if !self.publish(out, Message::Order(order), &mut errors) {
					return published;
				}
				published += 1;
				info!(
					target: "stage::generator",
					order_id = %id,
					created = created,
					prep_time = prep_time,
					"Order received"
				);
			}

			// Every batch owns a full tick, the last one included
			if let Some(rest) = self.tick.checked_sub(started.elapsed()) {
				thread::sleep(rest);
			}
		}

		if self.publish(out, Message::Command(Command::exit(published)), &mut errors) {
			info!(target: "stage::generator", total = published, "Exit command sent");
		}
		published
	}
}

impl Stage for OrderGenerator {
	fn kind(&self) -> StageKind {
		StageKind::Generator
	}

	fn name(&self) -> &str {
		StageKind::Generator.name()
	}

	fn in_queue(&self) -> Option<Inbox> {
		None
	}

	fn set_out_queue(&mut self, out: QueueSender) {
		self.out = Some(out);
	}

	fn is_alive(&self) -> bool {
		self.liveness.is_alive()
	}

	fn run(&mut self) -> usize {
		let Some(out) = self.out.clone() else {
			error!(target: "stage::generator", "Generator has no outbound queue");
			return 0;
		};

		info!(
			target: "stage::generator",
			total = self.total_orders,
			per_second = self.orders_per_second,
			"Generator started"
		);
		self.liveness.set(true);
		let published = self.generate(&out);
		self.liveness.set(false);
		published
	}
}
