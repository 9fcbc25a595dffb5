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

use tracing::debug;

use super::{MatchStats, Strategy, StrategyKind, pick_up};
use crate::message::{Courier, Message, Order};

/// Pairs every courier with the order it was dispatched for
///
/// Both waiting lists keep arrival order. Lookups are linear; the lists
/// only hold the orders and couriers whose partner has not shown up yet.
pub struct MatchStrategy {
	orders: Vec<Order>,
	couriers: Vec<Courier>,
	stats: MatchStats,
}

impl MatchStrategy {
	pub fn new() -> Self {
		Self {
			orders: Vec::new(),
			couriers: Vec::new(),
			stats: MatchStats::new(StrategyKind::Match),
		}
	}

	fn on_order(&mut self, order: Order) -> Option<Order> {
		let position = self
			.couriers
			.iter()
			.position(|courier| courier.assigned_order_id.as_deref() == Some(order.id.as_str()));

		match position {
			Some(index) => {
				let courier = self.couriers.remove(index);
				Some(pick_up(&mut self.stats, order, courier))
			}
			None => {
				self.orders.push(order);
				None
			}
		}
	}

	fn on_courier(&mut self, courier: Courier) -> Option<Order> {
		let position = courier
			.assigned_order_id
			.as_deref()
			.and_then(|id| self.orders.iter().position(|order| order.id == id));

		match position {
			Some(index) => {
				let order = self.orders.remove(index);
				Some(pick_up(&mut self.stats, order, courier))
			}
			None => {
				self.couriers.push(courier);
				None
			}
		}
	}
}

impl Default for MatchStrategy {
	fn default() -> Self {
		Self::new()
	}
}

impl Strategy for MatchStrategy {
	fn kind(&self) -> StrategyKind {
		StrategyKind::Match
	}

	fn apply(&mut self, message: Message) -> Option<Order> {
		match message {
			Message::Order(order) if order.is_ready() => self.on_order(order),
			Message::Courier(courier) if courier.is_arrived() => self.on_courier(courier),
			other => {
				debug!(target: "strategy", strategy = "MATCH", seq = other.seq(), "Ignoring message");
				None
			}
		}
	}

	fn stats(&self) -> &MatchStats {
		&self.stats
	}

	fn waiting(&self) -> (usize, usize) {
		(self.orders.len(), self.couriers.len())
	}
}
