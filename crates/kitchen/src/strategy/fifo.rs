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
	cmp::{Ordering, Reverse},
	collections::{BinaryHeap, VecDeque},
};

use tracing::debug;

use super::{MatchStats, Strategy, StrategyKind, pick_up};
use crate::message::{Courier, Message, Order};

/// Heap entry ordered by (unstamped last, arrive time, insertion rank)
struct Arrival {
	unstamped: bool,
	arrive_time: u64,
	rank: u64,
	courier: Courier,
}

impl Arrival {
	fn key(&self) -> (bool, u64, u64) {
		(self.unstamped, self.arrive_time, self.rank)
	}
}

impl PartialEq for Arrival {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl Eq for Arrival {}

impl PartialOrd for Arrival {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Arrival {
	fn cmp(&self, other: &Self) -> Ordering {
		self.key().cmp(&other.key())
	}
}

/// Waiting couriers, earliest arrival first
///
/// Couriers without a positive arrive time never jump ahead of stamped
/// ones and keep their insertion order among themselves. Equal arrive
/// times also fall back to insertion order.
#[derive(Default)]
pub struct ArrivalQueue {
	heap: BinaryHeap<Reverse<Arrival>>,
	next_rank: u64,
}

impl ArrivalQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, courier: Courier) {
		let arrive_time = courier.arrive_time.unwrap_or(0);
		let rank = self.next_rank;
		self.next_rank += 1;
		self.heap.push(Reverse(Arrival {
			unstamped: arrive_time == 0,
			arrive_time,
			rank,
			courier,
		}));
	}

	pub fn pop(&mut self) -> Option<Courier> {
		self.heap.pop().map(|Reverse(arrival)| arrival.courier)
	}

	pub fn peek(&self) -> Option<&Courier> {
		self.heap.peek().map(|Reverse(arrival)| &arrival.courier)
	}

	pub fn len(&self) -> usize {
		self.heap.len()
	}

	pub fn is_empty(&self) -> bool {
		self.heap.is_empty()
	}
}

/// Any arrived courier takes the oldest ready order
pub struct FifoStrategy {
	orders: VecDeque<Order>,
	couriers: ArrivalQueue,
	stats: MatchStats,
}

impl FifoStrategy {
	pub fn new() -> Self {
		Self {
			orders: VecDeque::new(),
			couriers: ArrivalQueue::new(),
			stats: MatchStats::new(StrategyKind::Fifo),
		}
	}
}

impl Default for FifoStrategy {
	fn default() -> Self {
		Self::new()
	}
}

impl Strategy for FifoStrategy {
	fn kind(&self) -> StrategyKind {
		StrategyKind::Fifo
	}

	fn apply(&mut self, message: Message) -> Option<Order> {
		match message {
			Message::Order(order) if order.is_ready() => match self.couriers.pop() {
				Some(courier) => Some(pick_up(&mut self.stats, order, courier)),
				None => {
					self.orders.push_back(order);
					None
				}
			},
			Message::Courier(courier) if courier.is_arrived() => match self.orders.pop_front() {
				Some(order) => Some(pick_up(&mut self.stats, order, courier)),
				None => {
					self.couriers.push(courier);
					None
				}
			},
			other => {
				debug!(target: "strategy", strategy = "FIFO", seq = other.seq(), "Ignoring message");
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
