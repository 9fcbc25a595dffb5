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

//! Matching strategies
//!
//! A strategy pairs ready orders with arrived couriers. Strategies are pure
//! state machines: no I/O, no threads, one owner. The matcher stage feeds
//! every admitted order or courier through `Strategy::apply`.

mod fifo;
mod matched;

pub use fifo::{ArrivalQueue, FifoStrategy};
pub use matched::MatchStrategy;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::message::{Courier, Message, Order, Timestamp, now_millis};

/// Closed set of matching policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
	/// Each courier picks up the order it was dispatched for
	Match,
	/// The earliest arrived courier picks up the oldest ready order
	Fifo,
}

impl StrategyKind {
	pub fn name(&self) -> &'static str {
		match self {
			StrategyKind::Match => "MATCH",
			StrategyKind::Fifo => "FIFO",
		}
	}

	pub fn build(&self) -> Box<dyn Strategy> {
		match self {
			StrategyKind::Match => Box::new(MatchStrategy::new()),
			StrategyKind::Fifo => Box::new(FifoStrategy::new()),
		}
	}
}

impl fmt::Display for StrategyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Matching policy
pub trait Strategy: Send {
	fn kind(&self) -> StrategyKind;

	/// Feed one ready order or arrived courier
	///
	/// Returns the picked-up order when the message completed a pair.
	/// Anything else is ignored.
	fn apply(&mut self, message: Message) -> Option<Order>;

	fn stats(&self) -> &MatchStats;

	/// Orders and couriers still waiting for a partner
	fn waiting(&self) -> (usize, usize);
}

/// Pickup statistics of one strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
	pub strategy: StrategyKind,
	pub matched: u64,
	/// Sum of (pickup - ready) in milliseconds
	pub food_wait_total: i64,
	/// Sum of (pickup - arrive) in milliseconds
	pub courier_wait_total: i64,
}

impl MatchStats {
	pub fn new(strategy: StrategyKind) -> Self {
		Self {
			strategy,
			matched: 0,
			food_wait_total: 0,
			courier_wait_total: 0,
		}
	}

	pub fn record(&mut self, food_wait: i64, courier_wait: i64) {
		self.matched += 1;
		self.food_wait_total += food_wait;
		self.courier_wait_total += courier_wait;
	}

	pub fn average_food_wait(&self) -> i64 {
		if self.matched == 0 {
			0
		} else {
			self.food_wait_total / self.matched as i64
		}
	}

	pub fn average_courier_wait(&self) -> i64 {
		if self.matched == 0 {
			0
		} else {
			self.courier_wait_total / self.matched as i64
		}
	}
}

impl fmt::Display for MatchStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Statistics for {} :", self.strategy)?;
		writeln!(f, "Total orders: {}", self.matched)?;
		writeln!(f, "Total food wait time (ms): {}", self.food_wait_total)?;
		writeln!(f, "Total courier wait time (ms): {}", self.courier_wait_total)?;
		writeln!(f, "Average food wait time (ms): {}", self.average_food_wait())?;
		write!(f, "Average courier wait time (ms): {}", self.average_courier_wait())
	}
}

fn signed_wait(pickup: Timestamp, since: Option<Timestamp>) -> i64 {
	pickup as i64 - since.unwrap_or(pickup) as i64
}

/// Stamp the pickup on both sides and record the waits
fn pick_up(stats: &mut MatchStats, mut order: Order, mut courier: Courier) -> Order {
	let now = now_millis();
	order.pickup_time = Some(now);
	courier.pickup_time = Some(now);

	let food_wait = signed_wait(now, order.ready_time);
	let courier_wait = signed_wait(now, courier.arrive_time);
	stats.record(food_wait, courier_wait);

	info!(
		target: "strategy",
		strategy = %stats.strategy,
		order_id = %order.id,
		courier = %courier.name,
		food_wait = food_wait,
		courier_wait = courier_wait,
		"Order picked up"
	);
	order
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_averages_are_zero_without_matches() {
		let stats = MatchStats::new(StrategyKind::Fifo);
		assert_eq!(stats.average_food_wait(), 0);
		assert_eq!(stats.average_courier_wait(), 0);
	}

	#[test]
	fn test_record_accumulates() {
		let mut stats = MatchStats::new(StrategyKind::Match);
		stats.record(10, 4);
		stats.record(20, -2);
		assert_eq!(stats.matched, 2);
		assert_eq!(stats.food_wait_total, 30);
		assert_eq!(stats.courier_wait_total, 2);
		assert_eq!(stats.average_food_wait(), 15);
		assert_eq!(stats.average_courier_wait(), 1);
	}

	#[test]
	fn test_report_format() {
		let mut stats = MatchStats::new(StrategyKind::Match);
		stats.record(8, 2);
		let report = stats.to_string();
		assert!(report.starts_with("Statistics for MATCH :\n"));
		assert!(report.contains("Total orders: 1\n"));
		assert!(report.ends_with("Average courier wait time (ms): 2"));
	}

	#[test]
	fn test_pick_up_stamps_both_sides() {
		use crate::message::FoodOffering;

		let mut stats = MatchStats::new(StrategyKind::Fifo);
		let mut order = Order::new(FoodOffering::Tea);
		order.mark_ready(now_millis());
		let mut courier = Courier::new(3);
		courier.mark_arrived(now_millis());

		let picked = pick_up(&mut stats, order, courier);
		let pickup = picked.pickup_time.unwrap();
		assert!(pickup >= picked.ready_time.unwrap());
		assert_eq!(stats.matched, 1);
		assert!(stats.food_wait_total >= 0);
	}

	#[test]
	fn test_build_returns_requested_kind() {
		for kind in [StrategyKind::Match, StrategyKind::Fifo] {
			let strategy = kind.build();
			assert_eq!(strategy.kind(), kind);
			assert_eq!(strategy.waiting(), (0, 0));
		}
	}
}
