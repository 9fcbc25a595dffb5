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

use crossbeam::channel::{Receiver, Sender, bounded};
use tracing::{info, warn};

use super::{Consume, Inbox, Stage, StageCore, StageError, StageKind, StageSettings};
use crate::{
	message::Message,
	queue::QueueSender,
	strategy::{MatchStats, Strategy, StrategyKind},
};

/// Runs one matching strategy over ready orders and arrived couriers
///
/// Counts one handled message per pickup, so the exit total is reached
/// once every generated order has been picked up. Picked-up orders leave
/// the pipeline here; nothing is published back. The final statistics
/// are sent once over `stats_receiver()` when the stage stops.
pub struct MatcherStage {
	core: StageCore,
	matching: Matching,
	stats_rx: Receiver<MatchStats>,
}

struct Matching {
	strategy: Box<dyn Strategy>,
	stats_tx: Sender<MatchStats>,
}

impl MatcherStage {
	pub fn new(kind: StrategyKind, settings: StageSettings) -> Self {
		Self::with_strategy(kind.build(), settings)
	}

	pub fn with_strategy(strategy: Box<dyn Strategy>, settings: StageSettings) -> Self {
		let name = format!("{}-{}", StageKind::Matcher.name(), strategy.kind());
		let (stats_tx, stats_rx) = bounded(1);
		Self {
			core: StageCore::new(StageKind::Matcher, name, settings),
			matching: Matching { strategy, stats_tx },
			stats_rx,
		}
	}

	pub fn strategy(&self) -> StrategyKind {
		self.matching.strategy.kind()
	}

	/// Final statistics, available once the stage has stopped
	pub fn stats_receiver(&self) -> Receiver<MatchStats> {
		self.stats_rx.clone()
	}
}

impl Consume for Matching {
	fn handle(&mut self, message: Message) -> Result<bool, StageError> {
		if message.is_command() {
			return Err(StageError::Unexpected {
				stage: StageKind::Matcher.name().to_string(),
				seq: message.seq(),
			});
		}
		Ok(self.strategy.apply(message).is_some())
	}

	fn finish(&mut self) {
		let stats = self.strategy.stats().clone();
		let (orders, couriers) = self.strategy.waiting();
		info!(
			target: "stage::matcher",
			strategy = %stats.strategy,
			matched = stats.matched,
			food_wait_total = stats.food_wait_total,
			courier_wait_total = stats.courier_wait_total,
			food_wait_avg = stats.average_food_wait(),
			courier_wait_avg = stats.average_courier_wait(),
			waiting_orders = orders,
			waiting_couriers = couriers,
			"Matcher finished"
		);
		if self.stats_tx.try_send(stats).is_err() {
			warn!(target: "stage::matcher", "Statistics already reported");
		}
	}
}

impl Stage for MatcherStage {
	fn kind(&self) -> StageKind {
		self.core.kind()
	}

	fn name(&self) -> &str {
		self.core.name()
	}

	fn in_queue(&self) -> Option<Inbox> {
		Some(self.core.inbox())
	}

	/// Matchers publish nothing
	fn set_out_queue(&mut self, _out: QueueSender) {}

	fn is_alive(&self) -> bool {
		self.core.is_alive()
	}

	fn run(&mut self) -> usize {
		let Self { core, matching, .. } = self;
		core.run_consumer(matching)
	}
}
