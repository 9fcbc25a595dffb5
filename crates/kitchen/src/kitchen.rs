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

//! Pipeline driver
//!
//! Assembles the stages, registers them with one dispatcher and runs each
//! on its own named thread. Startup order matters: consuming stages first,
//! then the dispatcher once every inbox reports alive, then the generator.
//! The driver waits for every stage to finish before raising the stop
//! signal, so the dispatcher outlives all publishers.

use std::{
	io,
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use crossbeam::channel::Receiver;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
	config::{ConfigError, KitchenConfig},
	dispatcher::{DispatchReport, Dispatcher, DispatcherConfig},
	stage::{
		CourierDispatcher, CourierRunner, FoodCooker, Liveness, MatcherStage, OrderGenerator,
		Stage, StageSettings,
	},
	strategy::{MatchStats, StrategyKind},
};

/// How long the driver waits for consuming stages to come up
const STARTUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Interval at which the driver checks stage threads
const MONITOR_INTERVAL: Duration = Duration::from_millis(10);

/// Error types for running the pipeline
#[derive(Debug, Error)]
pub enum KitchenError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("Failed to spawn {stage} thread: {source}")]
	Spawn {
		stage: String,
		#[source]
		source: io::Error,
	},
	#[error("Dispatcher thread panicked")]
	DispatcherPanicked,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct KitchenReport {
	pub generated: usize,
	pub cooked: usize,
	pub dispatched: usize,
	pub arrived: usize,
	/// One entry per configured strategy, in configuration order
	pub matched: Vec<MatchStats>,
	pub dispatch: DispatchReport,
	pub elapsed: Duration,
}

impl KitchenReport {
	pub fn stats_for(&self, kind: StrategyKind) -> Option<&MatchStats> {
		self.matched.iter().find(|stats| stats.strategy == kind)
	}
}

/// The simulation driver
pub struct Kitchen {
	config: KitchenConfig,
}

struct StageThread {
	name: String,
	handle: JoinHandle<usize>,
}

impl StageThread {
	fn join(self) -> usize {
		match self.handle.join() {
			Ok(handled) => handled,
			Err(e) => {
				error!(target: "kitchen", stage = %self.name, error = ?e, "Stage thread panicked");
				0
			}
		}
	}
}

fn spawn_stage<S>(mut stage: S) -> Result<StageThread, KitchenError>
where
	S: Stage + 'static,
{
	let name = stage.name().to_string();
	let handle = thread::Builder::new()
		.name(name.clone())
		.spawn(move || stage.run())
		.map_err(|source| KitchenError::Spawn {
			stage: name.clone(),
			source,
		})?;
	Ok(StageThread { name, handle })
}

impl Kitchen {
	pub fn new(config: KitchenConfig) -> Result<Self, KitchenError> {
		config.validate()?;
		Ok(Self { config })
	}

	pub fn config(&self) -> &KitchenConfig {
		&self.config
	}

	/// Run the whole pipeline to completion
	pub fn run(&self) -> Result<KitchenReport, KitchenError> {
		let started = Instant::now();
		let settings = StageSettings::from_config(&self.config);
		let mut dispatcher = Dispatcher::new(DispatcherConfig::from_config(&self.config));

		let mut cooker = FoodCooker::new(settings.clone());
		let mut courier_dispatch = CourierDispatcher::new(settings.clone());
		let mut runner = CourierRunner::new(settings.clone());
		let mut matchers: Vec<MatcherStage> = self
			.config
			.strategy
			.kinds()
			.iter()
			.map(|kind| MatcherStage::new(*kind, settings.clone()))
			.collect();
		let mut generator = OrderGenerator::new(&self.config, &settings);

		dispatcher.register(&mut generator);
		dispatcher.register(&mut cooker);
		dispatcher.register(&mut courier_dispatch);
		dispatcher.register(&mut runner);
		for matcher in matchers.iter_mut() {
			dispatcher.register(matcher);
		}

		let stats: Vec<Receiver<MatchStats>> =
			matchers.iter().map(MatcherStage::stats_receiver).collect();
		let inboxes: Vec<Liveness> = dispatcher
			.subscribers()
			.iter()
			.map(|inbox| inbox.liveness.clone())
			.collect();
		let stop = dispatcher.stop_signal();

		info!(
			target: "kitchen",
			total_orders = self.config.total_orders,
			orders_per_second = self.config.orders_per_second,
			max_queue = self.config.max_queue,
			strategy = ?self.config.strategy,
			"Kitchen starting"
		);

		let cooker = spawn_stage(cooker)?;
		let courier_dispatch = spawn_stage(courier_dispatch)?;
		let runner = spawn_stage(runner)?;
		let mut matcher_threads = Vec::with_capacity(matchers.len());
		for matcher in matchers {
			matcher_threads.push(spawn_stage(matcher)?);
		}

		let deadline = Instant::now() + STARTUP_TIMEOUT;
		while !inboxes.iter().all(Liveness::is_alive) {
			if Instant::now() >= deadline {
				warn!(target: "kitchen", "Not every stage came up in time, starting anyway");
				break;
			}
			thread::sleep(Duration::from_millis(1));
		}

		let dispatcher = thread::Builder::new()
			.name("dispatcher".to_string())
			.spawn(move || dispatcher.run())
			.map_err(|source| KitchenError::Spawn {
				stage: "dispatcher".to_string(),
				source,
			})?;
		let generator = spawn_stage(generator)?;

		loop {
			let running = [&cooker, &courier_dispatch, &runner, &generator]
				.into_iter()
				.chain(matcher_threads.iter())
				.any(|stage| !stage.handle.is_finished());
			if !running {
				break;
			}
			thread::sleep(MONITOR_INTERVAL);
		}

		let generated = generator.join();
		let cooked = cooker.join();
		let dispatched = courier_dispatch.join();
		let arrived = runner.join();
		for matcher in matcher_threads {
			matcher.join();
		}

		stop.stop();
		let dispatch = dispatcher
			.join()
			.map_err(|_| KitchenError::DispatcherPanicked)?;

		let matched = stats
			.iter()
			.filter_map(|receiver| receiver.try_recv().ok())
			.collect();

		let report = KitchenReport {
			generated,
			cooked,
			dispatched,
			arrived,
			matched,
			dispatch,
			elapsed: started.elapsed(),
		};
		info!(
			target: "kitchen",
			generated = report.generated,
			cooked = report.cooked,
			dispatched = report.dispatched,
			arrived = report.arrived,
			elapsed_ms = report.elapsed.as_millis() as u64,
			"Kitchen finished"
		);
		Ok(report)
	}
}
