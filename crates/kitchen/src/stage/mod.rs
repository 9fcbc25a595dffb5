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

//! Pipeline stages
//!
//! A stage is an independently running unit plugged into the dispatcher.
//! Consuming stages own a bounded inbox and share one loop shape:
//! - poll the inbox with a timeout
//! - drop messages the stage does not admit
//! - hand admitted work to the stage-specific `Consume` implementation
//! - on the exit command, keep consuming until the announced total is
//!   handled or the grace countdown runs out
//! - drain outstanding async work, then report not-alive

mod cooker;
mod courier_dispatch;
mod courier_runner;
mod delayed;
mod generator;
mod matcher;

pub use cooker::FoodCooker;
pub use courier_dispatch::CourierDispatcher;
pub use courier_runner::CourierRunner;
pub use generator::OrderGenerator;
pub use matcher::MatcherStage;

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
	config::{GRACE_TIME, KitchenConfig},
	message::{Command, CommandError, CommandKind, Message},
	pool::PoolError,
	queue::{MessageQueue, QueueError, QueueReceiver, QueueSender},
	retry::RetryPolicy,
};

/// Closed set of stage variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
	Generator,
	Cooker,
	CourierDispatch,
	CourierRunner,
	Matcher,
}

impl StageKind {
	pub fn name(&self) -> &'static str {
		match self {
			StageKind::Generator => "order-generator",
			StageKind::Cooker => "food-cooker",
			StageKind::CourierDispatch => "courier-dispatcher",
			StageKind::CourierRunner => "courier-runner",
			StageKind::Matcher => "matcher",
		}
	}

	/// Admission predicate checked before a message enters this stage's inbox
	pub fn admits(&self, message: &Message) -> bool {
		match (self, message) {
			(StageKind::Generator, _) => false,
			(_, Message::Command(_)) => true,
			(StageKind::Cooker | StageKind::CourierDispatch, Message::Order(order)) => {
				!order.is_ready()
			}
			(StageKind::CourierRunner, Message::Courier(courier)) => !courier.is_arrived(),
			(StageKind::Matcher, Message::Order(order)) => order.is_ready(),
			(StageKind::Matcher, Message::Courier(courier)) => courier.is_arrived(),
			_ => false,
		}
	}
}

/// Shared alive flag of a stage
///
/// The dispatcher reads it before every delivery and retry attempt.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
	pub fn new(alive: bool) -> Self {
		Self(Arc::new(AtomicBool::new(alive)))
	}

	pub fn is_alive(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}

	pub fn set(&self, alive: bool) {
		self.0.store(alive, Ordering::Release);
	}
}

/// What a consuming stage exposes to the dispatcher
#[derive(Clone)]
pub struct Inbox {
	pub kind: StageKind,
	pub name: String,
	pub sender: QueueSender,
	pub liveness: Liveness,
}

impl Inbox {
	pub fn admits(&self, message: &Message) -> bool {
		self.kind.admits(message)
	}

	pub fn is_alive(&self) -> bool {
		self.liveness.is_alive()
	}
}

/// Capability interface shared by every stage
pub trait Stage: Send {
	fn kind(&self) -> StageKind;

	fn name(&self) -> &str;

	/// Inbound queue, or `None` for pure producers
	fn in_queue(&self) -> Option<Inbox>;

	/// Wire the outbound side to the dispatcher's main queue
	fn set_out_queue(&mut self, out: QueueSender);

	fn filter(&self, message: &Message) -> bool {
		self.kind().admits(message)
	}

	fn is_alive(&self) -> bool;

	/// Run to completion; returns the number of messages this stage handled
	fn run(&mut self) -> usize;
}

/// Error types raised while a stage handles a message
#[derive(Debug, Error)]
pub enum StageError {
	#[error(transparent)]
	Command(#[from] CommandError),
	#[error("Stage {stage} cannot handle message {seq}")]
	Unexpected { stage: String, seq: u64 },
	#[error("Stage {0} has no outbound queue")]
	NotWired(String),
	#[error(transparent)]
	Task(#[from] PoolError),
}

/// Timing and capacity shared by all stages of a run
#[derive(Debug, Clone)]
pub struct StageSettings {
	pub queue_capacity: usize,
	pub poll_timeout: Duration,
	pub grace_ticks: u32,
	/// One simulated second
	pub tick: Duration,
	pub retry: RetryPolicy,
	pub max_pool_threads: usize,
}

impl StageSettings {
	pub fn from_config(config: &KitchenConfig) -> Self {
		Self {
			queue_capacity: config.max_queue,
			poll_timeout: config.poll_timeout(),
			grace_ticks: config.grace_ticks,
			tick: config.tick(),
			retry: RetryPolicy::new(config.msg_retry, config.tick()),
			max_pool_threads: config.max_pool_threads.min(config.max_queue),
		}
	}
}

impl Default for StageSettings {
	fn default() -> Self {
		Self::from_config(&KitchenConfig::default())
	}
}

/// Lifecycle of a consuming stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
	Running,
	/// Exit command seen; waiting for `total` with `grace` idle polls left
	Stopping { total: usize, grace: u32 },
	Terminated,
}

/// Implements the exit-command shutdown protocol
#[derive(Debug)]
pub struct ShutdownTracker {
	state: StageState,
	grace_ticks: u32,
}

impl ShutdownTracker {
	pub fn new(grace_ticks: u32) -> Self {
		Self {
			state: StageState::Running,
			grace_ticks,
		}
	}

	pub fn state(&self) -> StageState {
		self.state
	}

	pub fn is_stopping(&self) -> bool {
		matches!(self.state, StageState::Stopping { .. })
	}

	/// React to a control command
	///
	/// Returns the announced total when the command starts the shutdown.
	/// Repeated exit commands are ignored.
	pub fn on_command(&mut self, command: &Command) -> Result<Option<usize>, CommandError> {
		match command.kind {
			CommandKind::Exit => {
				if self.state != StageState::Running {
					return Ok(None);
				}
				let total = command.total()?;
				self.state = StageState::Stopping {
					total,
					grace: self.grace_ticks,
				};
				Ok(Some(total))
			}
		}
	}

	/// Count down one idle poll while stopping
	pub fn on_idle(&mut self) {
		if let StageState::Stopping { grace, .. } = &mut self.state {
			*grace = grace.saturating_sub(1);
		}
	}

	/// Whether the loop should end, given how much has been handled
	pub fn should_terminate(&mut self, handled: usize) -> bool {
		match self.state {
			StageState::Running => false,
			StageState::Stopping { total, grace } => {
				if handled >= total || grace == 0 {
					self.state = StageState::Terminated;
					true
				} else {
					false
				}
			}
			StageState::Terminated => true,
		}
	}
}

impl Default for ShutdownTracker {
	fn default() -> Self {
		Self::new(GRACE_TIME)
	}
}

/// Stage-specific handling plugged into the shared consumer loop
pub(crate) trait Consume {
	/// Handle one admitted, non-command message
	///
	/// Returns true when the message counts toward the stage's total.
	fn handle(&mut self, message: Message) -> Result<bool, StageError>;

	/// Called once after the loop ends, before the stage reports not-alive
	fn finish(&mut self) {}
}

/// Inbox, liveness and settings of a consuming stage
pub(crate) struct StageCore {
	kind: StageKind,
	name: String,
	sender: QueueSender,
	receiver: QueueReceiver,
	liveness: Liveness,
	settings: StageSettings,
}

impl StageCore {
	pub(crate) fn new(kind: StageKind, name: impl Into<String>, settings: StageSettings) -> Self {
		let (sender, receiver) = MessageQueue::new(settings.queue_capacity).split();
		Self {
			kind,
			name: name.into(),
			sender,
			receiver,
			liveness: Liveness::default(),
			settings,
		}
	}

	pub(crate) fn kind(&self) -> StageKind {
		self.kind
	}

	pub(crate) fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn inbox(&self) -> Inbox {
		Inbox {
			kind: self.kind,
			name: self.name.clone(),
			sender: self.sender.clone(),
			liveness: self.liveness.clone(),
		}
	}

	pub(crate) fn is_alive(&self) -> bool {
		self.liveness.is_alive()
	}

	/// Shared consumer loop
	pub(crate) fn run_consumer<C: Consume>(&self, consumer: &mut C) -> usize {
		let target = self.kind.name();
		self.liveness.set(true);
		info!(target: "stage", stage = %self.name, "Stage started");

		let mut shutdown = ShutdownTracker::new(self.settings.grace_ticks);
		let mut handled = 0usize;

		loop {
			if shutdown.should_terminate(handled) {
				break;
			}

			let message = match self.receiver.recv_timeout(self.settings.poll_timeout) {
				Ok(message) => message,
				Err(QueueError::Timeout) => {
					shutdown.on_idle();
					continue;
				}
				Err(e) => {
					error!(target: "stage", stage = %self.name, error = %e, "Inbox unavailable, stopping");
					break;
				}
			};

			if !self.kind.admits(&message) {
				debug!(target: "stage", stage = %self.name, seq = message.seq(), "Ignoring message");
				continue;
			}

			match message {
				Message::Command(command) => match shutdown.on_command(&command) {
					Ok(Some(total)) => info!(
						target: "stage",
						stage = %self.name,
						kind = target,
						total = total,
						handled = handled,
						"Got exit command, stopping once total is handled"
					),
					Ok(None) => debug!(target: "stage", stage = %self.name, seq = command.seq, "Duplicate exit command"),
					Err(e) => error!(target: "stage", stage = %self.name, error = %e, "Bad command"),
				},
				other => match consumer.handle(other) {
					Ok(true) => handled += 1,
					Ok(false) => {}
					Err(e) => error!(target: "stage", stage = %self.name, error = %e, "Failed to handle message"),
				},
			}
		}

		match shutdown.state() {
			StageState::Terminated => info!(
				target: "stage",
				stage = %self.name,
				handled = handled,
				"Stage quitting"
			),
			state => warn!(
				target: "stage",
				stage = %self.name,
				handled = handled,
				state = ?state,
				"Stage quitting before shutdown completed"
			),
		}

		consumer.finish();
		self.liveness.set(false);
		handled
	}
}
