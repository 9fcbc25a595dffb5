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

//! Messages flowing through the kitchen bus
//!
//! Three variants share one envelope: orders, couriers and control
//! commands. Every message gets a process-wide sequence number when it is
//! constructed; the number is unique and strictly increasing across all
//! variants and is only used for tracing.

mod food;

pub use food::FoodOffering;

use std::{
	fmt,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sequence number assigned to every message
pub type SequenceNumber = u64;

/// Milliseconds since the Unix epoch
pub type Timestamp = u64;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static NEXT_COURIER: AtomicU64 = AtomicU64::new(1);

/// Take the next message sequence number
pub fn next_sequence() -> SequenceNumber {
	NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Wall-clock time in milliseconds
pub fn now_millis() -> Timestamp {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as Timestamp)
		.unwrap_or(0)
}

/// A food order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	pub seq: SequenceNumber,
	/// Unique order ID (UUID v4)
	pub id: String,
	pub food: FoodOffering,
	pub create_time: Timestamp,
	/// Preparation time in ticks
	pub prep_time: u32,
	/// Set once by the cooker when the food is ready
	pub ready_time: Option<Timestamp>,
	/// Set by the strategy when a courier picks the order up
	pub pickup_time: Option<Timestamp>,
}

impl Order {
	pub fn new(food: FoodOffering) -> Self {
		Self {
			seq: next_sequence(),
			id: uuid::Uuid::new_v4().to_string(),
			food,
			create_time: now_millis(),
			prep_time: food.prep_time(),
			ready_time: None,
			pickup_time: None,
		}
	}

	pub fn is_ready(&self) -> bool {
		self.ready_time.is_some_and(|t| t > 0)
	}

	/// Stamp the ready time; returns false if the order was already ready
	pub fn mark_ready(&mut self, at: Timestamp) -> bool {
		if self.is_ready() {
			return false;
		}
		self.ready_time = Some(at);
		true
	}
}

/// A delivery courier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
	pub seq: SequenceNumber,
	pub id: u64,
	pub name: String,
	pub dispatch_time: Timestamp,
	/// Travel time in ticks
	pub arrive_period: u32,
	pub arrive_time: Option<Timestamp>,
	pub pickup_time: Option<Timestamp>,
	/// The order this courier was dispatched for
	pub assigned_order_id: Option<String>,
}

impl Courier {
	pub fn new(arrive_period: u32) -> Self {
		let id = NEXT_COURIER.fetch_add(1, Ordering::Relaxed);
		Self {
			seq: next_sequence(),
			id,
			name: format!("Courier-#{}", id),
			dispatch_time: now_millis(),
			arrive_period,
			arrive_time: None,
			pickup_time: None,
			assigned_order_id: None,
		}
	}

	/// Dispatch this courier for a specific order
	pub fn assign(&mut self, order_id: impl Into<String>) {
		self.assigned_order_id = Some(order_id.into());
	}

	pub fn is_arrived(&self) -> bool {
		self.arrive_time.is_some_and(|t| t > 0)
	}

	/// Stamp the arrival time; returns false if the courier had already arrived
	pub fn mark_arrived(&mut self, at: Timestamp) -> bool {
		if self.is_arrived() {
			return false;
		}
		self.arrive_time = Some(at);
		true
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
	/// Generation finished; the option carries the number of orders produced
	Exit,
}

/// Error parsing a command option
#[derive(Debug, Error)]
pub enum CommandError {
	#[error("Invalid option {option:?} for {kind:?} command")]
	InvalidOption { kind: CommandKind, option: String },
}

/// Control message broadcast to every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
	pub seq: SequenceNumber,
	pub kind: CommandKind,
	pub option: String,
}

impl Command {
	pub fn exit(total: usize) -> Self {
		Self {
			seq: next_sequence(),
			kind: CommandKind::Exit,
			option: total.to_string(),
		}
	}

	/// Parse the total count carried by an exit command
	pub fn total(&self) -> Result<usize, CommandError> {
		self.option
			.trim()
			.parse()
			.map_err(|_| CommandError::InvalidOption {
				kind: self.kind,
				option: self.option.clone(),
			})
	}
}

/// Envelope for everything published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
	Order(Order),
	Courier(Courier),
	Command(Command),
}

impl Message {
	pub fn seq(&self) -> SequenceNumber {
		match self {
			Message::Order(order) => order.seq,
			Message::Courier(courier) => courier.seq,
			Message::Command(command) => command.seq,
		}
	}

	pub fn is_command(&self) -> bool {
		matches!(self, Message::Command(_))
	}

	pub fn as_order(&self) -> Option<&Order> {
		match self {
			Message::Order(order) => Some(order),
			_ => None,
		}
	}

	pub fn as_courier(&self) -> Option<&Courier> {
		match self {
			Message::Courier(courier) => Some(courier),
			_ => None,
		}
	}
}

impl From<Order> for Message {
	fn from(order: Order) -> Self {
		Message::Order(order)
	}
}

impl From<Courier> for Message {
	fn from(courier: Courier) -> Self {
		Message::Courier(courier)
	}
}

impl From<Command> for Message {
	fn from(command: Command) -> Self {
		Message::Command(command)
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Message::Order(order) => write!(
				f,
				"MSG {}, Order {} ({}), prep {}, ready {:?}, pickup {:?}",
				order.seq,
				order.id,
				order.food.name(),
				order.prep_time,
				order.ready_time,
				order.pickup_time
			),
			Message::Courier(courier) => write!(
				f,
				"MSG {}, {} for {:?}, travel {}, arrived {:?}, pickup {:?}",
				courier.seq,
				courier.name,
				courier.assigned_order_id,
				courier.arrive_period,
				courier.arrive_time,
				courier.pickup_time
			),
			Message::Command(command) => write!(
				f,
				"MSG {}, Command {:?} {}",
				command.seq, command.kind, command.option
			),
		}
	}
}
