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

//! Galley Kitchen
//!
//! A simulated food-delivery kitchen: orders are generated, cooked and
//! picked up by couriers that travel in from outside. Every component runs
//! on its own thread and talks only through bounded queues.
//!
//! Architecture:
//! - One dispatcher owns the main queue and fans messages out to stages
//! - Stages (generator, cooker, courier dispatch, courier runner, matchers)
//!   each consume from their own inbox and publish back to the main queue
//! - Delay stages sleep on bounded worker pools with caller-runs saturation
//! - Full queues are retried with linear backoff, then dropped
//! - Matchers run a pluggable strategy (MATCH or FIFO) and report pickup
//!   statistics at shutdown

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod kitchen;
pub mod logging;
pub mod message;
pub mod pool;
pub mod queue;
pub mod random;
pub mod retry;
pub mod stage;
pub mod strategy;

pub use config::{KitchenConfig, StrategySelection};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherConfig, StopSignal};
pub use kitchen::{Kitchen, KitchenError, KitchenReport};
pub use message::{Command, CommandKind, Courier, FoodOffering, Message, Order};
pub use queue::{MessageQueue, QueueError, QueueReceiver, QueueSender};
pub use retry::{Delivery, RetryPolicy};
pub use stage::{Inbox, Liveness, Stage, StageKind, StageSettings};
pub use strategy::{MatchStats, Strategy, StrategyKind};
