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

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategy::StrategyKind;

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "kitchen";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Simulation constants
/// Maximum delivery attempts for a single message before it is dropped
pub const MSG_RETRY: u32 = 6;

/// Idle polls a stopping stage tolerates before giving up on its target count
pub const GRACE_TIME: u32 = 300;

/// Lower bound of the courier travel time, in ticks
pub const COURIER_START: u32 = 3;

/// Upper bound of the courier travel time, in ticks
pub const COURIER_END: u32 = 15;

/// Worker pools queue this many jobs per worker thread before running inline
pub const POOL_QUEUE_FACTOR: usize = 10;

// Run parameter defaults and bounds (can be overridden by KITCHEN_* variables or CLI flags)
pub const DEFAULT_TOTAL_ORDERS: usize = 100;
pub const MAX_TOTAL_ORDERS: usize = 100_000;

pub const DEFAULT_ORDERS_PER_SECOND: usize = 2;
pub const MAX_ORDERS_PER_SECOND: usize = 100;

pub const DEFAULT_MAX_QUEUE: usize = 1_000;
pub const MAX_QUEUE_LIMIT: usize = 100_000;

/// Default upper bound on worker threads per pool
pub const DEFAULT_MAX_POOL_THREADS: usize = 1_000;

/// Default length of one simulated second in milliseconds
pub const DEFAULT_TICK_MS: u64 = 1_000;

/// Default wait on an inbound queue before re-checking stop conditions
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 1_000;

/// Which matching strategies a run exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategySelection {
	Match,
	Fifo,
	Both,
}

impl StrategySelection {
	/// Map the numeric CLI code (1 MATCH, 2 FIFO, 3 both)
	pub fn from_code(code: u8) -> Option<Self> {
		match code {
			1 => Some(Self::Match),
			2 => Some(Self::Fifo),
			3 => Some(Self::Both),
			_ => None,
		}
	}

	pub fn kinds(&self) -> &'static [StrategyKind] {
		match self {
			Self::Match => &[StrategyKind::Match],
			Self::Fifo => &[StrategyKind::Fifo],
			Self::Both => &[StrategyKind::Match, StrategyKind::Fifo],
		}
	}
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("Failed to load configuration: {0}")]
	Load(#[from] config::ConfigError),
	#[error("{field} must be between {min} and {max}, got {value}")]
	OutOfRange {
		field: &'static str,
		min: usize,
		max: usize,
		value: usize,
	},
	#[error("{0} must be greater than zero")]
	Zero(&'static str),
}

/// Simulation run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KitchenConfig {
	/// Total orders the generator publishes
	pub total_orders: usize,
	/// Orders published per tick
	pub orders_per_second: usize,
	/// Capacity of every bounded queue
	pub max_queue: usize,
	/// Pick a random food offering per order instead of the fixed one
	pub random_food: bool,
	/// Strategies to run side by side
	pub strategy: StrategySelection,
	/// Idle polls a stopping stage waits for its target count
	pub grace_ticks: u32,
	/// Delivery attempts per message
	pub msg_retry: u32,
	/// Worker thread cap for each pool
	pub max_pool_threads: usize,
	/// Length of one simulated second
	pub tick_ms: u64,
	/// Inbound queue poll timeout
	pub poll_timeout_ms: u64,
}

impl Default for KitchenConfig {
	fn default() -> Self {
		Self {
			total_orders: DEFAULT_TOTAL_ORDERS,
			orders_per_second: DEFAULT_ORDERS_PER_SECOND,
			max_queue: DEFAULT_MAX_QUEUE,
			random_food: true,
			strategy: StrategySelection::Both,
			grace_ticks: GRACE_TIME,
			msg_retry: MSG_RETRY,
			max_pool_threads: DEFAULT_MAX_POOL_THREADS,
			tick_ms: DEFAULT_TICK_MS,
			poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
		}
	}
}

impl KitchenConfig {
	/// Load configuration from environment variables
	///
	/// Every field maps to `KITCHEN_<FIELD>`; unset fields keep their defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		dotenv::dotenv().ok();

		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("KITCHEN").try_parsing(true))
			.build()?;

		Ok(cfg.try_deserialize()?)
	}

	/// Check run parameters against their allowed ranges
	pub fn validate(&self) -> Result<(), ConfigError> {
		check_range("total_orders", self.total_orders, 1, MAX_TOTAL_ORDERS)?;
		check_range(
			"orders_per_second",
			self.orders_per_second,
			1,
			MAX_ORDERS_PER_SECOND,
		)?;
		check_range("max_queue", self.max_queue, 1, MAX_QUEUE_LIMIT)?;

		if self.msg_retry == 0 {
			return Err(ConfigError::Zero("msg_retry"));
		}
		if self.grace_ticks == 0 {
			return Err(ConfigError::Zero("grace_ticks"));
		}
		if self.max_pool_threads == 0 {
			return Err(ConfigError::Zero("max_pool_threads"));
		}
		if self.tick_ms == 0 {
			return Err(ConfigError::Zero("tick_ms"));
		}
		if self.poll_timeout_ms == 0 {
			return Err(ConfigError::Zero("poll_timeout_ms"));
		}
		Ok(())
	}

	pub fn tick(&self) -> Duration {
		Duration::from_millis(self.tick_ms)
	}

	pub fn poll_timeout(&self) -> Duration {
		Duration::from_millis(self.poll_timeout_ms)
	}
}

fn check_range(field: &'static str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
	if value < min || value > max {
		return Err(ConfigError::OutOfRange {
			field,
			min,
			max,
			value,
		});
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_are_valid() {
		let config = KitchenConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.tick(), Duration::from_secs(1));
		assert_eq!(config.strategy.kinds().len(), 2);
	}

	#[test]
	fn test_out_of_range_orders() {
		let config = KitchenConfig {
			total_orders: MAX_TOTAL_ORDERS + 1,
			..KitchenConfig::default()
		};
		assert!(matches!(
			config.validate(),
			Err(ConfigError::OutOfRange {
				field: "total_orders",
				..
			})
		));
	}

	#[test]
	fn test_zero_tick_rejected() {
		let config = KitchenConfig {
			tick_ms: 0,
			..KitchenConfig::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Zero("tick_ms"))));
	}

	#[test]
	fn test_zero_grace_rejected() {
		let config = KitchenConfig {
			grace_ticks: 0,
			..KitchenConfig::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Zero("grace_ticks"))));
	}

	#[test]
	fn test_strategy_codes() {
		assert_eq!(StrategySelection::from_code(1), Some(StrategySelection::Match));
		assert_eq!(StrategySelection::from_code(2), Some(StrategySelection::Fifo));
		assert_eq!(StrategySelection::from_code(3), Some(StrategySelection::Both));
		assert_eq!(StrategySelection::from_code(4), None);
		assert_eq!(StrategySelection::Fifo.kinds(), &[StrategyKind::Fifo]);
	}
}
