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

//! Command-line front-end
//!
//! Flags come in `-flag value` pairs and override whatever the environment
//! configured.

use thiserror::Error;

use crate::config::{
	KitchenConfig, MAX_ORDERS_PER_SECOND, MAX_QUEUE_LIMIT, MAX_TOTAL_ORDERS, StrategySelection,
};

/// Error types for command-line parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
	#[error("Missing value for {0}")]
	MissingValue(String),
	#[error("Unknown option: {0}")]
	UnknownFlag(String),
	#[error("Invalid number for {flag} : {value}")]
	InvalidNumber { flag: &'static str, value: String },
	#[error("Value for {flag} must be between {min} and {max}, got {value}")]
	OutOfRange {
		flag: &'static str,
		min: usize,
		max: usize,
		value: usize,
	},
	#[error("Invalid value for {flag} : {value}")]
	InvalidChoice { flag: &'static str, value: String },
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
	Run(CliArgs),
	Help,
}

/// Overrides given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
	pub total_orders: Option<usize>,
	pub orders_per_second: Option<usize>,
	pub max_queue: Option<usize>,
	pub random_food: Option<bool>,
	pub strategy: Option<StrategySelection>,
}

impl CliArgs {
	pub fn apply_to(&self, config: &mut KitchenConfig) {
		if let Some(total_orders) = self.total_orders {
			config.total_orders = total_orders;
		}
		if let Some(orders_per_second) = self.orders_per_second {
			config.orders_per_second = orders_per_second;
		}
		if let Some(max_queue) = self.max_queue {
			config.max_queue = max_queue;
		}
		if let Some(random_food) = self.random_food {
			config.random_food = random_food;
		}
		if let Some(strategy) = self.strategy {
			config.strategy = strategy;
		}
	}
}

pub fn usage() -> &'static str {
	"usage: -o <number> -ops <number> -q <number> -r <y|n> -t <1|2|3>\n\
	 -o <number>   --> Total number of orders, default is 100, range from 1 to 100,000.\n\
	 -ops <number> --> Order per second, default is 2, range from 1 to 100.\n\
	 -q <number>   --> Max queue length, default is 1000, range from 1 to 100,000.\n\
	 -r <y|n>      --> Randomly choosing food for orders, otherwise Cheese Pizza will be chosen, default is [y]es.\n\
	 -t <1|2|3>    --> Match type, 1: MATCH, 2: FIFO, 3: both 1 & 2, default is 3.\n\
	 -h            --> Show this message."
}

fn parse_bounded(flag: &'static str, value: &str, max: usize) -> Result<usize, CliError> {
	let parsed: usize = value.trim().parse().map_err(|_| CliError::InvalidNumber {
		flag,
		value: value.to_string(),
	})?;
	if !(1..=max).contains(&parsed) {
		return Err(CliError::OutOfRange {
			flag,
			min: 1,
			max,
			value: parsed,
		});
	}
	Ok(parsed)
}

/// Parse arguments, excluding the program name
pub fn parse_args<I, S>(args: I) -> Result<CliCommand, CliError>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut parsed = CliArgs::default();
	let mut args = args.into_iter();

	while let Some(flag) = args.next() {
		let flag = flag.as_ref();
		if matches!(flag, "-h" | "--help") {
			return Ok(CliCommand::Help);
		}
		if !matches!(flag, "-o" | "-ops" | "-q" | "-r" | "-t") {
			return Err(CliError::UnknownFlag(flag.to_string()));
		}

		let value = args
			.next()
			.ok_or_else(|| CliError::MissingValue(flag.to_string()))?;
		let value = value.as_ref();

		match flag {
			"-o" => parsed.total_orders = Some(parse_bounded("orders", value, MAX_TOTAL_ORDERS)?),
			"-ops" => {
				parsed.orders_per_second = Some(parse_bounded("ops", value, MAX_ORDERS_PER_SECOND)?)
			}
			"-q" => {
				parsed.max_queue = Some(parse_bounded("max queue length", value, MAX_QUEUE_LIMIT)?)
			}
			"-r" => {
				parsed.random_food = Some(match value.trim().to_ascii_lowercase().as_str() {
					"y" => true,
					"n" => false,
					_ => {
						return Err(CliError::InvalidChoice {
							flag: "random food",
							value: value.to_string(),
						});
					}
				})
			}
			_ => {
				let code = parse_bounded("type", value, 3)?;
				parsed.strategy = StrategySelection::from_code(code as u8);
			}
		}
	}

	Ok(CliCommand::Run(parsed))
}
