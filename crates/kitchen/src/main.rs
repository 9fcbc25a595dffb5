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

//! Kitchen simulation entry point
//!
//! Parses the command line, loads configuration from the environment,
//! runs the pipeline once and prints each strategy's statistics.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{info, warn};

use galley_kitchen::{
	Kitchen, KitchenConfig,
	cli::{self, CliCommand},
	logging,
};

fn main() -> ExitCode {
	let args = match cli::parse_args(std::env::args().skip(1)) {
		Ok(CliCommand::Run(args)) => args,
		Ok(CliCommand::Help) => {
			println!("{}", cli::usage());
			return ExitCode::SUCCESS;
		}
		Err(e) => {
			println!("{}", e);
			println!("{}", cli::usage());
			return ExitCode::FAILURE;
		}
	};

	let mut config = KitchenConfig::from_env().unwrap_or_else(|e| {
		eprintln!("Using default configuration: {}", e);
		KitchenConfig::default()
	});
	args.apply_to(&mut config);
	if let Err(e) = config.validate() {
		println!("{}", e);
		println!("{}", cli::usage());
		return ExitCode::FAILURE;
	}

	match run(config) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("Error: {:#}", e);
			ExitCode::FAILURE
		}
	}
}

fn run(config: KitchenConfig) -> Result<()> {
	logging::init_logging()?;
	info!(target: "kitchen", config = ?config, "Starting kitchen");

	let kitchen = Kitchen::new(config).context("Invalid configuration")?;
	let report = kitchen.run().context("Kitchen run failed")?;

	for stats in &report.matched {
		println!("{}\n", stats);
	}
	if report.dispatch.dropped > 0 {
		warn!(target: "kitchen", dropped = report.dispatch.dropped, "Some deliveries were dropped");
	}
	println!(
		"Kitchen end, total time (in ms) spend {}",
		report.elapsed.as_millis()
	);
	Ok(())
}
