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

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Source of uniformly distributed delays
///
/// Stages draw courier travel times and menu picks through this trait so
/// tests can pin the sequence with a seed.
pub trait DelaySource: Send {
	/// Draw an integer uniformly from the inclusive range spanned by
	/// `start` and `end` (in either order)
	fn uniform(&mut self, start: u32, end: u32) -> u32;
}

/// `DelaySource` backed by a `StdRng`
pub struct UniformDelay {
	rng: StdRng,
}

impl UniformDelay {
	pub fn new() -> Self {
		Self {
			rng: StdRng::from_entropy(),
		}
	}

	pub fn seeded(seed: u64) -> Self {
		Self {
			rng: StdRng::seed_from_u64(seed),
		}
	}
}

impl Default for UniformDelay {
	fn default() -> Self {
		Self::new()
	}
}

impl DelaySource for UniformDelay {
	fn uniform(&mut self, start: u32, end: u32) -> u32 {
		let (low, high) = if start <= end {
			(start, end)
		} else {
			(end, start)
		};
		self.rng.gen_range(low..=high)
	}
}
