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

use serde::{Deserialize, Serialize};

use crate::random::DelaySource;

/// Menu served by the kitchen, with preparation time in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FoodOffering {
	CheesePizza,
	CheeseBurger,
	IceCream,
	Sandwich,
	HotDog,
	Chocolate,
	Candy,
	Tea,
	Coffee,
	Cake,
	Bread,
	Salad,
}

impl FoodOffering {
	pub const ALL: [FoodOffering; 12] = [
		FoodOffering::CheesePizza,
		FoodOffering::CheeseBurger,
		FoodOffering::IceCream,
		FoodOffering::Sandwich,
		FoodOffering::HotDog,
		FoodOffering::Chocolate,
		FoodOffering::Candy,
		FoodOffering::Tea,
		FoodOffering::Coffee,
		FoodOffering::Cake,
		FoodOffering::Bread,
		FoodOffering::Salad,
	];

	pub fn name(&self) -> &'static str {
		match self {
			FoodOffering::CheesePizza => "Cheese Pizza",
			FoodOffering::CheeseBurger => "Cheese Burger",
			FoodOffering::IceCream => "Ice Cream",
			FoodOffering::Sandwich => "Sandwich",
			FoodOffering::HotDog => "Hot Dog",
			FoodOffering::Chocolate => "Chocolate",
			FoodOffering::Candy => "Candy",
			FoodOffering::Tea => "Tea",
			FoodOffering::Coffee => "Coffee",
			FoodOffering::Cake => "Cake",
			FoodOffering::Bread => "Bread",
			FoodOffering::Salad => "Salad",
		}
	}

	pub fn prep_time(&self) -> u32 {
		match self {
			FoodOffering::CheesePizza => 13,
			FoodOffering::CheeseBurger => 14,
			FoodOffering::IceCream => 3,
			FoodOffering::Sandwich => 4,
			FoodOffering::HotDog => 5,
			FoodOffering::Chocolate => 6,
			FoodOffering::Candy => 7,
			FoodOffering::Tea => 8,
			FoodOffering::Coffee => 9,
			FoodOffering::Cake => 10,
			FoodOffering::Bread => 11,
			FoodOffering::Salad => 12,
		}
	}

	/// Pick an offering uniformly from the menu
	pub fn random(source: &mut dyn DelaySource) -> Self {
		let idx = source.uniform(0, (Self::ALL.len() - 1) as u32) as usize;
		Self::ALL[idx.min(Self::ALL.len() - 1)]
	}
}
