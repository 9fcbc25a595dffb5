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

use std::collections::HashSet;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use galley_kitchen::{
	Command, Courier, FoodOffering, KitchenConfig, Message, MessageQueue, Order, QueueReceiver,
	RetryPolicy, Stage, StageSettings, StrategyKind,
	config::{COURIER_END, COURIER_START},
	random::UniformDelay,
	stage::{CourierDispatcher, CourierRunner, FoodCooker, MatcherStage, OrderGenerator},
};

fn test_settings(grace_ticks: u32) -> StageSettings {
	StageSettings {
		queue_capacity: 512,
		poll_timeout: Duration::from_millis(5),
		grace_ticks,
		tick: Duration::from_millis(1),
		retry: RetryPolicy::new(6, Duration::from_millis(1)),
		max_pool_threads: 16,
	}
}

/// Wire the stage's output to a fresh queue and return its receiver
fn wire<S: Stage>(stage: &mut S) -> QueueReceiver {
	let (sender, receiver) = MessageQueue::new(512).split();
	stage.set_out_queue(sender);
	receiver
}

fn feed<S: Stage>(stage: &S, messages: impl IntoIterator<Item = Message>) {
	let inbox = stage.in_queue().expect("consuming stage has an inbox");
	for message in messages {
		inbox.sender.try_enqueue(message).unwrap();
	}
}

fn spawn<S: Stage + 'static>(mut stage: S) -> JoinHandle<(usize, S)> {
	thread::spawn(move || {
		let handled = stage.run();
		(handled, stage)
	})
}

fn ready_order() -> Order {
	let mut order = Order::new(FoodOffering::IceCream);
	order.mark_ready(1_000);
	order
}

fn arrived_courier(order_id: Option<&str>, at: u64) -> Courier {
	let mut courier = Courier::new(COURIER_START);
	if let Some(id) = order_id {
		courier.assign(id);
	}
	courier.mark_arrived(at);
	courier
}

#[test]
fn test_cooker_prepares_every_order() {
	let mut cooker = FoodCooker::new(test_settings(50));
	let out = wire(&mut cooker);

	let orders: Vec<Message> = FoodOffering::ALL
		.iter()
		.cycle()
		.take(100)
		.map(|food| Message::Order(Order::new(*food)))
		.collect();
	feed(&cooker, orders);
	feed(&cooker, [Message::Command(Command::exit(100))]);

	let (handled, cooker) = spawn(cooker).join().unwrap();
	assert_eq!(handled, 100);
	assert!(!cooker.is_alive());

	let cooked = out.drain();
	assert_eq!(cooked.len(), 100);
	assert!(
		cooked
			.iter()
			.all(|m| m.as_order().is_some_and(Order::is_ready))
	);
}

#[test]
fn test_cooker_ignores_what_it_does_not_admit() {
	let mut cooker = FoodCooker::new(test_settings(50));
	let out = wire(&mut cooker);

	feed(
		&cooker,
		[
			Message::Order(ready_order()),
			Message::Courier(Courier::new(3)),
			Message::Order(Order::new(FoodOffering::Tea)),
			Message::Order(Order::new(FoodOffering::Cake)),
			Message::Command(Command::exit(2)),
		],
	);

	let (handled, _) = spawn(cooker).join().unwrap();
	assert_eq!(handled, 2);
	assert_eq!(out.drain().len(), 2);
}

#[test]
fn test_courier_dispatch_assigns_one_courier_per_order() {
	let mut dispatch =
		CourierDispatcher::with_delay_source(test_settings(50), Box::new(UniformDelay::seeded(9)));
	let out = wire(&mut dispatch);

	let orders: Vec<Order> = (0..100).map(|_| Order::new(FoodOffering::Candy)).collect();
	let ids: HashSet<String> = orders.iter().map(|o| o.id.clone()).collect();
	feed(&dispatch, orders.into_iter().map(Message::Order));
	feed(&dispatch, [Message::Command(Command::exit(100))]);

	let (handled, _) = spawn(dispatch).join().unwrap();
	assert_eq!(handled, 100);

	let couriers = out.drain();
	assert_eq!(couriers.len(), 100);
	let mut assigned = HashSet::new();
	for message in &couriers {
		let courier = message.as_courier().unwrap();
		assert!(!courier.is_arrived());
		assert!((COURIER_START..=COURIER_END).contains(&courier.arrive_period));
		assigned.insert(courier.assigned_order_id.clone().unwrap());
	}
	assert_eq!(assigned, ids);
}

#[test]
fn test_courier_dispatch_moves_on_when_couriers_cannot_be_published() {
	let mut dispatch = CourierDispatcher::new(test_settings(50));
	let (sender, out) = MessageQueue::new(1).split();
	sender.try_enqueue(Message::Command(Command::exit(0))).unwrap();
	dispatch.set_out_queue(sender);

	feed(&dispatch, (0..3).map(|_| Message::Order(Order::new(FoodOffering::Tea))));
	feed(&dispatch, [Message::Command(Command::exit(3))]);

	let (handled, _) = spawn(dispatch).join().unwrap();
	assert_eq!(handled, 3);

	let left = out.drain();
	assert_eq!(left.len(), 1);
	assert!(left[0].is_command());
}

#[test]
fn test_courier_runner_delivers_every_courier() {
	let mut runner = CourierRunner::new(test_settings(50));
	let out = wire(&mut runner);

	feed(&runner, (0..100).map(|_| Message::Courier(Courier::new(COURIER_START))));
	feed(&runner, [Message::Command(Command::exit(100))]);

	let (handled, _) = spawn(runner).join().unwrap();
	assert_eq!(handled, 100);

	let arrived = out.drain();
	assert_eq!(arrived.len(), 100);
	assert!(
		arrived
			.iter()
			.all(|m| m.as_courier().is_some_and(Courier::is_arrived))
	);
}

#[test]
fn test_match_strategy_pairs_only_assigned_couriers() {
	let mut matcher = MatcherStage::new(StrategyKind::Match, test_settings(5));
	let out = wire(&mut matcher);
	let stats = matcher.stats_receiver();

	let orders: Vec<Order> = (0..100).map(|_| ready_order()).collect();
	let couriers: Vec<Courier> = orders
		.iter()
		.enumerate()
		.map(|(i, order)| {
			let assigned = (i % 2 == 0).then_some(order.id.as_str());
			arrived_courier(assigned, 2_000)
		})
		.collect();

	feed(&matcher, orders.into_iter().map(Message::Order));
	feed(&matcher, couriers.into_iter().map(Message::Courier));
	feed(&matcher, [Message::Command(Command::exit(100))]);

	let (handled, matcher) = spawn(matcher).join().unwrap();
	assert_eq!(handled, 50);
	assert!(!matcher.is_alive());
	assert!(out.is_empty());

	let stats = stats.try_recv().unwrap();
	assert_eq!(stats.strategy, StrategyKind::Match);
	assert_eq!(stats.matched, 50);
}

#[test]
fn test_fifo_strategy_drains_all_orders() {
	let mut matcher = MatcherStage::new(StrategyKind::Fifo, test_settings(300));
	let _out = wire(&mut matcher);
	let stats = matcher.stats_receiver();

	feed(
		&matcher,
		(0..110).map(|i| Message::Courier(arrived_courier(None, 1_000 + i))),
	);
	feed(&matcher, (0..100).map(|_| Message::Order(ready_order())));
	feed(&matcher, [Message::Command(Command::exit(100))]);

	let started = Instant::now();
	let (handled, _) = spawn(matcher).join().unwrap();
	assert_eq!(handled, 100);
	// Reached the total, not the grace countdown
	assert!(started.elapsed() < Duration::from_millis(1_000));

	let stats = stats.try_recv().unwrap();
	assert_eq!(stats.strategy, StrategyKind::Fifo);
	assert_eq!(stats.matched, 100);
}

#[test]
fn test_fifo_strategy_matches_equal_counts_in_any_arrival_order() {
	let mut matcher = MatcherStage::new(StrategyKind::Fifo, test_settings(300));
	let _out = wire(&mut matcher);
	let stats = matcher.stats_receiver();

	feed(
		&matcher,
		(0..50).map(|i| Message::Courier(arrived_courier(None, 1_000 + i))),
	);
	feed(&matcher, (0..100).map(|_| Message::Order(ready_order())));
	feed(
		&matcher,
		(0..50).map(|i| Message::Courier(arrived_courier(None, 2_000 + i))),
	);
	feed(&matcher, [Message::Command(Command::exit(100))]);

	let (handled, _) = spawn(matcher).join().unwrap();
	assert_eq!(handled, 100);
	assert_eq!(stats.try_recv().unwrap().matched, 100);
}

#[test]
fn test_generator_paces_and_announces_total() {
	let config = KitchenConfig {
		total_orders: 20,
		orders_per_second: 9,
		..KitchenConfig::default()
	};
	let settings = StageSettings {
		tick: Duration::from_millis(50),
		..test_settings(50)
	};
	let mut generator = OrderGenerator::with_delay_source(&config, &settings, Box::new(UniformDelay::seeded(3)));
	assert!(generator.in_queue().is_none());
	let out = wire(&mut generator);

	let started = Instant::now();
	let (published, generator) = spawn(generator).join().unwrap();
	let elapsed = started.elapsed();

	assert_eq!(published, 20);
	assert!(!generator.is_alive());
	// Three batches of at most 9 orders, each holding a full tick
	assert!(elapsed >= Duration::from_millis(150));

	let messages = out.drain();
	assert_eq!(messages.len(), 21);
	assert!(messages[..20].iter().all(|m| m.as_order().is_some()));
	let Message::Command(command) = &messages[20] else {
		panic!("last message must be the exit command");
	};
	assert_eq!(command.total().unwrap(), 20);

	let seqs: Vec<u64> = messages.iter().map(Message::seq).collect();
	assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_generator_holds_the_last_tick_when_rate_divides_total() {
	let config = KitchenConfig {
		total_orders: 4,
		orders_per_second: 2,
		..KitchenConfig::default()
	};
	let settings = StageSettings {
		tick: Duration::from_millis(100),
		..test_settings(50)
	};
	let mut generator = OrderGenerator::new(&config, &settings);
	let out = wire(&mut generator);

	let started = Instant::now();
	let (published, _) = spawn(generator).join().unwrap();

	assert_eq!(published, 4);
	assert!(started.elapsed() >= Duration::from_millis(200));
	assert_eq!(out.drain().len(), 5);
}

#[test]
fn test_generator_waits_out_a_full_queue() {
	let config = KitchenConfig {
		total_orders: 5,
		orders_per_second: 5,
		random_food: false,
		..KitchenConfig::default()
	};
	let settings = StageSettings {
		tick: Duration::from_millis(5),
		..test_settings(3)
	};
	let mut generator = OrderGenerator::new(&config, &settings);
	let (sender, receiver) = MessageQueue::new(2).split();
	generator.set_out_queue(sender);

	let handle = spawn(generator);
	let mut received = Vec::new();
	let deadline = Instant::now() + Duration::from_secs(5);
	while received.len() < 6 && Instant::now() < deadline {
		if let Ok(message) = receiver.recv_timeout(Duration::from_millis(20)) {
			received.push(message);
		}
	}
	let (published, _) = handle.join().unwrap();

	assert_eq!(published, 5);
	assert_eq!(received.len(), 6);
	assert!(received[5].is_command());
	assert!(
		received[..5]
			.iter()
			.all(|m| m.as_order().is_some_and(|o| o.food == FoodOffering::CheesePizza))
	);
}

#[test]
fn test_stage_liveness_spans_its_run() {
	let mut runner = CourierRunner::new(test_settings(3));
	let _out = wire(&mut runner);
	let inbox = runner.in_queue().unwrap();
	assert!(!inbox.is_alive());

	let handle = spawn(runner);
	let deadline = Instant::now() + Duration::from_secs(1);
	while !inbox.is_alive() && Instant::now() < deadline {
		thread::sleep(Duration::from_millis(1));
	}
	assert!(inbox.is_alive());

	// Nothing will ever arrive, so the grace countdown ends the run
	inbox
		.sender
		.try_enqueue(Message::Command(Command::exit(5)))
		.unwrap();
	let started = Instant::now();
	let (handled, _) = handle.join().unwrap();

	assert_eq!(handled, 0);
	assert!(!inbox.is_alive());
	assert!(started.elapsed() < Duration::from_millis(500));
}
