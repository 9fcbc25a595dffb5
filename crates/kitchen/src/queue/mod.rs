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

use crossbeam::channel::{
	Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded,
};

use crate::message::Message;

/// Bounded message queue used for the dispatcher's main queue and for
/// every stage inbox
///
/// Properties:
/// - Multiple producers (stages, async tasks, retry tasks)
/// - Single consumer (the dispatcher loop or one stage loop)
/// - Bounded capacity for backpressure
/// - Enqueue never blocks; a rejected message is handed back to the caller
///
/// The queue does NOT implement retry logic; see `retry::deliver_with_retry`.
pub struct MessageQueue {
	sender: Sender<Message>,
	receiver: Receiver<Message>,
}

impl MessageQueue {
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity.max(1));
		Self { sender, receiver }
	}

	/// Split the queue into sender and receiver ends
	///
	/// The sender can be cloned freely; the receiver belongs to one loop.
	pub fn split(self) -> (QueueSender, QueueReceiver) {
		(
			QueueSender {
				sender: self.sender,
			},
			QueueReceiver {
				receiver: self.receiver,
			},
		)
	}
}

/// Sender end of a message queue
#[derive(Clone)]
pub struct QueueSender {
	sender: Sender<Message>,
}

impl QueueSender {
	/// Try to enqueue a message (non-blocking)
	///
	/// On failure the message comes back inside `Rejected` so the caller
	/// can retry without cloning.
	pub fn try_enqueue(&self, message: Message) -> Result<(), Rejected> {
		self.sender.try_send(message).map_err(|e| match e {
			TrySendError::Full(message) => Rejected {
				reason: QueueError::Full,
				message,
			},
			TrySendError::Disconnected(message) => Rejected {
				reason: QueueError::Disconnected,
				message,
			},
		})
	}

	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}

	pub fn len(&self) -> usize {
		self.sender.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sender.is_empty()
	}

	pub fn capacity(&self) -> Option<usize> {
		self.sender.capacity()
	}
}

/// Receiver end of a message queue
pub struct QueueReceiver {
	receiver: Receiver<Message>,
}

impl QueueReceiver {
	/// Wait up to `timeout` for the next message
	///
	/// This is the only blocking call in a stage loop; the timeout bounds
	/// how long a stage takes to notice stop conditions.
	pub fn recv_timeout(&self, timeout: Duration) -> Result<Message, QueueError> {
		self.receiver.recv_timeout(timeout).map_err(|e| match e {
			RecvTimeoutError::Timeout => QueueError::Timeout,
			RecvTimeoutError::Disconnected => QueueError::Disconnected,
		})
	}

	pub fn try_recv(&self) -> Result<Message, QueueError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => QueueError::Empty,
			TryRecvError::Disconnected => QueueError::Disconnected,
		})
	}

	/// Take everything currently queued (non-blocking)
	pub fn drain(&self) -> Vec<Message> {
		self.receiver.try_iter().collect()
	}

	pub fn len(&self) -> usize {
		self.receiver.len()
	}

	pub fn is_empty(&self) -> bool {
		self.receiver.is_empty()
	}
}

/// Errors that can occur when interacting with a message queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
	#[error("Queue is full")]
	Full,
	#[error("Queue is empty")]
	Empty,
	#[error("Timed out waiting for a message")]
	Timeout,
	#[error("Queue disconnected")]
	Disconnected,
}

/// A message the queue refused, with the reason
#[derive(Debug, thiserror::Error)]
#[error("Message {} rejected: {reason}", .message.seq())]
pub struct Rejected {
	pub reason: QueueError,
	pub message: Message,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::{Command, FoodOffering, Order};

	fn create_test_message() -> Message {
		Message::Order(Order::new(FoodOffering::Salad))
	}

	#[test]
	fn test_enqueue_and_recv() {
		let queue = MessageQueue::new(10);
		let (sender, receiver) = queue.split();

		let message = create_test_message();
		let seq = message.seq();
		sender.try_enqueue(message).unwrap();

		let received = receiver.recv_timeout(Duration::from_millis(10)).unwrap();
		assert_eq!(received.seq(), seq);
	}

	#[test]
	fn test_queue_full_hands_message_back() {
		let queue = MessageQueue::new(2);
		let (sender, _receiver) = queue.split();

		sender.try_enqueue(create_test_message()).unwrap();
		sender.try_enqueue(create_test_message()).unwrap();
		assert!(sender.is_full());

		let message = Message::Command(Command::exit(3));
		let seq = message.seq();
		let rejected = sender.try_enqueue(message).unwrap_err();
		assert_eq!(rejected.reason, QueueError::Full);
		assert_eq!(rejected.message.seq(), seq);
	}

	#[test]
	fn test_recv_timeout_on_empty_queue() {
		let queue = MessageQueue::new(1);
		let (_sender, receiver) = queue.split();

		let result = receiver.recv_timeout(Duration::from_millis(5));
		assert_eq!(result.unwrap_err(), QueueError::Timeout);
		assert_eq!(receiver.try_recv().unwrap_err(), QueueError::Empty);
	}

	#[test]
	fn test_disconnected_sender() {
		let queue = MessageQueue::new(1);
		let (sender, receiver) = queue.split();
		drop(receiver);

		let rejected = sender.try_enqueue(create_test_message()).unwrap_err();
		assert_eq!(rejected.reason, QueueError::Disconnected);
	}

	#[test]
	fn test_multiple_senders_and_drain() {
		let queue = MessageQueue::new(10);
		let (sender, receiver) = queue.split();

		let sender1 = sender.clone();
		let sender2 = sender.clone();
		sender1.try_enqueue(create_test_message()).unwrap();
		sender2.try_enqueue(create_test_message()).unwrap();

		assert_eq!(receiver.len(), 2);
		assert_eq!(receiver.drain().len(), 2);
		assert!(receiver.is_empty());
	}
}
