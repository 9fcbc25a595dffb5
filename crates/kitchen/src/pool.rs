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

use std::{
	panic::{self, AssertUnwindSafe},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::POOL_QUEUE_FACTOR;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Error types for pooled tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
	#[error("Task panicked or was dropped before completing")]
	TaskLost,
}

/// Bounded worker pool with caller-runs saturation
///
/// Jobs go through a bounded channel to a set of worker threads. Workers
/// are spawned lazily, one whenever queued jobs outnumber idle workers, up
/// to `max_threads`. When the job channel is full the job runs on the
/// submitting thread instead, which throttles the producer rather than
/// dropping work.
///
/// A panicking job is caught and logged; its handle reports
/// `PoolError::TaskLost` and the worker keeps serving.
pub struct WorkerPool {
	name: String,
	sender: Option<Sender<Job>>,
	receiver: Receiver<Job>,
	max_threads: usize,
	workers: Vec<JoinHandle<()>>,
	idle: Arc<AtomicUsize>,
	inline_runs: usize,
}

impl WorkerPool {
	pub fn new(name: impl Into<String>, max_threads: usize) -> Self {
		let max_threads = max_threads.max(1);
		let (sender, receiver) = bounded(max_threads * POOL_QUEUE_FACTOR);
		Self {
			name: name.into(),
			sender: Some(sender),
			receiver,
			max_threads,
			workers: Vec::new(),
			idle: Arc::new(AtomicUsize::new(0)),
			inline_runs: 0,
		}
	}

	/// Submit a job and get a handle to its result
	pub fn submit<F, T>(&mut self, task: F) -> TaskHandle<T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (result_tx, result_rx) = bounded(1);
		let job: Job = Box::new(move || {
			let _ = result_tx.send(task());
		});

		let Some(sender) = self.sender.as_ref() else {
			warn!(target: "pool", pool = %self.name, "Pool is shut down, running job inline");
			self.run_inline(job);
			return TaskHandle {
				receiver: result_rx,
			};
		};

		match sender.try_send(job) {
			Ok(()) => {
				if self.receiver.len() > self.idle.load(Ordering::Acquire) {
					self.grow();
				}
			}
			Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
				debug!(
					target: "pool",
					pool = %self.name,
					threads = self.workers.len(),
					"Pool saturated, running job on caller thread"
				);
				self.run_inline(job);
			}
		}

		TaskHandle {
			receiver: result_rx,
		}
	}

	fn grow(&mut self) {
		if self.workers.len() >= self.max_threads {
			return;
		}

		let receiver = self.receiver.clone();
		let idle = self.idle.clone();
		let pool_name = self.name.clone();
		let spawned = thread::Builder::new()
			.name(format!("{}-{}", self.name, self.workers.len() + 1))
			.spawn(move || {
				loop {
					idle.fetch_add(1, Ordering::AcqRel);
					let job = receiver.recv();
					idle.fetch_sub(1, Ordering::AcqRel);
					match job {
						Ok(job) => run_job(&pool_name, job),
						Err(_) => break,
					}
				}
			});

		match spawned {
			Ok(handle) => self.workers.push(handle),
			Err(e) => {
				warn!(target: "pool", pool = %self.name, error = %e, "Failed to spawn worker");
				if self.workers.is_empty() {
					// Nobody would ever pick up what is queued
					while let Ok(job) = self.receiver.try_recv() {
						self.run_inline(job);
					}
				}
			}
		}
	}

	fn run_inline(&mut self, job: Job) {
		self.inline_runs += 1;
		run_job(&self.name, job);
	}

	/// Worker threads spawned so far
	pub fn threads(&self) -> usize {
		self.workers.len()
	}

	/// Jobs that ran on the submitting thread
	pub fn inline_runs(&self) -> usize {
		self.inline_runs
	}

	/// Stop accepting jobs, let workers finish the queue, and join them
	pub fn shutdown(&mut self) {
		self.sender.take();
		for handle in self.workers.drain(..) {
			if let Err(e) = handle.join() {
				error!(target: "pool", pool = %self.name, error = ?e, "Worker thread panicked");
			}
		}
	}
}

impl Drop for WorkerPool {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn run_job(pool: &str, job: Job) {
	if let Err(e) = panic::catch_unwind(AssertUnwindSafe(job)) {
		let reason = e
			.downcast_ref::<&str>()
			.map(|s| s.to_string())
			.or_else(|| e.downcast_ref::<String>().cloned())
			.unwrap_or_else(|| "unknown panic".to_string());
		error!(target: "pool", pool = %pool, reason = %reason, "Pooled job panicked");
	}
}

/// Handle to the result of a pooled job
pub struct TaskHandle<T> {
	receiver: Receiver<T>,
}

impl<T> TaskHandle<T> {
	/// Block until the job finishes
	pub fn join(self) -> Result<T, PoolError> {
		self.receiver.recv().map_err(|_| PoolError::TaskLost)
	}

	/// Collect the result if the job has finished
	pub fn try_join(&self) -> Option<Result<T, PoolError>> {
		match self.receiver.try_recv() {
			Ok(value) => Some(Ok(value)),
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Disconnected) => Some(Err(PoolError::TaskLost)),
		}
	}
}

/// Outstanding tasks owned by one stage
pub struct TaskSet<T> {
	pending: Vec<TaskHandle<T>>,
}

impl<T> TaskSet<T> {
	pub fn new() -> Self {
		Self {
			pending: Vec::new(),
		}
	}

	pub fn push(&mut self, handle: TaskHandle<T>) {
		self.pending.push(handle);
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Collect results of finished tasks without blocking
	pub fn reap(&mut self) -> Vec<Result<T, PoolError>> {
		let mut finished = Vec::new();
		self.pending.retain(|handle| match handle.try_join() {
			Some(result) => {
				finished.push(result);
				false
			}
			None => true,
		});
		finished
	}

	/// Wait for every outstanding task
	pub fn join_all(&mut self) -> Vec<Result<T, PoolError>> {
		self.pending.drain(..).map(TaskHandle::join).collect()
	}
}

impl<T> Default for TaskSet<T> {
	fn default() -> Self {
		Self::new()
	}
}
