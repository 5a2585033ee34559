// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background loop that runs sweep passes on a jittered cadence.

use std::sync::Arc;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::jitter::{jitter, INITIAL_JITTER};
use crate::sweep::Sweeper;

/// Drives a [`Sweeper`] until cancelled.
///
/// Passes never overlap: the next delay is armed only after a pass returns.
pub struct Scheduler {
	sweeper: Arc<Sweeper>,
}

impl Scheduler {
	pub fn new(sweeper: Arc<Sweeper>) -> Self {
		Self { sweeper }
	}

	/// Deleting namespaces is only safe from one replica at a time, so the
	/// loop must not start before this process holds the leader lease.
	pub fn requires_leadership(&self) -> bool {
		true
	}

	/// Run the sweep loop until `cancel` fires.
	pub async fn run(&self, cancel: CancellationToken) {
		let policy = self.sweeper.policy();
		let interval = policy.effective_interval();
		let initial_delay = jitter(interval, INITIAL_JITTER);

		info!(
			interval = %humantime::format_duration(interval),
			initial_delay = %humantime::format_duration(initial_delay),
			jitter = policy.jitter,
			dry_run = policy.dry_run,
			"Namespace sweeper started"
		);

		let timer = sleep(initial_delay);
		tokio::pin!(timer);

		loop {
			tokio::select! {
				_ = cancel.cancelled() => {
					info!("Namespace sweeper stopped");
					return;
				}
				_ = &mut timer => {
					self.sweeper.sweep_once(&cancel).await;

					let next = jitter(interval, policy.jitter);
					debug!(next_delay = %humantime::format_duration(next), "Next sweep scheduled");
					timer.as_mut().reset(Instant::now() + next);
				}
			}
		}
	}
}
