// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use preview_sweeper_k8s::LeaderLock;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a held leadership term ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipEnd {
	/// Shutdown was requested and the lease was handed back.
	Released,
	/// The lease could not be renewed in time or was taken by another replica.
	Lost,
}

pub struct LeaderElector {
	lock: Arc<dyn LeaderLock>,
	retry_period: Duration,
	renew_deadline: Duration,
}

impl LeaderElector {
	pub fn new(lock: Arc<dyn LeaderLock>) -> Self {
		let lease = lock.lease_duration();
		Self {
			lock,
			retry_period: lease / 3,
			renew_deadline: lease * 2 / 3,
		}
	}

	pub fn identity(&self) -> &str {
		self.lock.identity()
	}

	/// Block until the lease is held. Returns `false` if cancelled first.
	pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
		info!(identity = %self.identity(), "Waiting for leader lease");

		loop {
			match self.lock.try_acquire_or_renew().await {
				Ok(true) => {
					info!(identity = %self.identity(), "Became leader");
					return true;
				}
				Ok(false) => debug!("Leader lease held elsewhere"),
				Err(e) => warn!(error = %e, "Failed to acquire leader lease"),
			}

			tokio::select! {
				_ = cancel.cancelled() => return false,
				_ = sleep(self.retry_period) => {}
			}
		}
	}

	/// Keep renewing the lease until `cancel` fires or leadership is lost.
	///
	/// Losing leadership cancels `cancel` so every task sharing the token
	/// stops before another replica starts deleting.
	pub async fn hold(&self, cancel: CancellationToken) -> LeadershipEnd {
		let mut last_renewed = Instant::now();

		loop {
			tokio::select! {
				_ = cancel.cancelled() => {
					if let Err(e) = self.lock.release().await {
						warn!(error = %e, "Failed to release leader lease");
					}
					return LeadershipEnd::Released;
				}
				_ = sleep(self.retry_period) => {}
			}

			let remaining = self.renew_deadline.saturating_sub(last_renewed.elapsed());
			match timeout(remaining, self.lock.try_acquire_or_renew()).await {
				Ok(Ok(true)) => {
					last_renewed = Instant::now();
					debug!("Renewed leader lease");
				}
				Ok(Ok(false)) => {
					error!(identity = %self.identity(), "Leader lease taken by another replica");
					cancel.cancel();
					return LeadershipEnd::Lost;
				}
				Ok(Err(e)) => warn!(error = %e, "Failed to renew leader lease"),
				Err(_) => warn!("Timed out renewing leader lease"),
			}

			if last_renewed.elapsed() >= self.renew_deadline {
				error!(
					identity = %self.identity(),
					renew_deadline = %humantime::format_duration(self.renew_deadline),
					"Leader lease not renewed within deadline"
				);
				cancel.cancel();
				return LeadershipEnd::Lost;
			}
		}
	}
}

/// Unique holder identity: the pod (or host) name with a random suffix, so
/// a restarted container never mistakes its predecessor's lease for its own.
pub fn leader_identity(host: Option<String>) -> String {
	let host = host
		.filter(|h| !h.trim().is_empty())
		.unwrap_or_else(|| "preview-sweeper".to_string());
	let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
		.take(8)
		.collect();
	format!("{host}_{suffix}")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use std::sync::Mutex;

	use async_trait::async_trait;
	use preview_sweeper_k8s::K8sError;

	struct FakeLock {
		responses: Mutex<VecDeque<Result<bool, K8sError>>>,
		fallback: fn() -> Result<bool, K8sError>,
		calls: AtomicUsize,
		released: AtomicBool,
	}

	impl FakeLock {
		fn new(
			responses: Vec<Result<bool, K8sError>>,
			fallback: fn() -> Result<bool, K8sError>,
		) -> Arc<Self> {
			Arc::new(Self {
				responses: Mutex::new(responses.into()),
				fallback,
				calls: AtomicUsize::new(0),
				released: AtomicBool::new(false),
			})
		}
	}

	#[async_trait]
	impl LeaderLock for FakeLock {
		fn identity(&self) -> &str {
			"test_abc"
		}

		fn lease_duration(&self) -> Duration {
			Duration::from_secs(15)
		}

		async fn try_acquire_or_renew(&self) -> Result<bool, K8sError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			let next = self.responses.lock().unwrap().pop_front();
			next.unwrap_or_else(self.fallback)
		}

		async fn release(&self) -> Result<(), K8sError> {
			self.released.store(true, Ordering::SeqCst);
			Ok(())
		}
	}

	fn api_error() -> Result<bool, K8sError> {
		Err(K8sError::ApiError {
			message: "connection refused".into(),
		})
	}

	#[tokio::test(start_paused = true)]
	async fn test_acquire_retries_until_held() {
		let lock = FakeLock::new(vec![Ok(false), api_error()], || Ok(true));
		let elector = LeaderElector::new(lock.clone());

		assert!(elector.acquire(&CancellationToken::new()).await);
		assert_eq!(lock.calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_acquire_gives_up_on_cancel() {
		let lock = FakeLock::new(vec![], || Ok(false));
		let elector = LeaderElector::new(lock);
		let cancel = CancellationToken::new();
		cancel.cancel();

		assert!(!elector.acquire(&cancel).await);
	}

	#[tokio::test(start_paused = true)]
	async fn test_hold_releases_on_shutdown() {
		let lock = FakeLock::new(vec![], || Ok(true));
		let elector = LeaderElector::new(lock.clone());
		let cancel = CancellationToken::new();

		let handle = tokio::spawn({
			let cancel = cancel.clone();
			async move { elector.hold(cancel).await }
		});
		sleep(Duration::from_secs(12)).await;
		cancel.cancel();

		assert_eq!(handle.await.unwrap(), LeadershipEnd::Released);
		assert!(lock.released.load(Ordering::SeqCst));
		assert!(lock.calls.load(Ordering::SeqCst) >= 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_hold_lost_when_taken_over() {
		let lock = FakeLock::new(vec![Ok(true)], || Ok(false));
		let elector = LeaderElector::new(lock.clone());
		let cancel = CancellationToken::new();

		assert_eq!(elector.hold(cancel.clone()).await, LeadershipEnd::Lost);
		assert!(cancel.is_cancelled());
		assert!(!lock.released.load(Ordering::SeqCst));
	}

	#[tokio::test(start_paused = true)]
	async fn test_hold_lost_after_renew_deadline() {
		let lock = FakeLock::new(vec![], api_error);
		let elector = LeaderElector::new(lock.clone());
		let cancel = CancellationToken::new();
		let started = Instant::now();

		assert_eq!(elector.hold(cancel.clone()).await, LeadershipEnd::Lost);
		assert!(cancel.is_cancelled());
		assert!(started.elapsed() >= Duration::from_secs(10));
		assert!(started.elapsed() < Duration::from_secs(15));
	}

	#[test]
	fn test_leader_identity_uses_host_and_suffix() {
		let id = leader_identity(Some("sweeper-7d9f".into()));
		let (host, suffix) = id.rsplit_once('_').unwrap();
		assert_eq!(host, "sweeper-7d9f");
		assert_eq!(suffix.len(), 8);
		assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn test_leader_identity_fallback_and_uniqueness() {
		let a = leader_identity(None);
		let b = leader_identity(Some("  ".into()));
		assert!(a.starts_with("preview-sweeper_"));
		assert!(b.starts_with("preview-sweeper_"));
		assert_ne!(a, b);
	}
}
