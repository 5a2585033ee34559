// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A single sweep pass over label-selected namespaces.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use preview_sweeper_k8s::{ClusterStore, EventType, K8sError, NamespaceSnapshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SweepPolicy;
use crate::metrics::{DeletionOutcome, SweepMetrics};
use crate::ttl::{format_ttl, resolve_ttl, TtlResolution};

/// Label that opts a namespace into sweeping.
pub const ENABLED_LABEL: &str = "preview-sweeper.maxsauce.com/enabled";
/// Annotation that keeps a namespace regardless of age.
pub const HOLD_ANNOTATION: &str = "preview-sweeper.maxsauce.com/hold";
/// Only namespaces with this name prefix are ever swept.
pub const NAMESPACE_PREFIX: &str = "preview-";
/// Namespaces that are never swept, whatever their labels say.
pub const PROTECTED_NAMESPACES: [&str; 3] = ["kube-system", "kube-public", "default"];

const EVENT_REASON_DELETED: &str = "NamespaceCleanup";
const EVENT_REASON_DRY_RUN: &str = "NamespaceCleanupDryRun";

/// Counts for one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassResult {
	/// Namespaces returned by the label-selected list
	pub scanned: u64,
	/// Scanned namespaces that survived the name and terminating checks
	pub candidates: u64,
	/// Candidates past their TTL and not on hold
	pub expired: u64,
	/// Expired namespaces deleted (or, in dry-run, that would have been)
	pub deleted: u64,
	/// The pass was aborted because listing failed
	pub list_failed: bool,
	pub duration: Duration,
}

/// Why a scanned namespace never became a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
	Terminating,
	Protected,
	NamePrefix,
}

/// Verdict for one namespace in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
	Excluded(Exclusion),
	Held,
	TtlDisabled(TtlResolution),
	NotYetExpired {
		age: chrono::Duration,
		ttl: TtlResolution,
	},
	Expired {
		age: chrono::Duration,
		ttl: TtlResolution,
	},
}

impl Decision {
	pub fn is_candidate(&self) -> bool {
		!matches!(self, Decision::Excluded(_))
	}
}

/// Runs sweep passes against a cluster store.
pub struct Sweeper {
	store: Arc<dyn ClusterStore>,
	policy: SweepPolicy,
	default_ttl: chrono::Duration,
	metrics: Arc<SweepMetrics>,
}

impl Sweeper {
	pub fn new(
		store: Arc<dyn ClusterStore>,
		policy: SweepPolicy,
		metrics: Arc<SweepMetrics>,
	) -> Self {
		let default_ttl = chrono::Duration::from_std(policy.effective_default_ttl())
			.unwrap_or(chrono::Duration::MAX);
		Self {
			store,
			policy,
			default_ttl,
			metrics,
		}
	}

	pub fn policy(&self) -> &SweepPolicy {
		&self.policy
	}

	pub fn metrics(&self) -> &Arc<SweepMetrics> {
		&self.metrics
	}

	/// Decide what to do with one namespace at `now`.
	///
	/// Exclusions are checked in a fixed order and the first match wins.
	pub fn evaluate(&self, ns: &NamespaceSnapshot, now: DateTime<Utc>) -> Decision {
		if ns.deleting {
			return Decision::Excluded(Exclusion::Terminating);
		}
		if PROTECTED_NAMESPACES.contains(&ns.name.as_str()) {
			return Decision::Excluded(Exclusion::Protected);
		}
		if !ns.name.starts_with(NAMESPACE_PREFIX) {
			return Decision::Excluded(Exclusion::NamePrefix);
		}

		let ttl = resolve_ttl(&ns.annotations, self.default_ttl);
		if ns.annotations.get(HOLD_ANNOTATION).map(String::as_str) == Some("true") {
			return Decision::Held;
		}
		if !ttl.expires() {
			return Decision::TtlDisabled(ttl);
		}

		let age = now.signed_duration_since(ns.created_at);
		if age > ttl.ttl {
			Decision::Expired { age, ttl }
		} else {
			Decision::NotYetExpired { age, ttl }
		}
	}

	/// Run one pass using the current wall-clock time.
	pub async fn sweep_once(&self, cancel: &CancellationToken) -> PassResult {
		self.sweep_at(Utc::now(), cancel).await
	}

	/// Run one pass, judging ages against `now`.
	///
	/// Store calls are raced against `cancel` so shutdown is never stuck
	/// behind a hung API request. The decision loop itself always runs over
	/// the whole fetched list.
	pub async fn sweep_at(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> PassResult {
		let started = Instant::now();
		let mut result = PassResult::default();
		let selector = format!("{ENABLED_LABEL}=true");

		tracing::info!(dry_run = self.policy.dry_run, "Starting namespace sweep");

		let namespaces = match cancellable(cancel, self.store.list_namespaces(&selector)).await {
			Ok(namespaces) => namespaces,
			Err(K8sError::Cancelled) => {
				tracing::info!("Namespace sweep interrupted by shutdown");
				return self.finish(result, started);
			}
			Err(e) => {
				tracing::error!(selector = %selector, error = %e, "Failed to list namespaces");
				self.metrics.record_list_error();
				result.list_failed = true;
				return self.finish(result, started);
			}
		};

		result.scanned = namespaces.len() as u64;

		for ns in &namespaces {
			let decision = self.evaluate(ns, now);
			if decision.is_candidate() {
				result.candidates += 1;
			}

			match decision {
				Decision::Excluded(reason) => {
					tracing::debug!(
						namespace = %ns.name,
						reason = ?reason,
						"Namespace excluded from sweep"
					);
				}
				Decision::Held => {
					tracing::info!(namespace = %ns.name, "Namespace on hold, skipping");
				}
				Decision::TtlDisabled(ttl) => {
					tracing::info!(
						namespace = %ns.name,
						ttl = %format_ttl(ttl.ttl),
						ttl_source = %ttl.source,
						"Namespace TTL is not positive, expiry disabled"
					);
				}
				Decision::NotYetExpired { age, ttl } => {
					tracing::debug!(
						namespace = %ns.name,
						age = %format_ttl(age),
						ttl = %format_ttl(ttl.ttl),
						ttl_source = %ttl.source,
						"Namespace not yet expired"
					);
				}
				Decision::Expired { age, ttl } => {
					result.expired += 1;
					if self.expire(ns, age, ttl, cancel).await {
						result.deleted += 1;
					}
				}
			}
		}

		self.finish(result, started)
	}

	/// Delete (or simulate deleting) one expired namespace.
	///
	/// Returns whether it counts towards the pass's deleted total.
	async fn expire(
		&self,
		ns: &NamespaceSnapshot,
		age: chrono::Duration,
		ttl: TtlResolution,
		cancel: &CancellationToken,
	) -> bool {
		let ttl_text = format_ttl(ttl.ttl);

		if self.policy.dry_run {
			tracing::info!(
				namespace = %ns.name,
				age = %format_ttl(age),
				ttl = %ttl_text,
				ttl_source = %ttl.source,
				"Dry run: would delete expired namespace"
			);
			self.metrics.record_deletion(DeletionOutcome::DryRun);
			let message = format!(
				"Dry run: would delete namespace {:?}, older than {ttl_text}",
				ns.name
			);
			self
				.notify(&ns.name, EVENT_REASON_DRY_RUN, &message, cancel)
				.await;
			return true;
		}

		tracing::info!(
			namespace = %ns.name,
			age = %format_ttl(age),
			ttl = %ttl_text,
			ttl_source = %ttl.source,
			"Deleting expired namespace"
		);

		match cancellable(cancel, self.store.delete_namespace(&ns.name)).await {
			Ok(()) => {
				self.metrics.record_deletion(DeletionOutcome::Deleted);
				let message = format!("Deleted namespace {:?}, older than {ttl_text}", ns.name);
				self
					.notify(&ns.name, EVENT_REASON_DELETED, &message, cancel)
					.await;
				true
			}
			Err(e) if e.is_not_found() => {
				tracing::debug!(
					namespace = %ns.name,
					outcome = "not_found",
					"Namespace already deleted"
				);
				false
			}
			Err(e) => {
				self.metrics.record_deletion(DeletionOutcome::Error);
				tracing::error!(
					namespace = %ns.name,
					outcome = DeletionOutcome::Error.as_label(),
					error = %e,
					"Failed to delete namespace"
				);
				false
			}
		}
	}

	async fn notify(
		&self,
		namespace: &str,
		reason: &str,
		message: &str,
		cancel: &CancellationToken,
	) {
		tokio::select! {
			_ = cancel.cancelled() => {}
			_ = self.store.emit_event(namespace, EventType::Normal, reason, message) => {}
		}
	}

	fn finish(&self, mut result: PassResult, started: Instant) -> PassResult {
		result.duration = started.elapsed();
		self.metrics.record_pass(&result);

		tracing::info!(
			scanned = result.scanned,
			candidates = result.candidates,
			expired = result.expired,
			deleted = result.deleted,
			list_failed = result.list_failed,
			dry_run = self.policy.dry_run,
			duration_ms = result.duration.as_millis() as u64,
			"Namespace sweep completed"
		);
		result
	}
}

/// Await a store call unless the process is shutting down first.
async fn cancellable<T>(
	cancel: &CancellationToken,
	call: impl Future<Output = Result<T, K8sError>>,
) -> Result<T, K8sError> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(K8sError::Cancelled),
		res = call => res,
	}
}
