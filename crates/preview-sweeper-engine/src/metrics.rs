// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Prometheus metrics for sweep passes.

use prometheus::{
	Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

use crate::sweep::PassResult;

/// Result of acting on one expired namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
	Deleted,
	DryRun,
	Error,
}

impl DeletionOutcome {
	pub fn as_label(&self) -> &'static str {
		match self {
			DeletionOutcome::Deleted => "deleted",
			DeletionOutcome::DryRun => "dry_run",
			DeletionOutcome::Error => "error",
		}
	}
}

/// Sweep metrics, owned by one registry per process.
///
/// Gauges describe the most recent pass only and are overwritten each pass.
pub struct SweepMetrics {
	registry: Registry,

	pub passes_total: Counter,
	pub pass_duration: Histogram,
	pub list_errors_total: Counter,

	pub namespaces_scanned: Gauge,
	pub namespaces_candidates: Gauge,
	pub namespaces_expired: Gauge,
	pub namespaces_deleted: Gauge,

	pub deletions_total: CounterVec,
}

impl Default for SweepMetrics {
	fn default() -> Self {
		Self::new()
	}
}

impl SweepMetrics {
	pub fn new() -> Self {
		let registry = Registry::new();

		let passes_total = Counter::new(
			"preview_sweeper_passes_total",
			"Total sweep passes executed",
		)
		.expect("valid passes_total descriptor");
		registry
			.register(Box::new(passes_total.clone()))
			.expect("register passes_total");

		let pass_duration = Histogram::with_opts(
			HistogramOpts::new(
				"preview_sweeper_pass_duration_seconds",
				"Wall-clock duration of a sweep pass",
			)
			.buckets(vec![
				0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
			]),
		)
		.expect("valid pass_duration descriptor");
		registry
			.register(Box::new(pass_duration.clone()))
			.expect("register pass_duration");

		let list_errors_total = Counter::new(
			"preview_sweeper_list_errors_total",
			"Sweep passes aborted because namespaces could not be listed",
		)
		.expect("valid list_errors_total descriptor");
		registry
			.register(Box::new(list_errors_total.clone()))
			.expect("register list_errors_total");

		let namespaces_scanned = Gauge::new(
			"preview_sweeper_namespaces_scanned",
			"Label-selected namespaces seen by the last pass",
		)
		.expect("valid namespaces_scanned descriptor");
		registry
			.register(Box::new(namespaces_scanned.clone()))
			.expect("register namespaces_scanned");

		let namespaces_candidates = Gauge::new(
			"preview_sweeper_namespaces_candidates",
			"Namespaces eligible for expiry in the last pass",
		)
		.expect("valid namespaces_candidates descriptor");
		registry
			.register(Box::new(namespaces_candidates.clone()))
			.expect("register namespaces_candidates");

		let namespaces_expired = Gauge::new(
			"preview_sweeper_namespaces_expired",
			"Namespaces past their TTL and not on hold in the last pass",
		)
		.expect("valid namespaces_expired descriptor");
		registry
			.register(Box::new(namespaces_expired.clone()))
			.expect("register namespaces_expired");

		let namespaces_deleted = Gauge::new(
			"preview_sweeper_namespaces_deleted",
			"Namespaces deleted (or would-be deleted in dry-run) by the last pass",
		)
		.expect("valid namespaces_deleted descriptor");
		registry
			.register(Box::new(namespaces_deleted.clone()))
			.expect("register namespaces_deleted");

		let deletions_total = CounterVec::new(
			Opts::new(
				"preview_sweeper_deletions_total",
				"Outcomes of acting on expired namespaces",
			),
			&["result"],
		)
		.expect("valid deletions_total descriptor");
		registry
			.register(Box::new(deletions_total.clone()))
			.expect("register deletions_total");

		Self {
			registry,
			passes_total,
			pass_duration,
			list_errors_total,
			namespaces_scanned,
			namespaces_candidates,
			namespaces_expired,
			namespaces_deleted,
			deletions_total,
		}
	}

	/// Publish the counts and duration of a finished pass.
	pub fn record_pass(&self, result: &PassResult) {
		self.passes_total.inc();
		self.pass_duration.observe(result.duration.as_secs_f64());
		self.namespaces_scanned.set(result.scanned as f64);
		self.namespaces_candidates.set(result.candidates as f64);
		self.namespaces_expired.set(result.expired as f64);
		self.namespaces_deleted.set(result.deleted as f64);
	}

	pub fn record_list_error(&self) {
		self.list_errors_total.inc();
	}

	pub fn record_deletion(&self, outcome: DeletionOutcome) {
		self
			.deletions_total
			.with_label_values(&[outcome.as_label()])
			.inc();
	}

	/// Current value of the outcome counter for `outcome`.
	pub fn deletions(&self, outcome: DeletionOutcome) -> f64 {
		self
			.deletions_total
			.with_label_values(&[outcome.as_label()])
			.get()
	}

	/// Render all metrics in the Prometheus text exposition format.
	pub fn encode(&self) -> Result<String, prometheus::Error> {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		let mut buffer = Vec::new();
		encoder.encode(&metric_families, &mut buffer)?;
		Ok(String::from_utf8_lossy(&buffer).into_owned())
	}
}
