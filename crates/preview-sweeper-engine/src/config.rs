// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sweep policy configuration.

use std::time::Duration;

/// Interval used when the configured one is zero.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// TTL used when the configured one is zero.
pub const DEFAULT_TTL: Duration = Duration::from_secs(72 * 60 * 60);
/// Steady-state jitter fraction when none is configured.
pub const DEFAULT_JITTER: f64 = 0.1;

/// Process-wide sweep policy. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPolicy {
	/// TTL for namespaces without a TTL annotation
	pub default_ttl: Duration,
	/// Base delay between sweep passes
	pub interval: Duration,
	/// Fraction of `interval` used as jitter window; 0 disables jitter
	pub jitter: f64,
	/// Log and record would-be deletions without deleting
	pub dry_run: bool,
}

impl Default for SweepPolicy {
	fn default() -> Self {
		Self {
			default_ttl: DEFAULT_TTL,
			interval: DEFAULT_SWEEP_INTERVAL,
			jitter: DEFAULT_JITTER,
			dry_run: false,
		}
	}
}

impl SweepPolicy {
	/// Default TTL with the zero-value fallback applied.
	pub fn effective_default_ttl(&self) -> Duration {
		if self.default_ttl.is_zero() {
			DEFAULT_TTL
		} else {
			self.default_ttl
		}
	}

	/// Sweep interval with the zero-value fallback applied.
	pub fn effective_interval(&self) -> Duration {
		if self.interval.is_zero() {
			DEFAULT_SWEEP_INTERVAL
		} else {
			self.interval
		}
	}
}
