// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use preview_sweeper_engine::{SweepPolicy, DEFAULT_JITTER, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("invalid value for {name}: {message}")]
	InvalidValue { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
	Json,
	Text,
}

/// Deletes labelled preview namespaces once they outlive their TTL
#[derive(Parser, Debug, Clone)]
#[command(name = "preview-sweeper", version, about, long_about = None)]
pub struct Args {
	/// How often to sweep namespaces
	#[arg(
		long,
		env = "SWEEP_EVERY",
		default_value = "24h",
		value_parser = humantime::parse_duration
	)]
	pub sweep_every: Duration,

	/// Namespace TTL before deletion, unless overridden per namespace
	#[arg(long, env = "TTL", default_value = "72h", value_parser = humantime::parse_duration)]
	pub ttl: Duration,

	/// Fraction of the sweep interval to randomise each delay by
	#[arg(long, env = "SWEEP_JITTER", default_value_t = DEFAULT_JITTER)]
	pub jitter: f64,

	/// Log and record expired namespaces without deleting them
	#[arg(long, env = "DRY_RUN")]
	pub dry_run: bool,

	/// Address for the metrics endpoint; "0" disables it
	#[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0")]
	pub metrics_bind_address: String,

	/// Address for the health and readiness probes; "0" disables them
	#[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", default_value = ":8081")]
	pub health_probe_bind_address: String,

	/// Run the sweep loop only while holding the leader lease
	#[arg(long, env = "LEADER_ELECT")]
	pub leader_elect: bool,

	/// Name of the Lease used for leader election
	#[arg(long, default_value = "8a12db1b.maxsauce.com")]
	pub leader_election_id: String,

	/// Namespace holding the leader election Lease
	#[arg(long, env = "POD_NAMESPACE", default_value = "default")]
	pub leader_election_namespace: String,

	/// How long a leader lease is valid without renewal
	#[arg(long, default_value = "15s", value_parser = humantime::parse_duration)]
	pub leader_election_lease_duration: Duration,

	/// Log level used when RUST_LOG is unset
	#[arg(long, env = "LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	/// Log output format
	#[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
	pub log_format: LogFormat,
}

impl Args {
	/// Validate arguments and build the sweep policy, replacing zero
	/// durations with their defaults.
	pub fn sweep_policy(&self) -> Result<SweepPolicy> {
		if !(0.0..1.0).contains(&self.jitter) {
			return Err(ConfigError::InvalidValue {
				name: "jitter".into(),
				message: format!("must be in [0, 1), got {}", self.jitter),
			});
		}

		let mut default_ttl = self.ttl;
		if default_ttl.is_zero() {
			info!(
				default_ttl = %humantime::format_duration(DEFAULT_TTL),
				"TTL was zero, using default"
			);
			default_ttl = DEFAULT_TTL;
		}

		let mut interval = self.sweep_every;
		if interval.is_zero() {
			info!(
				default_interval = %humantime::format_duration(DEFAULT_SWEEP_INTERVAL),
				"Sweep interval was zero, using default"
			);
			interval = DEFAULT_SWEEP_INTERVAL;
		}

		Ok(SweepPolicy {
			default_ttl,
			interval,
			jitter: self.jitter,
			dry_run: self.dry_run,
		})
	}

	pub fn metrics_addr(&self) -> Result<Option<SocketAddr>> {
		parse_bind_address("metrics-bind-address", &self.metrics_bind_address)
	}

	pub fn probe_addr(&self) -> Result<Option<SocketAddr>> {
		parse_bind_address("health-probe-bind-address", &self.health_probe_bind_address)
	}

	pub fn lease_duration(&self) -> Result<Duration> {
		if self.leader_election_lease_duration < Duration::from_secs(3) {
			return Err(ConfigError::InvalidValue {
				name: "leader-election-lease-duration".into(),
				message: "must be at least 3s".into(),
			});
		}
		Ok(self.leader_election_lease_duration)
	}
}

/// Parse a bind address. `"0"` or an empty string disables the listener and
/// `":port"` binds every interface.
pub fn parse_bind_address(name: &str, raw: &str) -> Result<Option<SocketAddr>> {
	let raw = raw.trim();
	if raw.is_empty() || raw == "0" {
		return Ok(None);
	}

	let full = match raw.strip_prefix(':') {
		Some(port) => format!("0.0.0.0:{port}"),
		None => raw.to_string(),
	};

	full
		.parse::<SocketAddr>()
		.map(Some)
		.map_err(|e| ConfigError::InvalidValue {
			name: name.to_string(),
			message: format!("{raw:?}: {e}"),
		})
}
