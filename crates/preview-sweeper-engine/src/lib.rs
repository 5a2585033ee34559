// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sweep engine for ephemeral preview namespaces.
//!
//! Namespaces labelled `preview-sweeper.maxsauce.com/enabled=true` whose name
//! starts with `preview-` are deleted once they outlive their TTL.
//!
//! # Architecture
//!
//! The engine sits between process bootstrap (the `preview-sweeper` binary)
//! and the cluster store (`preview-sweeper-k8s`), implementing:
//!
//! - Per-namespace TTL resolution from annotations
//! - Hold overrides and dry-run mode
//! - A jittered, strictly sequential sweep loop
//! - Prometheus metrics for every pass

pub mod config;
pub mod jitter;
pub mod metrics;
pub mod scheduler;
pub mod sweep;
pub mod ttl;

pub use config::{SweepPolicy, DEFAULT_JITTER, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
pub use jitter::{jitter, INITIAL_JITTER};
pub use metrics::{DeletionOutcome, SweepMetrics};
pub use scheduler::Scheduler;
pub use sweep::{
	Decision, Exclusion, PassResult, Sweeper, ENABLED_LABEL, HOLD_ANNOTATION, NAMESPACE_PREFIX,
	PROTECTED_NAMESPACES,
};
pub use ttl::{resolve_ttl, TtlResolution, TtlSource, TTL_ANNOTATION};
