// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for the preview namespace sweeper.
//!
//! This crate provides:
//! - A trait-based cluster store abstraction for testability
//! - Production implementation using the kube crate
//! - An in-memory fake for tests
//! - Lease-based leader election

mod client;
mod error;
mod fake;
mod kube_client;
mod lease;
mod types;

pub use client::ClusterStore;
pub use error::{K8sError, K8sResult};
pub use fake::{FakeClusterStore, RecordedEvent};
pub use kube_client::KubeClient;
pub use lease::{LeaderLock, LeaseLock};
pub use types::{EventType, NamespaceSnapshot};
