// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{EventType, NamespaceSnapshot};

/// Cluster operations needed by the namespace sweeper.
///
/// This abstraction allows for easy mocking in tests while keeping the
/// sweep engine free of any direct dependency on the kube client.
#[async_trait]
pub trait ClusterStore: Send + Sync {
	/// List namespaces matching an exact-match label selector (`key=value`).
	async fn list_namespaces(&self, label_selector: &str)
		-> Result<Vec<NamespaceSnapshot>, K8sError>;

	/// Request deletion of a namespace.
	///
	/// Calling this on a namespace that is already terminating is harmless.
	/// A namespace that no longer exists yields [`K8sError::NamespaceNotFound`].
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError>;

	/// Record a Kubernetes event against a namespace.
	///
	/// Best-effort: implementations log failures and never surface them.
	async fn emit_event(&self, namespace: &str, event_type: EventType, reason: &str, message: &str);
}
