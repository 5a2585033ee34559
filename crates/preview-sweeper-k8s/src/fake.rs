// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory cluster store for exercising the sweeper without a cluster.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::ClusterStore;
use crate::error::K8sError;
use crate::types::{EventType, NamespaceSnapshot};

/// An event recorded by [`FakeClusterStore::emit_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
	pub namespace: String,
	pub event_type: EventType,
	pub reason: String,
	pub message: String,
}

#[derive(Debug, Default)]
struct FakeState {
	namespaces: BTreeMap<String, NamespaceSnapshot>,
	list_error: Option<String>,
	delete_errors: BTreeMap<String, String>,
	vanished: BTreeSet<String>,
	hang_list: bool,
	hang_deletes: BTreeSet<String>,
	list_calls: usize,
	delete_calls: Vec<String>,
	events: Vec<RecordedEvent>,
}

/// A fake store that can be used for testing sweep behaviour.
///
/// Deleting a namespace marks it as terminating rather than removing it,
/// which mirrors what the API server does while finalizers run.
#[derive(Debug, Clone, Default)]
pub struct FakeClusterStore {
	state: Arc<Mutex<FakeState>>,
}

impl FakeClusterStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace a namespace.
	pub fn insert(&self, namespace: NamespaceSnapshot) {
		let mut state = self.state.lock().unwrap();
		state.namespaces.insert(namespace.name.clone(), namespace);
	}

	/// Remove an annotation from a stored namespace, as `kubectl annotate key-` would.
	pub fn remove_annotation(&self, name: &str, key: &str) {
		let mut state = self.state.lock().unwrap();
		if let Some(ns) = state.namespaces.get_mut(name) {
			ns.annotations.remove(key);
		}
	}

	/// Make every subsequent list call fail with `message`.
	pub fn fail_list(&self, message: impl Into<String>) {
		self.state.lock().unwrap().list_error = Some(message.into());
	}

	/// Make deletes of `name` fail with `message`.
	pub fn fail_delete(&self, name: impl Into<String>, message: impl Into<String>) {
		self
			.state
			.lock()
			.unwrap()
			.delete_errors
			.insert(name.into(), message.into());
	}

	/// Make deletes of `name` report not-found, as if another client
	/// removed it between the list and the delete.
	pub fn vanish_on_delete(&self, name: impl Into<String>) {
		self.state.lock().unwrap().vanished.insert(name.into());
	}

	/// Make every subsequent list call hang forever.
	pub fn hang_list(&self) {
		self.state.lock().unwrap().hang_list = true;
	}

	/// Make deletes of `name` hang forever.
	pub fn hang_delete(&self, name: impl Into<String>) {
		self.state.lock().unwrap().hang_deletes.insert(name.into());
	}

	pub fn get(&self, name: &str) -> Option<NamespaceSnapshot> {
		self.state.lock().unwrap().namespaces.get(name).cloned()
	}

	pub fn list_calls(&self) -> usize {
		self.state.lock().unwrap().list_calls
	}

	/// Names passed to `delete_namespace`, in call order.
	pub fn delete_calls(&self) -> Vec<String> {
		self.state.lock().unwrap().delete_calls.clone()
	}

	pub fn events(&self) -> Vec<RecordedEvent> {
		self.state.lock().unwrap().events.clone()
	}
}

/// Parse an exact-match `key=value[,key=value]` selector.
fn matches_selector(selector: &str, ns: &NamespaceSnapshot) -> bool {
	selector
		.split(',')
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.all(|term| match term.split_once('=') {
			Some((key, value)) => {
				ns.labels.get(key.trim()).map(String::as_str) == Some(value.trim())
			}
			None => ns.labels.contains_key(term),
		})
}

#[async_trait]
impl ClusterStore for FakeClusterStore {
	async fn list_namespaces(
		&self,
		label_selector: &str,
	) -> Result<Vec<NamespaceSnapshot>, K8sError> {
		{
			let mut state = self.state.lock().unwrap();
			state.list_calls += 1;
			if let Some(message) = &state.list_error {
				return Err(K8sError::ApiError {
					message: message.clone(),
				});
			}
			if !state.hang_list {
				return Ok(
					state
						.namespaces
						.values()
						.filter(|ns| matches_selector(label_selector, ns))
						.cloned()
						.collect(),
				);
			}
		}
		std::future::pending().await
	}

	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		let hang = {
			let mut state = self.state.lock().unwrap();
			state.delete_calls.push(name.to_string());
			if let Some(message) = state.delete_errors.get(name) {
				return Err(K8sError::ApiError {
					message: message.clone(),
				});
			}
			state.hang_deletes.contains(name)
		};
		if hang {
			return std::future::pending().await;
		}

		let mut state = self.state.lock().unwrap();
		if state.vanished.contains(name) {
			return Err(K8sError::NamespaceNotFound { name: name.into() });
		}
		match state.namespaces.get_mut(name) {
			Some(ns) => {
				ns.deleting = true;
				Ok(())
			}
			None => Err(K8sError::NamespaceNotFound { name: name.into() }),
		}
	}

	async fn emit_event(
		&self,
		namespace: &str,
		event_type: EventType,
		reason: &str,
		message: &str,
	) {
		self.state.lock().unwrap().events.push(RecordedEvent {
			namespace: namespace.to_string(),
			event_type,
			reason: reason.to_string(),
			message: message.to_string(),
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	#[tokio::test]
	async fn list_filters_by_exact_label_value() {
		let store = FakeClusterStore::new();
		store.insert(
			NamespaceSnapshot::new("preview-a", Utc::now()).with_label("enabled", "true"),
		);
		store.insert(
			NamespaceSnapshot::new("preview-b", Utc::now()).with_label("enabled", "false"),
		);
		store.insert(NamespaceSnapshot::new("prod-stable", Utc::now()));

		let listed = store.list_namespaces("enabled=true").await.unwrap();
		let names: Vec<_> = listed.iter().map(|ns| ns.name.as_str()).collect();
		assert_eq!(names, vec!["preview-a"]);
		assert_eq!(store.list_calls(), 1);
	}

	#[tokio::test]
	async fn delete_marks_namespace_terminating() {
		let store = FakeClusterStore::new();
		store.insert(NamespaceSnapshot::new("preview-a", Utc::now()));

		store.delete_namespace("preview-a").await.unwrap();
		assert!(store.get("preview-a").unwrap().deleting);
		assert_eq!(store.delete_calls(), vec!["preview-a".to_string()]);
	}

	#[tokio::test]
	async fn delete_of_unknown_namespace_is_not_found() {
		let store = FakeClusterStore::new();
		let err = store.delete_namespace("preview-missing").await.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn configured_failures_are_returned() {
		let store = FakeClusterStore::new();
		store.insert(NamespaceSnapshot::new("preview-a", Utc::now()));
		store.fail_delete("preview-a", "forbidden");
		store.fail_list("connection refused");

		assert!(store.list_namespaces("enabled=true").await.is_err());
		assert!(matches!(
			store.delete_namespace("preview-a").await,
			Err(K8sError::ApiError { .. })
		));
		assert!(!store.get("preview-a").unwrap().deleting);
	}

	#[tokio::test]
	async fn vanished_namespace_delete_is_not_found() {
		let store = FakeClusterStore::new();
		store.insert(NamespaceSnapshot::new("preview-a", Utc::now()));
		store.vanish_on_delete("preview-a");

		let err = store.delete_namespace("preview-a").await.unwrap_err();
		assert!(err.is_not_found());
		assert_eq!(store.delete_calls(), vec!["preview-a".to_string()]);
	}

	#[tokio::test(start_paused = true)]
	async fn hung_calls_never_complete() {
		let store = FakeClusterStore::new();
		store.insert(NamespaceSnapshot::new("preview-a", Utc::now()));
		store.hang_list();
		store.hang_delete("preview-a");

		let list = tokio::time::timeout(
			std::time::Duration::from_secs(60),
			store.list_namespaces(""),
		)
		.await;
		let delete = tokio::time::timeout(
			std::time::Duration::from_secs(60),
			store.delete_namespace("preview-a"),
		)
		.await;

		assert!(list.is_err());
		assert!(delete.is_err());
		assert_eq!(store.list_calls(), 1);
		assert!(!store.get("preview-a").unwrap().deleting);
	}
}
