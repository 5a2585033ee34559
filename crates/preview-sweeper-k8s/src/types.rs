// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Namespace;

/// Point-in-time copy of the namespace fields the sweeper decides on.
///
/// Snapshots are produced fresh by every list call and are never written back;
/// the only mutation path is a delete request through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSnapshot {
	pub name: String,
	pub created_at: DateTime<Utc>,
	/// Set once the API server has accepted a delete (deletionTimestamp present).
	pub deleting: bool,
	pub labels: BTreeMap<String, String>,
	pub annotations: BTreeMap<String, String>,
}

impl NamespaceSnapshot {
	pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
		Self {
			name: name.into(),
			created_at,
			deleting: false,
			labels: BTreeMap::new(),
			annotations: BTreeMap::new(),
		}
	}

	pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.labels.insert(key.into(), value.into());
		self
	}

	pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.annotations.insert(key.into(), value.into());
		self
	}

	pub fn deleting(mut self) -> Self {
		self.deleting = true;
		self
	}
}

impl From<&Namespace> for NamespaceSnapshot {
	fn from(ns: &Namespace) -> Self {
		let metadata = &ns.metadata;
		Self {
			name: metadata.name.clone().unwrap_or_default(),
			// A namespace without a creation timestamp has not been persisted yet;
			// treat it as brand new so it can never look expired.
			created_at: metadata
				.creation_timestamp
				.as_ref()
				.map(|ts| ts.0)
				.unwrap_or_else(Utc::now),
			deleting: metadata.deletion_timestamp.is_some(),
			labels: metadata.labels.clone().unwrap_or_default(),
			annotations: metadata.annotations.clone().unwrap_or_default(),
		}
	}
}

/// Kubernetes event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
	Normal,
	Warning,
}

impl EventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventType::Normal => "Normal",
			EventType::Warning => "Warning",
		}
	}
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

	#[test]
	fn snapshot_copies_metadata() {
		let created = Utc::now() - chrono::Duration::hours(2);
		let ns = Namespace {
			metadata: ObjectMeta {
				name: Some("preview-abc".to_string()),
				creation_timestamp: Some(Time(created)),
				labels: Some(BTreeMap::from([(
					"preview-sweeper.maxsauce.com/enabled".to_string(),
					"true".to_string(),
				)])),
				annotations: Some(BTreeMap::from([(
					"preview-sweeper.maxsauce.com/ttl".to_string(),
					"4h".to_string(),
				)])),
				..Default::default()
			},
			..Default::default()
		};

		let snapshot = NamespaceSnapshot::from(&ns);
		assert_eq!(snapshot.name, "preview-abc");
		assert_eq!(snapshot.created_at, created);
		assert!(!snapshot.deleting);
		assert_eq!(
			snapshot.labels.get("preview-sweeper.maxsauce.com/enabled"),
			Some(&"true".to_string())
		);
		assert_eq!(
			snapshot.annotations.get("preview-sweeper.maxsauce.com/ttl"),
			Some(&"4h".to_string())
		);
	}

	#[test]
	fn snapshot_marks_terminating_namespace() {
		let ns = Namespace {
			metadata: ObjectMeta {
				name: Some("preview-gone".to_string()),
				creation_timestamp: Some(Time(Utc::now())),
				deletion_timestamp: Some(Time(Utc::now())),
				..Default::default()
			},
			..Default::default()
		};

		assert!(NamespaceSnapshot::from(&ns).deleting);
	}

	#[test]
	fn snapshot_defaults_missing_maps() {
		let ns = Namespace {
			metadata: ObjectMeta {
				name: Some("preview-bare".to_string()),
				..Default::default()
			},
			..Default::default()
		};

		let snapshot = NamespaceSnapshot::from(&ns);
		assert!(snapshot.labels.is_empty());
		assert!(snapshot.annotations.is_empty());
	}
}
