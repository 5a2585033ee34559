// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, EventSource, Namespace, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::{
	api::{Api, DeleteParams, ListParams, PostParams},
	Client,
};
use tracing::{debug, instrument, warn};

use crate::client::ClusterStore;
use crate::error::K8sError;
use crate::types::{EventType, NamespaceSnapshot};

/// Events about cluster-scoped objects are recorded in this namespace.
const EVENT_NAMESPACE: &str = "default";

/// Production cluster store backed by the kube crate.
#[derive(Clone)]
pub struct KubeClient {
	client: Client,
	component: String,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new(component: impl Into<String>) -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self::from_client(client, component))
	}

	pub fn from_client(client: Client, component: impl Into<String>) -> Self {
		Self {
			client,
			component: component.into(),
		}
	}

	/// Underlying kube client, shared with the leader election lock.
	pub fn client(&self) -> Client {
		self.client.clone()
	}
}

#[async_trait]
impl ClusterStore for KubeClient {
	#[instrument(skip(self))]
	async fn list_namespaces(
		&self,
		label_selector: &str,
	) -> Result<Vec<NamespaceSnapshot>, K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		let lp = ListParams::default().labels(label_selector);
		let list = namespaces.list(&lp).await?;
		Ok(list.items.iter().map(NamespaceSnapshot::from).collect())
	}

	#[instrument(skip(self))]
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		match namespaces.delete(name, &DeleteParams::default()).await {
			Ok(_) => Ok(()),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::NamespaceNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self, message))]
	async fn emit_event(
		&self,
		namespace: &str,
		event_type: EventType,
		reason: &str,
		message: &str,
	) {
		let now = Time(Utc::now());
		let event = Event {
			metadata: ObjectMeta {
				generate_name: Some(format!("{namespace}.")),
				namespace: Some(EVENT_NAMESPACE.to_string()),
				..Default::default()
			},
			involved_object: ObjectReference {
				api_version: Some("v1".to_string()),
				kind: Some("Namespace".to_string()),
				name: Some(namespace.to_string()),
				..Default::default()
			},
			reason: Some(reason.to_string()),
			message: Some(message.to_string()),
			type_: Some(event_type.as_str().to_string()),
			source: Some(EventSource {
				component: Some(self.component.clone()),
				host: None,
			}),
			reporting_component: Some(self.component.clone()),
			first_timestamp: Some(now.clone()),
			last_timestamp: Some(now),
			count: Some(1),
			..Default::default()
		};

		let events: Api<Event> = Api::namespaced(self.client.clone(), EVENT_NAMESPACE);
		if let Err(e) = events.create(&PostParams::default(), &event).await {
			warn!(namespace = %namespace, reason = %reason, error = %e, "Failed to record event");
		}
	}
}
