// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Leader election on top of a `coordination.k8s.io/v1` Lease.
//!
//! Only one replica holds the lease at a time. The holder renews it well
//! inside `lease_duration`; any other replica may take it over once the last
//! renewal is older than that. Writes go through `replace`, which carries the
//! observed `resourceVersion`, so two replicas racing for an expired lease
//! cannot both win: the loser gets a 409 and reports "not leader".

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::{
	api::{Api, PostParams},
	Client,
};
use tracing::{debug, info, instrument};

use crate::error::K8sError;

/// A lock that at most one replica holds at a time.
#[async_trait]
pub trait LeaderLock: Send + Sync {
	fn identity(&self) -> &str;

	/// How long a successful acquire or renew stays valid.
	fn lease_duration(&self) -> Duration;

	/// Acquire the lock, or renew it if this replica already holds it.
	///
	/// Returns `Ok(true)` when this replica is the holder after the call.
	async fn try_acquire_or_renew(&self) -> Result<bool, K8sError>;

	/// Give up the lock so another replica can take over without waiting
	/// for it to expire. A no-op when this replica is not the holder.
	async fn release(&self) -> Result<(), K8sError>;
}

/// A named Lease used as a mutual-exclusion lock across replicas.
pub struct LeaseLock {
	client: Client,
	namespace: String,
	name: String,
	identity: String,
	lease_duration: Duration,
}

impl LeaseLock {
	pub fn new(
		client: Client,
		namespace: impl Into<String>,
		name: impl Into<String>,
		identity: impl Into<String>,
		lease_duration: Duration,
	) -> Self {
		Self {
			client,
			namespace: namespace.into(),
			name: name.into(),
			identity: identity.into(),
			lease_duration,
		}
	}

	fn holder_spec(
		&self,
		acquired: DateTime<Utc>,
		renewed: DateTime<Utc>,
		transitions: i32,
	) -> LeaseSpec {
		LeaseSpec {
			holder_identity: Some(self.identity.clone()),
			lease_duration_seconds: Some(self.lease_duration.as_secs().min(i32::MAX as u64) as i32),
			acquire_time: Some(MicroTime(acquired)),
			renew_time: Some(MicroTime(renewed)),
			lease_transitions: Some(transitions),
			..Default::default()
		}
	}
}

#[async_trait]
impl LeaderLock for LeaseLock {
	fn identity(&self) -> &str {
		&self.identity
	}

	fn lease_duration(&self) -> Duration {
		self.lease_duration
	}

	#[instrument(skip(self), fields(lease = %self.name, identity = %self.identity))]
	async fn try_acquire_or_renew(&self) -> Result<bool, K8sError> {
		let leases: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
		let now = Utc::now();

		let Some(mut existing) = leases.get_opt(&self.name).await? else {
			let lease = Lease {
				metadata: ObjectMeta {
					name: Some(self.name.clone()),
					namespace: Some(self.namespace.clone()),
					..Default::default()
				},
				spec: Some(self.holder_spec(now, now, 0)),
			};
			return match leases.create(&PostParams::default(), &lease).await {
				Ok(_) => {
					info!("Created leader election lease");
					Ok(true)
				}
				Err(kube::Error::Api(err)) if err.code == 409 => Ok(false),
				Err(e) => Err(e.into()),
			};
		};

		let spec = existing.spec.clone().unwrap_or_default();
		if !can_acquire(&spec, &self.identity, now) {
			debug!(holder = ?spec.holder_identity, "Lease held by another replica");
			return Ok(false);
		}

		let held_by_us = spec.holder_identity.as_deref() == Some(self.identity.as_str());
		let (acquired, transitions) = if held_by_us {
			(
				spec.acquire_time.map(|t| t.0).unwrap_or(now),
				spec.lease_transitions.unwrap_or(0),
			)
		} else {
			(now, spec.lease_transitions.unwrap_or(0) + 1)
		};
		existing.spec = Some(self.holder_spec(acquired, now, transitions));

		match leases
			.replace(&self.name, &PostParams::default(), &existing)
			.await
		{
			Ok(_) => {
				if !held_by_us {
					info!(transitions, "Acquired leader election lease");
				}
				Ok(true)
			}
			Err(kube::Error::Api(err)) if err.code == 409 => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self), fields(lease = %self.name, identity = %self.identity))]
	async fn release(&self) -> Result<(), K8sError> {
		let leases: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
		let Some(mut existing) = leases.get_opt(&self.name).await? else {
			return Ok(());
		};

		let mut spec = existing.spec.clone().unwrap_or_default();
		if spec.holder_identity.as_deref() != Some(self.identity.as_str()) {
			return Ok(());
		}

		spec.holder_identity = None;
		spec.lease_duration_seconds = Some(1);
		spec.renew_time = Some(MicroTime(Utc::now()));
		existing.spec = Some(spec);

		leases
			.replace(&self.name, &PostParams::default(), &existing)
			.await?;
		info!("Released leader election lease");
		Ok(())
	}
}

/// Whether `identity` may write itself into the lease at `now`.
fn can_acquire(spec: &LeaseSpec, identity: &str, now: DateTime<Utc>) -> bool {
	let holder = match spec.holder_identity.as_deref() {
		None | Some("") => return true,
		Some(holder) => holder,
	};
	if holder == identity {
		return true;
	}

	let Some(last_renewed) = spec
		.renew_time
		.as_ref()
		.or(spec.acquire_time.as_ref())
		.map(|t| t.0)
	else {
		return true;
	};
	let duration = chrono::Duration::seconds(i64::from(spec.lease_duration_seconds.unwrap_or(0)));
	last_renewed + duration < now
}
