// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
	extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use preview_sweeper_engine::SweepMetrics;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
	Ok,
	Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResponse {
	pub status: ProbeStatus,
}

/// Liveness is implied by the process answering; readiness flips once the
/// cluster client has been constructed.
#[derive(Clone, Default)]
pub struct ProbeState {
	ready: Arc<AtomicBool>,
}

impl ProbeState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_ready(&self) {
		self.ready.store(true, Ordering::SeqCst);
	}

	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::SeqCst)
	}
}

async fn healthz_handler() -> impl IntoResponse {
	(
		StatusCode::OK,
		Json(ProbeResponse {
			status: ProbeStatus::Ok,
		}),
	)
}

async fn readyz_handler(State(state): State<ProbeState>) -> impl IntoResponse {
	if state.is_ready() {
		(
			StatusCode::OK,
			Json(ProbeResponse {
				status: ProbeStatus::Ok,
			}),
		)
	} else {
		(
			StatusCode::SERVICE_UNAVAILABLE,
			Json(ProbeResponse {
				status: ProbeStatus::Unavailable,
			}),
		)
	}
}

pub fn probe_router(state: ProbeState) -> Router {
	Router::new()
		.route("/healthz", get(healthz_handler))
		.route("/readyz", get(readyz_handler))
		.with_state(state)
}

async fn metrics_handler(State(metrics): State<Arc<SweepMetrics>>) -> impl IntoResponse {
	match metrics.encode() {
		Ok(body) => (StatusCode::OK, body),
		Err(e) => {
			warn!(error = %e, "Failed to encode metrics");
			(StatusCode::INTERNAL_SERVER_ERROR, String::new())
		}
	}
}

pub fn metrics_router(metrics: Arc<SweepMetrics>) -> Router {
	Router::new()
		.route("/metrics", get(metrics_handler))
		.with_state(metrics)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_healthz_always_ok() {
		let response = healthz_handler().await.into_response();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn test_readyz_follows_state() {
		let state = ProbeState::new();

		let response = readyz_handler(State(state.clone())).await.into_response();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

		state.set_ready();
		let response = readyz_handler(State(state)).await.into_response();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[test]
	fn test_probe_response_serialization() {
		let json = serde_json::to_value(ProbeResponse {
			status: ProbeStatus::Unavailable,
		})
		.unwrap();
		assert_eq!(json, serde_json::json!({ "status": "unavailable" }));
	}

	#[tokio::test]
	async fn test_metrics_handler_ok() {
		let metrics = Arc::new(SweepMetrics::new());
		metrics.record_list_error();

		let response = metrics_handler(State(metrics)).await.into_response();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[test]
	fn test_routers_build() {
		let _ = probe_router(ProbeState::new());
		let _ = metrics_router(Arc::new(SweepMetrics::new()));
	}
}
