// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod config;
mod health;
mod leader;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use preview_sweeper_engine::{Scheduler, SweepMetrics, Sweeper};
use preview_sweeper_k8s::{KubeClient, LeaseLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Args, LogFormat};
use crate::health::{metrics_router, probe_router, ProbeState};
use crate::leader::{leader_identity, LeaderElector, LeadershipEnd};

/// Name events and the Kubernetes client report as.
const COMPONENT: &str = "preview-sweeper";

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(&args);

	info!(version = env!("CARGO_PKG_VERSION"), "Starting preview-sweeper");

	let policy = args.sweep_policy()?;
	let metrics_addr = args.metrics_addr()?;
	let probe_addr = args.probe_addr()?;
	let lease_duration = args.lease_duration()?;

	info!(
		sweep_every = %humantime::format_duration(policy.interval),
		ttl = %humantime::format_duration(policy.default_ttl),
		jitter = policy.jitter,
		dry_run = policy.dry_run,
		metrics_addr = ?metrics_addr,
		probe_addr = ?probe_addr,
		leader_elect = args.leader_elect,
		"Configuration parsed"
	);

	let cancel = CancellationToken::new();
	tokio::spawn(shutdown_signal(cancel.clone()));

	let metrics = Arc::new(SweepMetrics::new());
	let probes = ProbeState::new();

	let mut servers = Vec::new();
	if let Some(addr) = probe_addr {
		let router = probe_router(probes.clone());
		servers.push(spawn_server("health", addr, router, cancel.clone()).await?);
	}
	if let Some(addr) = metrics_addr {
		let router = metrics_router(Arc::clone(&metrics));
		servers.push(spawn_server("metrics", addr, router, cancel.clone()).await?);
	}

	let client = KubeClient::new(COMPONENT)
		.await
		.context("failed to create Kubernetes client")?;
	probes.set_ready();

	let sweeper = Sweeper::new(Arc::new(client.clone()), policy, Arc::clone(&metrics));
	let scheduler = Scheduler::new(Arc::new(sweeper));

	let mut leadership = None;
	if args.leader_elect && scheduler.requires_leadership() {
		let host = std::env::var("POD_NAME")
			.or_else(|_| std::env::var("HOSTNAME"))
			.ok();
		let lock = LeaseLock::new(
			client.client(),
			args.leader_election_namespace.clone(),
			args.leader_election_id.clone(),
			leader_identity(host),
			lease_duration,
		);
		let elector = LeaderElector::new(Arc::new(lock));

		if !elector.acquire(&cancel).await {
			info!("Shutdown requested before acquiring leadership");
			join_servers(servers).await;
			return Ok(());
		}

		leadership = Some(tokio::spawn({
			let cancel = cancel.clone();
			async move { elector.hold(cancel).await }
		}));
	}

	scheduler.run(cancel.clone()).await;
	cancel.cancel();

	let lost = match leadership {
		Some(handle) => handle.await? == LeadershipEnd::Lost,
		None => false,
	};
	join_servers(servers).await;

	if lost {
		anyhow::bail!("leader election lost");
	}

	info!("preview-sweeper shutdown complete");
	Ok(())
}

fn init_tracing(args: &Args) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	let registry = tracing_subscriber::registry().with(filter);

	match args.log_format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

async fn spawn_server(
	name: &'static str,
	addr: SocketAddr,
	router: Router,
	cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
	let listener = tokio::net::TcpListener::bind(addr)
		.await
		.with_context(|| format!("failed to bind {name} server to {addr}"))?;
	info!("{} server listening on {}", name, addr);

	Ok(tokio::spawn(async move {
		let shutdown = async move { cancel.cancelled().await };
		if let Err(e) = axum::serve(listener, router.into_make_service())
			.with_graceful_shutdown(shutdown)
			.await
		{
			warn!(error = %e, "{} server error", name);
		}
	}))
}

async fn join_servers(servers: Vec<JoinHandle<()>>) {
	for server in servers {
		if let Err(e) = server.await {
			warn!(error = %e, "Server task failed");
		}
	}
}

/// Cancel `cancel` on SIGINT or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			warn!(error = %e, "Failed to listen for SIGINT");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				warn!(error = %e, "Failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {}
		_ = terminate => {}
		_ = cancel.cancelled() => return,
	}

	info!("Received shutdown signal");
	cancel.cancel();
}
