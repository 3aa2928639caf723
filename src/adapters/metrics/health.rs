//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7 for container
//! health checks. Ready means at least one engine is running and no
//! shutdown is in progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing::{info, instrument};

use crate::shutdown::StopSignal;

/// Shared health state polled by readiness probes.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Strategy engines currently ticking.
    engines_running: AtomicUsize,
    /// Set once shutdown begins.
    shutting_down: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine_started(&self) {
        self.engines_running.fetch_add(1, Ordering::Relaxed);
    }

    pub fn engine_stopped(&self) {
        // Never underflows: each stop is paired with a start.
        let _ = self
            .engines_running
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn engines_running(&self) -> usize {
        self.engines_running.load(Ordering::Relaxed)
    }

    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
    }

    /// Check if the bot is ready to serve traffic.
    pub fn is_ready(&self) -> bool {
        !self.shutting_down.load(Ordering::Relaxed) && self.engines_running() > 0
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Run until the stop signal fires.
    #[instrument(skip(self, stop), fields(port = self.port))]
    pub async fn run(self, mut stop: StopSignal) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(Arc::clone(&self.state));

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.stopped().await })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 while engines are quoting.
    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_follows_engines_and_shutdown() {
        let state = HealthState::new();
        assert!(!state.is_ready());

        state.engine_started();
        state.engine_started();
        assert!(state.is_ready());

        state.engine_stopped();
        assert_eq!(state.engines_running(), 1);
        assert!(state.is_ready());

        state.mark_shutting_down();
        assert!(!state.is_ready());
    }

    #[test]
    fn test_engine_count_saturates_at_zero() {
        let state = HealthState::new();
        state.engine_stopped();
        assert_eq!(state.engines_running(), 0);
    }
}
