//! Prometheus Metrics Registry - Quoting Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers tick outcomes and latency, order flow, and the live pricing
//! state (reservation price, spread, position) of every market.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::{info, instrument, warn};

use crate::shutdown::StopSignal;

/// Centralized Prometheus metrics for the market maker.
///
/// All metrics follow the naming convention `kalshi_mm_*` and carry a
/// `market` label so each engine can be filtered independently.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    /// Ticks by outcome (`quoted`, `skipped`, `failed`, `stopped`).
    pub ticks: IntCounterVec,
    /// Tick wall time in milliseconds.
    pub tick_latency_ms: HistogramVec,
    /// Orders accepted by the exchange.
    pub orders_placed: IntCounterVec,
    /// Orders cancelled, by reconcile reason.
    pub orders_cancelled: IntCounterVec,
    /// Failed exchange calls, by operation.
    pub order_failures: IntCounterVec,
    /// Placements deferred because a same-lane cancel failed.
    pub placements_deferred: IntCounterVec,
    /// Latest reservation price.
    pub reservation_price: GaugeVec,
    /// Latest model spread.
    pub spread: GaugeVec,
    /// Latest traded-side inventory.
    pub position: GaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks = IntCounterVec::new(
            Opts::new("kalshi_mm_ticks_total", "Engine ticks by outcome"),
            &["market", "outcome"],
        )?;

        let tick_latency_ms = HistogramVec::new(
            HistogramOpts::new("kalshi_mm_tick_latency_ms", "Tick duration in milliseconds")
                .buckets(vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]),
            &["market"],
        )?;

        let orders_placed = IntCounterVec::new(
            Opts::new("kalshi_mm_orders_placed_total", "Orders accepted by the exchange"),
            &["market", "side", "action"],
        )?;

        let orders_cancelled = IntCounterVec::new(
            Opts::new("kalshi_mm_orders_cancelled_total", "Orders cancelled"),
            &["market", "reason"],
        )?;

        let order_failures = IntCounterVec::new(
            Opts::new("kalshi_mm_exchange_failures_total", "Failed exchange calls"),
            &["market", "operation"],
        )?;

        let placements_deferred = IntCounterVec::new(
            Opts::new(
                "kalshi_mm_placements_deferred_total",
                "Placements skipped because a same-lane cancel failed",
            ),
            &["market"],
        )?;

        let reservation_price = GaugeVec::new(
            Opts::new("kalshi_mm_reservation_price", "Latest reservation price"),
            &["market"],
        )?;

        let spread = GaugeVec::new(
            Opts::new("kalshi_mm_spread", "Latest model spread"),
            &["market"],
        )?;

        let position = GaugeVec::new(
            Opts::new("kalshi_mm_position", "Traded-side inventory in contracts"),
            &["market"],
        )?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(tick_latency_ms.clone()))?;
        registry.register(Box::new(orders_placed.clone()))?;
        registry.register(Box::new(orders_cancelled.clone()))?;
        registry.register(Box::new(order_failures.clone()))?;
        registry.register(Box::new(placements_deferred.clone()))?;
        registry.register(Box::new(reservation_price.clone()))?;
        registry.register(Box::new(spread.clone()))?;
        registry.register(Box::new(position.clone()))?;

        Ok(Self {
            registry,
            ticks,
            tick_latency_ms,
            orders_placed,
            orders_cancelled,
            order_failures,
            placements_deferred,
            reservation_price,
            spread,
            position,
        })
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, stop))]
    pub async fn serve(self: Arc<Self>, bind_address: String, mut stop: StopSignal) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.stopped().await })
            .await?;

        Ok(())
    }
}
