//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Upstream Metrics
    pub static ref GITHUB_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("repokeeper_github_requests_total", "Total number of GitHub API requests"),
        &["operation", "status"]
    ).expect("metric can be created");
    pub static ref GITHUB_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "repokeeper_github_request_duration_seconds",
            "GitHub API request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"]
    ).expect("metric can be created");

    // Auth Metrics
    pub static ref OAUTH_LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("repokeeper_oauth_logins_total", "Total number of OAuth callback attempts"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref STORED_TOKENS: IntGauge = IntGauge::new(
        "repokeeper_stored_tokens",
        "Current number of GitHub tokens held in memory"
    ).expect("metric can be created");

    // Bulk Metrics
    pub static ref BULK_ITEMS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("repokeeper_bulk_items_total", "Total number of repositories processed by bulk operations"),
        &["operation", "outcome"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("repokeeper_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(GITHUB_REQUESTS_TOTAL.clone()))
        .expect("GITHUB_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(GITHUB_REQUEST_DURATION_SECONDS.clone()))
        .expect("GITHUB_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(OAUTH_LOGINS_TOTAL.clone()))
        .expect("OAUTH_LOGINS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORED_TOKENS.clone()))
        .expect("STORED_TOKENS can be registered");
    REGISTRY
        .register(Box::new(BULK_ITEMS_TOTAL.clone()))
        .expect("BULK_ITEMS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
