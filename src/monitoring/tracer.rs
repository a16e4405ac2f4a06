/*!
 * Structured Tracing
 * Tracing setup and operation spans using the tracing crate
 *
 * Features:
 * - Run ID generation for correlating one coordinator run
 * - JSON-formatted logs for structured parsing
 * - Durations recorded when a span closes
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Environment variable enabling JSON log output
pub const ENV_TRACE_JSON: &str = "COORD_TRACE_JSON";

/// Operations overrunning their expected duration by more than this are
/// logged at warn level
const SLOW_OPERATION: Duration = Duration::from_millis(100);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - COORD_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "structured tracing initialized");
    }
}

/// Generate a unique ID for one coordinator run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one coordination operation, timed on drop
pub struct OperationSpan {
    span: tracing::Span,
    start: Instant,
    operation: &'static str,
    run_id: String,
    slow_threshold: Duration,
}

impl OperationSpan {
    pub fn new(operation: &'static str) -> Self {
        let run_id = generate_run_id();

        let span = span!(
            Level::DEBUG,
            "operation",
            run_id = %run_id,
            operation = operation,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let _entered = span.enter();
        debug!(operation, run_id = %run_id, "operation started");
        drop(_entered);

        Self {
            span,
            start: Instant::now(),
            operation,
            run_id,
            slow_threshold: SLOW_OPERATION,
        }
    }

    /// Declare how long the operation is meant to run
    ///
    /// Sampling windows and other deliberately long operations only warn
    /// once they overrun `expected` by the slow-operation margin.
    pub fn with_expected_duration(mut self, expected: Duration) -> Self {
        self.slow_threshold = expected.saturating_add(SLOW_OPERATION);
        self
    }

    /// Whether the operation has run past its slow threshold
    pub fn is_slow(&self) -> bool {
        self.start.elapsed() > self.slow_threshold
    }

    /// Run ID for correlating log lines
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Time since the span opened
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the operation outcome
    pub fn record_outcome<V: std::fmt::Debug>(&self, outcome: V) {
        self.span.record("outcome", format!("{:?}", outcome).as_str());
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_ms", duration.as_millis() as u64);

        if duration > self.slow_threshold {
            warn!(
                run_id = %self.run_id,
                operation = self.operation,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow operation detected"
            );
        } else {
            debug!(
                run_id = %self.run_id,
                operation = self.operation,
                duration_us = duration.as_micros() as u64,
                "operation completed"
            );
        }
    }
}

/// Helper to create an operation span
#[inline]
pub fn span_operation(name: &'static str) -> OperationSpan {
    OperationSpan::new(name)
}
