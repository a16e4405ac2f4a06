/*!
 * Monitoring
 * Structured tracing for coordination runs
 */

mod tracer;

pub use tracer::{generate_run_id, init_tracing, span_operation, OperationSpan, ENV_TRACE_JSON};
