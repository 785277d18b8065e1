//! Tracing and metric registration for the authorization engine.
//!
//! # Notes
//! Initialization is guarded by `OnceLock` to keep startup idempotent in tests.
//! No metrics exporter is installed here; the host process owns the recorder.
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const DECISIONS_TOTAL: &str = "vams_authz_decisions_total";
pub const POLICY_COMPILES_TOTAL: &str = "vams_authz_policy_compiles_total";
pub const FALLBACKS_TOTAL: &str = "vams_authz_fallbacks_total";
pub const MISSING_FIELD_TOTAL: &str = "vams_authz_missing_field_total";

static OBS_INIT: OnceLock<()> = OnceLock::new();
static METRICS_DESCRIBED: OnceLock<()> = OnceLock::new();

pub fn init_observability(service_name: &str) {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
        tracing::info!(service = service_name, "observability initialized");
    });
    describe_metrics();
}

/// Register descriptions for the engine's counters with the installed recorder.
pub fn describe_metrics() {
    METRICS_DESCRIBED.get_or_init(|| {
        metrics::describe_counter!(DECISIONS_TOTAL, "Authorization decisions by outcome");
        metrics::describe_counter!(
            POLICY_COMPILES_TOTAL,
            "Per-principal policy compilations by outcome"
        );
        metrics::describe_counter!(FALLBACKS_TOTAL, "Fail-closed fallbacks by reason");
        metrics::describe_counter!(
            MISSING_FIELD_TOTAL,
            "Decisions that referenced a field absent after widening"
        );
    });
}
