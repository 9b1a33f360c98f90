use grannymail_config::LogFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,grannymail_db=debug,grannymail_admin=debug";

/// Initialize logging for a binary.
/// - RUST_LOG respected; defaults to debug for the data layer
/// - JSON lines for log shipping, or human-readable output for terminals
pub fn init(service_name: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("global subscriber already installed");
        return;
    }

    tracing::info!(service = %service_name, ?format, "Logging initialized");
}
