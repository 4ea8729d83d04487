use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing from `RUST_LOG`, defaulting to info. Set
/// `LOG_FORMAT=json` for machine-readable output.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_ansi(true))
            .init();
    }
}
