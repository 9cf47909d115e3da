use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set. Without it, the
/// configured level applies to this crate while the gRPC transport stack
/// (h2, hyper, tower) is held at warn, since it logs every frame at debug.
/// Output is one structured line per event on stdout, ready for a log
/// aggregator; targets are omitted because events carry cohort and signature
/// fields instead.
pub fn init_telemetry(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},h2=warn,hyper=warn,tower=warn", log_level)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
