use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "threadloom_backend=info,tower_http=info";

/// Installs the global fmt subscriber. `RUST_LOG` replaces the default
/// directives; a second call is a no-op.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}
