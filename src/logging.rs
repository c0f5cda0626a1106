use env_logger::Env;

pub const TRACING_ENV: &str = "ADDR_DEDUPE_TRACING";

fn flag_enabled(value: Option<&str>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Initialize diagnostics on stderr: `env_logger` by default, or a
/// `tracing` fmt subscriber when `ADDR_DEDUPE_TRACING` is set.
pub fn init() {
    if flag_enabled(std::env::var(TRACING_ENV).ok().as_deref()) {
        init_tracing_from_env();
    } else {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .format_timestamp_millis()
            .try_init();
    }
}

pub fn init_tracing_from_env() {
    // Bridge log:: macros into tracing
    let _ = tracing_log::LogTracer::init();
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_flag_values() {
        assert!(flag_enabled(Some("1")));
        assert!(flag_enabled(Some("TRUE")));
        assert!(!flag_enabled(Some("0")));
        assert!(!flag_enabled(None));
    }
}
