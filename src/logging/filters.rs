use tracing_subscriber::EnvFilter;

use super::config::LoggingConfig;

/// Directive used when neither `RUST_LOG` nor the configuration yields a
/// usable filter.
pub(crate) const FALLBACK_DIRECTIVE: &str = "info";

/// `RUST_LOG` wins when set and valid; otherwise the configured directive is
/// used, falling back to `info` if it does not parse.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            // No subscriber exists yet, so stderr is the only place to say so.
            eprintln!(
                "Invalid log filter directive from config ('{directive}'): {e}; falling back to '{FALLBACK_DIRECTIVE}'"
            );
            EnvFilter::new(FALLBACK_DIRECTIVE)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        sync::{Arc, Mutex},
    };

    use serial_test::serial;
    use tracing_subscriber::{fmt, prelude::*, registry::Registry};

    use super::*;

    struct VecMakeWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> fmt::MakeWriter<'a> for VecMakeWriter {
        type Writer = VecWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            VecWriterGuard(self.0.clone())
        }
    }

    struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriterGuard {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_with(filter: EnvFilter) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = fmt::layer()
            .with_ansi(false)
            .with_writer(VecMakeWriter(buffer.clone()))
            .with_filter(filter);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("info message");
            tracing::warn!("warn message");
        });

        let out = buffer.lock().unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    #[serial]
    fn test_configured_directive_is_applied() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "warn".into(),
            ..Default::default()
        };

        let out = capture_with(build_filter_from_config(&cfg));

        assert!(out.contains("warn message"));
        assert!(!out.contains("info message"));
    }

    #[test]
    #[serial]
    fn test_invalid_directive_falls_back_to_info() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "this_is_invalid_directive!!=??".into(),
            ..Default::default()
        };

        let out = capture_with(build_filter_from_config(&cfg));

        assert!(out.contains("info message"));
    }

    #[test]
    #[serial]
    fn test_rust_log_overrides_config() {
        env::set_var("RUST_LOG", "warn");
        let cfg = LoggingConfig {
            level: "info".into(),
            ..Default::default()
        };

        let out = capture_with(build_filter_from_config(&cfg));
        env::remove_var("RUST_LOG");

        assert!(!out.contains("info message"));
        assert!(out.contains("warn message"));
    }
}
