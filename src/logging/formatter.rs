use std::io::{self, Stdout};

use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use super::config::{LogFormat, LoggingConfig};

/// Boxed layer; the concrete type depends on the chosen format.
pub type BoxedLayer<S> = Box<dyn LayerTrait<S> + Send + Sync>;

/// Console layer writing to stdout in the configured format.
pub fn console_layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let writer: fn() -> Stdout = io::stdout;
    build_layer(config.format, writer, config.ansi, config.with_target)
}

/// Builds an fmt layer for `format` around `writer`.
///
/// Subscription spans are reported when they close so the lifetime of each
/// consumption task shows up in pretty output.
pub fn build_layer<S, W>(
    format: LogFormat,
    writer: W,
    with_ansi: bool,
    with_target: bool,
) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(with_target);
            Box::new(layer)
        }
        LogFormat::Pretty => {
            let pretty_fmt = fmt::format().pretty();
            let layer = fmt::layer()
                .event_format(pretty_fmt)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer)
                .with_ansi(with_ansi)
                .with_target(with_target)
                .with_thread_ids(true);
            Box::new(layer)
        }
        LogFormat::Compact => {
            let compact_fmt = fmt::format().compact();
            let layer = fmt::layer()
                .event_format(compact_fmt)
                .with_writer(writer)
                .with_ansi(with_ansi)
                .with_target(with_target);
            Box::new(layer)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rstest::rstest;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(format: LogFormat) -> String {
        let buf = SharedBuf(Arc::new(Mutex::new(Vec::new())));
        let sink = buf.clone();
        let layer = build_layer::<Registry, _>(format, move || sink.clone(), false, true);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("subscription", topic = "orders");
            let _enter = span.enter();
            tracing::info!(pipe = 7, "subscriber admitted");
        });

        let out = buf.0.lock().unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[rstest]
    #[case(LogFormat::Compact)]
    #[case(LogFormat::Pretty)]
    #[case(LogFormat::Json)]
    fn test_every_format_writes_the_event(#[case] format: LogFormat) {
        let out = render(format);

        assert!(out.contains("subscriber admitted"), "{format:?}: {out}");
        assert!(out.contains("orders"), "{format:?}: {out}");
    }

    #[test]
    fn test_json_lines_parse() {
        let out = render(LogFormat::Json);
        let line = out.lines().next().unwrap();

        let value: serde_json::Value = serde_json::from_str(line).unwrap();

        assert_eq!(value["fields"]["message"], "subscriber admitted");
        assert_eq!(value["span"]["topic"], "orders");
    }

    #[test]
    fn test_console_layer_registers() {
        let cfg = LoggingConfig {
            ansi: false,
            ..Default::default()
        };
        let subscriber = Registry::default().with(console_layer::<Registry>(&cfg));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("console smoke test");
        });
    }
}
