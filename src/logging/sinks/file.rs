use std::fs;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::registry::LookupSpan;

use crate::{
    error::LoggingError,
    logging::{
        config::{FileConfig, LoggingConfig},
        formatter::{self, BoxedLayer},
    },
};

/// Daily-rolling file layer. The guard must outlive the subscriber or
/// buffered lines are lost.
pub fn layer_with_config<S>(
    config: &LoggingConfig,
    file: &FileConfig,
) -> Result<(BoxedLayer<S>, WorkerGuard), LoggingError>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    // Create the directory if it doesn't exist.
    fs::create_dir_all(&file.dir).map_err(|source| LoggingError::CreateDir {
        path: file.dir.clone(),
        source,
    })?;

    let file_appender = daily(&file.dir, &file.prefix);
    let (non_blocking_writer, guard) = non_blocking(file_appender);

    // No colour codes in files.
    let layer = formatter::build_layer(
        config.format,
        non_blocking_writer,
        false,
        config.with_target,
    );

    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    #[test]
    fn test_file_layer_writes_into_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let file = FileConfig {
            dir: tmp.path().join("nested"),
            prefix: "test.log".into(),
        };
        let cfg = LoggingConfig::default();

        let (layer, guard) = layer_with_config::<Registry>(&cfg, &file).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("written to file");
        });
        drop(guard);

        let mut contents = String::new();
        for entry in fs::read_dir(&file.dir).unwrap() {
            contents.push_str(&fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        assert!(contents.contains("written to file"));
    }

    #[test]
    fn test_unwritable_dir_is_reported() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = FileConfig {
            // A regular file cannot hold a directory.
            dir: tmp.path().join("logs"),
            prefix: "test.log".into(),
        };

        let Err(err) = layer_with_config::<Registry>(&LoggingConfig::default(), &file) else {
            panic!("expected CreateDir");
        };

        assert!(matches!(err, LoggingError::CreateDir { .. }));
    }
}
