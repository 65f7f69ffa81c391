//! Optional default logger for embedders that don't want to wire up their
//! own `log` sink (gated behind the `default-logger` feature). The crate
//! itself only ever logs through the `log` facade; nothing here is called
//! unless the embedder opts in.

#[cfg(feature = "default-logger")]
use crate::path::StrictPath;

/// Starts a rotating file logger at `warn` by default, matching the
/// teacher's own `main.rs` logger setup (env-overridable filter, UTC
/// timestamps, size-based rotation keeping a handful of prior files).
#[cfg(feature = "default-logger")]
pub fn init_default_logger(directory: &StrictPath) -> Result<flexi_logger::LoggerHandle, flexi_logger::FlexiLoggerError> {
    flexi_logger::Logger::try_with_env_or_str("fil=warn")?
        .log_to_file(flexi_logger::FileSpec::default().directory(directory.interpret()))
        .write_mode(flexi_logger::WriteMode::Async)
        .rotate(
            flexi_logger::Criterion::Size(1024 * 1024 * 10),
            flexi_logger::Naming::Timestamps,
            flexi_logger::Cleanup::KeepLogFiles(4),
        )
        .use_utc()
        .format_for_files(|w, now, record| {
            write!(
                w,
                "[{}] {} [{}] {}",
                now.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.module_path().unwrap_or("<unnamed>"),
                &record.args(),
            )
        })
        .start()
}
