// src/logging.rs
// File logger for the CLI: `<dir>/debug.log`, lines stamped with time since start.
//   [00:00:01.234][INFO] House listing: 3 page(s), 250 item(s)

use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use flexi_logger::{DeferredNow, Duplicate, FileSpec, Logger, LoggerHandle};
use log::Record;

use crate::config::consts::LOG_BASENAME;
use crate::error::{Error, Result};

static START: OnceLock<Instant> = OnceLock::new();
static HANDLE: OnceLock<LoggerHandle> = OnceLock::new();

fn start() -> Instant {
    *START.get_or_init(Instant::now)
}

fn fmt_elapsed(ms: u128) -> String {
    let total_ms = ms as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// flexi_logger line format.
pub fn elapsed_format(w: &mut dyn Write, _now: &mut DeferredNow, record: &Record) -> std::io::Result<()> {
    let elapsed = fmt_elapsed(start().elapsed().as_millis());
    write!(w, "[{elapsed}][{}] {}", record.level(), record.args())
}

/// Start logging once per process. `RUST_LOG` wins over `spec`; both use the
/// flexi_logger syntax (`info`, `housing_scrape=debug,reqwest=warn`).
/// With `echo`, warnings and errors are also printed to stderr.
/// A second call is a no-op.
pub fn init_logging(dir: &Path, spec: &str, echo: bool) -> Result<()> {
    if HANDLE.get().is_some() {
        return Ok(());
    }
    start();
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let handle = Logger::try_with_env_or_str(spec)
        .map_err(|e| Error::Config(format!("invalid log spec `{spec}`: {e}")))?
        .log_to_file(
            FileSpec::default()
                .directory(dir)
                .basename(LOG_BASENAME)
                .suppress_timestamp(),
        )
        .append()
        .duplicate_to_stderr(if echo { Duplicate::Warn } else { Duplicate::None })
        .format_for_files(elapsed_format)
        .format_for_stderr(elapsed_format)
        .start()
        .map_err(|e| Error::Config(format!("failed to start logger: {e}")))?;

    let _ = HANDLE.set(handle);
    Ok(())
}
