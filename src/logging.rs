use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. In debug mode the default level is `debug`, otherwise
/// `info`. `RUST_LOG` is only honoured when debug logging is enabled.
///
/// When `log_file` is given, output is written to that file through a
/// non-blocking appender instead of stderr.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    // Forcing `info` when debug is off keeps a stray `RUST_LOG` in the
    // user's environment from flooding the editor log.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file.as_deref().and_then(split_log_path) {
        Some((dir, name)) => {
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if builder
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .is_ok()
            {
                let _ = FILE_GUARD.set(guard);
            }
        }
        None => {
            let _ = builder.try_init();
        }
    }
}

fn split_log_path(path: &std::path::Path) -> Option<(PathBuf, std::ffi::OsString)> {
    let name = path.file_name()?.to_os_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}
