use env_logger::Target;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE: &str = "/var/log/berryboot/installer.log";

/// Log to `log_file` (or [`DEFAULT_LOG_FILE`]), falling back to stderr when the file
/// cannot be opened. `RUST_LOG` overrides the default `info` level.
pub fn init_with(log_file: Option<PathBuf>) {
    let path = log_file.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
    let target = open_log_target(&path).unwrap_or(Target::Stderr);

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(target)
        .init();
}

fn open_log_target(path: &Path) -> io::Result<Target> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(Target::Pipe(Box::new(file)))
}
