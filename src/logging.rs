use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to an append-only file. The dashboard owns the
/// terminal, so nothing may be written to stdout/stderr while it runs.
/// `RUST_LOG` wins over `level` when set.
pub fn init_file_logging(path: &Path, level: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_thread_names(true)
        .with_env_filter(env_filter(level))
        .with_writer(Mutex::new(file))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("failed to set tracing subscriber: {e}"))?;
    Ok(())
}

/// Plain stderr logging for the one-shot mode.
pub fn init_stderr_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("failed to set tracing subscriber: {e}"))?;
    Ok(())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Truncate the log when it grows past `max_bytes`, keeping one run's worth.
pub fn truncate_if_larger(path: &Path, max_bytes: u64) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > max_bytes => {
            File::create(path)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_falls_back_to_info() {
        let _ = env_filter("definitely not a level ===");
    }

    #[test]
    fn truncates_oversized_log() {
        let path = std::env::temp_dir().join(format!("statwidget_log_{}.log", std::process::id()));
        fs::write(&path, vec![b'x'; 64]).unwrap();
        truncate_if_larger(&path, 16).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);

        fs::write(&path, vec![b'x'; 8]).unwrap();
        truncate_if_larger(&path, 16).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 8);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn ensure_parent_dir_creates_nested_dirs() {
        let root = std::env::temp_dir().join(format!("statwidget_logdir_{}", std::process::id()));
        let path = root.join("a").join("b").join("x.log");
        ensure_parent_dir(&path).unwrap();
        assert!(root.join("a").join("b").is_dir());
        let _ = fs::remove_dir_all(&root);
    }
}
