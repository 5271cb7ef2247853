use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the settings file path: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Returns the single-instance lock file path: `<exe_dir>/pos_order_monitor.pid`
pub fn get_lock_path() -> PathBuf {
    get_exe_dir().join("pos_order_monitor.pid")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The panic hook relies on these; they must resolve without panicking
    // in any environment.
    #[test]
    fn test_paths_resolve_infallibly() {
        assert!(get_exe_dir().is_absolute() || get_exe_dir() == &PathBuf::from("."));
        assert!(get_logs_dir().ends_with("logs"));
        assert!(get_lock_path().ends_with("pos_order_monitor.pid"));
        assert!(get_config_path().ends_with("config.json"));
    }
}
