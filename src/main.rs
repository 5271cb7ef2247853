//! POS Order Monitor
//!
//! Watches the MATE POS window on this machine, extracts the number of
//! active delivery orders (accessibility text first, OCR fallback), and
//! publishes changes to a GitHub Gist that the phone app polls.

mod config;
mod errors;
mod extract;
mod lockfile;
mod ocr;
mod paths;
mod publish;
mod supervisor;
mod update;

#[cfg(windows)]
mod capture;
#[cfg(windows)]
mod window;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("pos_order_monitor.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        // Nothing here may panic: a second panic inside the hook aborts
        // before the first one is logged.
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("pos_order_monitor.log");
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));
}

/// Holds the console open so the operator can read the error, then exits
/// non-zero. Used only for unrecoverable startup failures.
#[cfg(windows)]
fn prompt_exit(msg: &str) -> ! {
    log(msg);
    println!("Press Enter to exit...");
    let mut buf = String::new();
    let _ = std::io::stdin().read_line(&mut buf);
    std::process::exit(1);
}

/// Loads config.json, prompting for the GitHub token on first run.
#[cfg(windows)]
fn load_or_init_config() -> anyhow::Result<config::Config> {
    let path = paths::get_config_path();
    if let Some(cfg) = config::Config::load(&path)? {
        if cfg.github_token.is_empty() {
            prompt_exit(&format!(
                "github_token is empty in {}. Add a token with the gist scope.",
                path.display()
            ));
        }
        return Ok(cfg);
    }

    println!("First run. Enter a GitHub token with the gist scope:");
    let mut token = String::new();
    std::io::stdin().read_line(&mut token)?;
    let token = token.trim();
    if token.is_empty() {
        prompt_exit("No token entered, cannot publish without one.");
    }

    let cfg = config::Config {
        github_token: token.to_string(),
        ..config::Config::default()
    };
    cfg.save(&path)?;
    log(&format!("Saved {}", path.display()));
    Ok(cfg)
}

#[cfg(windows)]
fn install_ctrl_handler() -> anyhow::Result<()> {
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::Console::SetConsoleCtrlHandler;

    unsafe extern "system" fn handler(_ctrl_type: u32) -> BOOL {
        supervisor::request_shutdown();
        BOOL(1)
    }

    unsafe { SetConsoleCtrlHandler(Some(handler), true)? };
    Ok(())
}

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    use crate::supervisor::{PosDriver, RunOutcome, Supervisor};
    use crate::window::{uia::UiaContext, MateDriver};
    use std::time::Duration;

    install_panic_hook();

    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };

    paths::ensure_directories()?;
    log("POS Order Monitor starting");

    let cfg = load_or_init_config()?;

    if let Err(e) = ocr::verify_tesseract(&cfg.tesseract_path) {
        prompt_exit(&format!("{}", e));
    }

    lockfile::acquire(&paths::get_lock_path())?;
    install_ctrl_handler()?;

    let ctx = UiaContext::new()?;
    let mut driver = MateDriver::new(
        ctx,
        &cfg.window_title,
        &cfg.delivery_tab_id,
        &cfg.tesseract_path,
    );

    let Some(handle) = driver.resolve() else {
        lockfile::release(&paths::get_lock_path());
        prompt_exit(&format!(
            "POS window '{}' not found. Is MATE POS running?",
            cfg.window_title
        ));
    };

    let sink = publish::GistSink::new(&cfg.gist_id, &cfg.github_token)?;
    let mut sup = Supervisor::new(
        driver,
        sink,
        Some(handle),
        Duration::from_secs(cfg.poll_interval_sec),
    );

    let outcome = sup.run();
    lockfile::release(&paths::get_lock_path());

    match outcome {
        RunOutcome::Stopped => Ok(()),
        RunOutcome::RestartRequested => {
            log("Code updated, restarting");
            let exe = std::env::current_exe()?;
            std::process::Command::new(exe).spawn()?;
            Ok(())
        }
    }
}

#[cfg(not(windows))]
fn main() {
    install_panic_hook();
    eprintln!("pos-order-monitor only runs on Windows (it drives the Win32 POS window).");
    std::process::exit(1);
}
