use clap::Subcommand;
use std::fs::{File, metadata};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::APP_NAME;

const SIZE_WARNING_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Subcommand)]
pub enum LogsAction {
    /// Show recent log entries
    Show {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },

    /// Clear the log file
    Clear,
}

pub fn init_logger() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = get_log_file()?;

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(())
}

pub fn log_info(msg: &str) {
    write_log("INFO", msg);
}

pub fn log_warn(msg: &str) {
    write_log("WARN", msg);
}

pub fn log_error(msg: &str) {
    write_log("ERROR", msg);
}

fn write_log(level: &str, msg: &str) {
    let log_file = match get_log_file() {
        Ok(path) => path,
        Err(_) => return,
    };

    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    append_line(&log_file, &format_entry(&timestamp.to_string(), level, msg));

    // Size check only, no rotation
    if let Ok(size) = metadata(&log_file).map(|m| m.len()) {
        if size > SIZE_WARNING_BYTES {
            let warning = format!(
                "Log file is {:.1} MiB. Consider running '{} logs clear'",
                size as f64 / 1_048_576.0,
                APP_NAME
            );
            append_line(&log_file, &format_entry(&timestamp.to_string(), "WARN", &warning));
        }
    }
}

fn format_entry(timestamp: &str, level: &str, msg: &str) -> String {
    format!("[{}] {}: {}\n", timestamp, level, msg)
}

fn append_line(log_file: &Path, line: &str) {
    // init_logger is optional
    if let Some(parent) = log_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let _ = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .and_then(|mut file| file.write_all(line.as_bytes()));
}

pub fn handle_logs_command(action: Option<LogsAction>) -> Result<(), Box<dyn std::error::Error>> {
    match action.unwrap_or(LogsAction::Show { lines: 50 }) {
        LogsAction::Show { lines } => show_logs(lines),
        LogsAction::Clear => clear_logs(),
    }
}

fn show_logs(lines: usize) -> Result<(), Box<dyn std::error::Error>> {
    let log_file = get_log_file()?;

    if !log_file.exists() {
        println!("No log file found");
        return Ok(());
    }

    let size = metadata(&log_file)?.len();
    if size > SIZE_WARNING_BYTES {
        eprintln!(
            "Warning: Log file is {:.1} MiB. Consider clearing it.",
            size as f64 / 1_048_576.0
        );
    }

    for line in tail(BufReader::new(File::open(&log_file)?), lines)? {
        println!("{}", line);
    }

    Ok(())
}

fn tail(reader: impl BufRead, lines: usize) -> std::io::Result<Vec<String>> {
    let all_lines: Vec<String> = reader.lines().collect::<Result<Vec<_>, _>>()?;
    let start = all_lines.len().saturating_sub(lines);
    Ok(all_lines[start..].to_vec())
}

fn clear_logs() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = get_log_file()?;

    if log_file.exists() {
        std::fs::write(&log_file, "")?;
        println!("Log file cleared");
    } else {
        println!("No log file to clear");
    }

    Ok(())
}

fn get_log_file() -> Result<PathBuf, Box<dyn std::error::Error>> {
    #[cfg(target_os = "windows")]
    let base = std::env::var("APPDATA")?;

    #[cfg(target_os = "macos")]
    let base = format!("{}/Library/Logs", std::env::var("HOME")?);

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let base = std::env::var("XDG_DATA_HOME")
        .or_else(|_| Ok::<_, std::env::VarError>(format!("{}/.local/share", std::env::var("HOME")?)))?;

    Ok(PathBuf::from(base).join(APP_NAME).join(format!("{}.log", APP_NAME)))
}
