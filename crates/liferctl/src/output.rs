//! Terminal output helpers. ASCII only, `[SECTION]` headers.

use owo_colors::OwoColorize;

pub const THIN_SEP: &str = "----------------------------------------";

pub fn section(title: &str) {
    println!();
    println!("{}", format!("[{title}]").bold());
    println!("{}", THIN_SEP.dimmed());
}

pub fn ok(message: &str) {
    println!("{} {}", "[OK]".green(), message);
}

pub fn warn(message: &str) {
    println!("{} {}", "[WARNING]".yellow(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red(), message);
}

pub fn kv(key: &str, value: &str) {
    println!("  {key:<22} {value}");
}

/// ASCII progress bar, e.g. `[########------------] 40%`.
pub fn bar(current: f64, total: f64, width: usize) -> String {
    let ratio = if total > 0.0 {
        (current / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f64).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled)),
        ratio * 100.0
    )
}
