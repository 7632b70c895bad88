//! Operator-facing terminal output.
//!
//! Diagnostics go through `tracing` on stderr; these lines are the
//! human-readable progress view on stdout.

use colored::Colorize;

/// Enables ANSI escape handling on Windows consoles.
#[cfg(windows)]
pub fn setup() {
    let _ = colored::control::set_virtual_terminal(true);
}

#[cfg(not(windows))]
pub fn setup() {}

pub fn info(message: &str) {
    println!("{}", message.bold());
}

pub fn success(message: &str) {
    println!("{}", message.green());
}

pub fn failure(message: &str) {
    println!("{}", message.red());
}

/// Echoes an unhealthy observation with the status highlighted.
pub fn status(timestamp: &str, endpoint: &str, status: &str) {
    println!("\n({}) {} STATUS: {}", timestamp, endpoint, status.yellow());
}
