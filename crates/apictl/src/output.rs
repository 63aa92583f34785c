//! Operator-facing terminal output
//!
//! Progress and outcomes go to stdout; anything the operator must act on goes
//! to stderr so it survives `apictl ... > file`.

use std::time::Duration;

use apictl_update::UpdateDescriptor;
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

fn line(mark: StyledObject<&str>, msg: &str, to_stderr: bool) {
    if to_stderr {
        eprintln!("{} {}", mark.for_stderr(), msg);
    } else {
        println!("{} {}", mark, msg);
    }
}

pub fn success(msg: &str) {
    line(style("✓").green().bold(), msg, false);
}

pub fn info(msg: &str) {
    line(style("ℹ").blue().bold(), msg, false);
}

pub fn warning(msg: &str) {
    line(style("⚠").yellow().bold(), msg, true);
}

/// Failure lines; used when the installed binary may need manual recovery
pub fn error(msg: &str) {
    line(style("✗").red().bold(), msg, true);
}

pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Everything the release service said about an offered version
pub fn descriptor(descriptor: &UpdateDescriptor) {
    kv("Version", &descriptor.next_version.to_string());
    kv("Platform", &descriptor.platform.to_string());
    kv("URL", &descriptor.artifact_url);
    kv("SHA-256", &descriptor.sha256);
    kv("Signature", descriptor.signature.as_deref().unwrap_or("(unsigned)"));
}

/// Spinner for a release-service round trip; hidden when stderr is not a terminal
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(spinner_style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
