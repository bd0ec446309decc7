//! Progress indicators for the authpol CLI.

use indicatif::{ProgressBar, ProgressStyle};

/// A bar counting `len` steps, hidden when `quiet` is set
pub fn bar(len: u64, prefix: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{prefix} {spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb
}
