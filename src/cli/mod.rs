//! Terminal presentation: prompts, banners and progress bars.

pub mod prompt;

use indicatif::{ProgressBar, ProgressStyle};

pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};

pub const RULE: &str = "======================================================================";

pub fn print_banner() {
    println!("\n{}", RULE);
    println!("  🔍 SEO Scout v{}", env!("CARGO_PKG_VERSION"));
    println!("  Persian SEO content analysis & optimization");
    println!("{}\n", RULE);
}

/// Section header, optionally with a step counter such as `2/7`.
pub fn print_section(title: &str, step: Option<&str>) {
    println!("\n{}", RULE);
    match step {
        Some(s) => println!("[{}] {}", s, title),
        None => println!("{}", title),
    }
    println!("{}", RULE);
}

/// Counting bar for batch work; hidden when stderr is not a terminal.
pub fn progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{prefix} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    pb.set_style(style);
    pb.set_prefix(label.to_string());
    pb
}
