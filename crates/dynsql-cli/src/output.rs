//! Styled terminal output.

use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};

pub fn print_error(header: &str, msg: impl std::fmt::Display) {
    eprintln!("{} {header}: {msg}", "[ERROR]".red().bold());
}

pub fn print_warning(header: &str, msg: impl std::fmt::Display) {
    eprintln!("{} {header}: {msg}", "[WARN]".yellow().bold());
}

pub fn print_success(msg: &str) {
    println!("{} {msg}", "✓".green().bold());
}

pub fn print_section(title: &str) {
    println!("{}", title.bold().cyan());
}

/// A table with bold cyan headers, as every listing uses.
pub fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    table
}
