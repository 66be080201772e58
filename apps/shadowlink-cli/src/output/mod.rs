//! Terminal output helpers

mod printer;
pub mod table;

pub use printer::{print_field, print_json, print_ok, print_warning};
pub use table::{render_changes, truncate};

/// How a command renders its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table and summary lines.
    #[default]
    Table,
    /// A single JSON document on stdout.
    Json,
}
