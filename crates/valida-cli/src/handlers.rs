//! Command handlers for CLI subcommands

mod completions;
mod config;
mod providers;

pub use completions::handle_completions;
pub use config::handle_config;
pub use providers::handle_providers;
