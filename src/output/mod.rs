//! Output formatting for the CLI.
//!
//! - [`tables`] - human readable tables and detail views
//! - [`terminal`] - column and color helpers

mod tables;
mod terminal;

pub use tables::{
    print_address, print_addresses, print_audit, print_conflicts, print_history, print_host,
    print_hosts, print_ranges, print_response, print_stats, print_subnet, print_subnet_info,
    print_subnets,
};
pub use terminal::{format_field, or_dash, status_label, usage_bar};

/// Pretty JSON for `--json` output.
pub fn print_json<T: serde::Serialize>(value: &T) -> crate::error::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
