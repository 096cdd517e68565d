//! Terminal output utilities.
//!
//! Provides column formatting and coloring helpers for the CLI tables.

use crate::models::AddressStatus;
use colored::{ColoredString, Colorize};

/// Format a value as a left-aligned column of exactly `width` characters.
///
/// Longer values are cut and end in `~` so columns stay aligned.
///
/// # Arguments
/// * `value` - The value to format
/// * `width` - The width of the column
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let value_str = value.to_string();
    let len = value_str.chars().count();

    if len > width && width > 0 {
        let cut: String = value_str.chars().take(width - 1).collect();
        format!("{cut}~")
    } else {
        format!("{value_str:<width$}")
    }
}

/// Optional text, or `-` when unset.
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Status padded to `width`, then colored.
pub fn status_label(status: AddressStatus, width: usize) -> ColoredString {
    let text = format_field(status, width);
    match status {
        AddressStatus::Available => text.green(),
        AddressStatus::Assigned => text.yellow(),
        AddressStatus::Reserved => text.cyan(),
    }
}

/// Usage bar like `[#####.....]` for `used` out of `total`.
pub fn usage_bar(used: u128, total: u128, slots: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (used.min(total) * slots as u128).div_ceil(total) as usize
    };
    format!("[{}{}]", "#".repeat(filled), ".".repeat(slots - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_field_short() {
        assert_eq!(format_field("test", 10), "test      ");
    }

    #[test]
    fn test_format_field_exact() {
        assert_eq!(format_field("test", 4), "test");
    }

    #[test]
    fn test_format_field_long() {
        assert_eq!(format_field("long_value", 5), "long~");
    }

    #[test]
    fn test_format_field_number() {
        assert_eq!(format_field(42, 4), "42  ");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("web")), "web");
    }

    #[test]
    fn test_usage_bar() {
        assert_eq!(usage_bar(0, 254, 10), "[..........]");
        assert_eq!(usage_bar(1, 254, 10), "[#.........]");
        assert_eq!(usage_bar(254, 254, 10), "[##########]");
        assert_eq!(usage_bar(5, 0, 4), "[....]");
    }
}
