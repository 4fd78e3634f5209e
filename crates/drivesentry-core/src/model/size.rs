//! Size formatting utilities: human-readable byte counts.
//!
//! All internal sizes are `u64` bytes. Floating point is only used
//! at the display-formatting boundary.

/// Unit labels, stepped by 1024. Binary multiples, labelled with the short
/// forms users expect from a disk tool.
const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count into a human-readable string with exactly two
/// decimal digits, e.g. `"0.00 B"`, `"1.50 KB"`, `"931.51 GB"`.
///
/// Values of 1024 TB and above fall off the end of the unit table and are
/// returned as the bare scaled number with no unit (`"1.0"` for 1 PB).
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:?}")
}

/// Format an optional byte count, rendering a missing attribute as `"-"`.
pub fn format_optional_size(bytes: Option<u64>) -> String {
    bytes.map_or_else(|| "-".to_owned(), format_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_bytes() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
    }

    #[test]
    fn test_format_size_kb() {
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
    }

    #[test]
    fn test_format_size_mb() {
        assert_eq!(format_size(1_048_576), "1.00 MB");
    }

    #[test]
    fn test_format_size_gb() {
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
    }

    #[test]
    fn test_format_size_tb() {
        assert_eq!(format_size(1_099_511_627_776), "1.00 TB");
        assert_eq!(format_size(512 * 1_099_511_627_776), "512.00 TB");
    }

    #[test]
    fn test_format_size_beyond_tb_is_unitless() {
        assert_eq!(format_size(1u64 << 50), "1.0");
        assert_eq!(format_size(1u64 << 51), "2.0");
    }

    #[test]
    fn test_format_optional_size() {
        assert_eq!(format_optional_size(None), "-");
        assert_eq!(format_optional_size(Some(2048)), "2.00 KB");
    }
}
