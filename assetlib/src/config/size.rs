//! Human-readable size parsing (e.g., "2GB", "500MB").

use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;
const TB: u64 = 1024 * GB;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '2GB', '500MB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports bare numbers (bytes) and KB/K, MB/M, GB/G suffixes, all
/// case-insensitive and whitespace tolerant.
///
/// # Examples
///
/// ```
/// use assetlib::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
/// assert_eq!(parse_size("500mb").unwrap(), 500 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SizeParseError::new(s));
    }

    let upper = s.to_uppercase();
    let (suffix_len, multiplier) = if upper.ends_with("GB") {
        (2, GB)
    } else if upper.ends_with('G') {
        (1, GB)
    } else if upper.ends_with("MB") {
        (2, MB)
    } else if upper.ends_with('M') {
        (1, MB)
    } else if upper.ends_with("KB") {
        (2, KB)
    } else if upper.ends_with('K') {
        (1, KB)
    } else {
        (0, 1)
    };

    let num_str = s[..s.len() - suffix_len].trim();
    let num: u64 = num_str.parse().map_err(|_| SizeParseError::new(s))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(s))
}

/// Format a byte count as an exact, re-parseable size string.
///
/// ```
/// use assetlib::config::format_size;
///
/// assert_eq!(format_size(1024), "1KB");
/// assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2GB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{}", bytes)
    }
}

/// Format a byte count for humans, rounded to two decimals.
///
/// ```
/// use assetlib::config::display_size;
///
/// assert_eq!(display_size(512), "512 B");
/// assert_eq!(display_size(1536 * 1024 * 1024), "1.50 GB");
/// ```
pub fn display_size(bytes: u64) -> String {
    let (value, unit) = if bytes >= TB {
        (bytes as f64 / TB as f64, "TB")
    } else if bytes >= GB {
        (bytes as f64 / GB as f64, "GB")
    } else if bytes >= MB {
        (bytes as f64 / MB as f64, "MB")
    } else if bytes >= KB {
        (bytes as f64 / KB as f64, "KB")
    } else {
        return format!("{} B", bytes);
    };
    format!("{:.2} {}", value, unit)
}
