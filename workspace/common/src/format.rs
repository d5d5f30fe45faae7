const UNITS: [&str; 4] = ["bytes", "KB", "MB", "GB"];

/// Formats a byte count with two decimals in the largest unit below 1024.
pub fn format_size(bytes: i64) -> String {
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0.00 bytes");
        assert_eq!(format_size(1023), "1023.00 bytes");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024_i64.pow(3)), "3.00 GB");
        assert_eq!(format_size(2 * 1024_i64.pow(4)), "2.00 TB");
        assert_eq!(format_size(2048 * 1024_i64.pow(4)), "2048.00 TB");
    }
}
