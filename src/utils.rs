/// Shared utility functions for the scanner
///
/// Small reusable helpers used across the detection pipeline, worker pool and
/// formatters to avoid duplication and keep behavior consistent.
use crate::constants::BINARY_SNIFF_LEN;
use crate::types::PIType;

/// Keep only ASCII digits. Checksum validators normalize input through this.
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Mask a raw match for display: first char + asterisks + last char.
///
/// Credit cards keep their last four digits instead, the widely expected
/// receipt form. One- and two-character values are fully masked.
pub fn mask_value(pi_type: PIType, raw: &str) -> String {
    if pi_type == PIType::CreditCard {
        let digits = strip_non_digits(raw);
        if digits.len() >= 4 {
            let last4 = &digits[digits.len() - 4..];
            return format!("{}{}", "*".repeat(digits.len() - 4), last4);
        }
    }

    let chars: Vec<char> = raw.chars().collect();
    match chars.len() {
        0 => String::new(),
        1 | 2 => "*".repeat(chars.len()),
        n => {
            let mut masked = String::with_capacity(n);
            masked.push(chars[0]);
            masked.push_str(&"*".repeat(n - 2));
            masked.push(chars[n - 1]);
            masked
        }
    }
}

/// A NUL byte in the leading window marks the content as binary.
pub fn is_binary_content(bytes: &[u8]) -> bool {
    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    sniff.contains(&0)
}

/// Line count as the worker pool reports it: newline bytes + 1.
pub fn count_lines(bytes: &[u8]) -> u64 {
    bytes.iter().filter(|b| **b == b'\n').count() as u64 + 1
}

/// Normalize a repo-relative path to forward slashes.
pub fn normalize_rel_path(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_default_policy() {
        assert_eq!(mask_value(PIType::Tfn, "123456782"), "1*******2");
        assert_eq!(mask_value(PIType::Email, "ab"), "**");
        assert_eq!(mask_value(PIType::Name, ""), "");
    }

    #[test]
    fn test_mask_credit_card_keeps_last_four() {
        let masked = mask_value(PIType::CreditCard, "4532-1234-5678-9010");
        assert!(masked.ends_with("9010"));
        assert!(!masked.contains("4532"));
    }

    #[test]
    fn test_binary_sniff_window() {
        assert!(is_binary_content(b"ab\0cd"));
        assert!(!is_binary_content(b"plain text"));

        // NUL beyond the sniff window does not count
        let mut bytes = vec![b'a'; BINARY_SNIFF_LEN];
        bytes.push(0);
        assert!(!is_binary_content(&bytes));
    }

    #[test]
    fn test_count_lines_includes_empty_file() {
        assert_eq!(count_lines(b""), 1);
        assert_eq!(count_lines(b"one line"), 1);
        assert_eq!(count_lines(b"a\nb\nc"), 3);
        assert_eq!(count_lines(b"trailing\n"), 2);
    }

    #[test]
    fn test_normalize_rel_path() {
        assert_eq!(normalize_rel_path("src\\user.go"), "src/user.go");
        assert_eq!(normalize_rel_path("src/user.go"), "src/user.go");
    }
}
