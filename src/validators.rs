// Checksum and format validation for Australian identifiers
//
// One validator per PI type. All of them are deterministic, allocation-free
// after input normalization and side-effect-free: malformed input returns
// false, never an error.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::{
    ABN_WEIGHTS, ACN_WEIGHTS, DEFAULT_BSB_PREFIXES, MEDICARE_WEIGHTS, TFN_WEIGHTS,
};
use crate::types::PIType;
use crate::utils::strip_non_digits;

lazy_static! {
    static ref EMAIL_FORM: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap();
    static ref PASSPORT_FORM: Regex = Regex::new(r"^[A-Za-z]{1,2}\d{7}$").unwrap();
    static ref DRIVER_LICENSE_FORM: Regex = Regex::new(r"^[A-Za-z0-9]{6,10}$").unwrap();
    static ref NAME_FORM: Regex =
        Regex::new(r"^[A-Z][a-z]+(?: [A-Z]\.?)? [A-Z][a-z]+$").unwrap();
    static ref ADDRESS_FORM: Regex = Regex::new(
        r"(?i)^\d+[a-z]?(?:/\d+)?\s+[A-Za-z'\- ]+\s+(?:Street|St|Road|Rd|Avenue|Ave|Drive|Dr|Court|Ct|Place|Pl|Parade|Pde|Crescent|Cres|Lane|Ln|Highway|Hwy|Terrace|Tce|Boulevard|Blvd|Way|Close|Cl)\b.*$"
    )
    .unwrap();
}

/// Validator set shared read-only by all workers. Only the BSB bank-prefix
/// table is configurable; everything else is fixed by the algorithms.
#[derive(Debug, Clone)]
pub struct Validators {
    bsb_prefixes: BTreeSet<String>,
}

impl Default for Validators {
    fn default() -> Self {
        Self {
            bsb_prefixes: DEFAULT_BSB_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Validators {
    pub fn with_bsb_prefixes(prefixes: BTreeSet<String>) -> Self {
        if prefixes.is_empty() {
            return Self::default();
        }
        Self { bsb_prefixes: prefixes }
    }

    /// Dispatch to the validator for `pi_type`.
    ///
    /// For types without a checksum this is the tighter surface-form check
    /// the pattern rules rely on.
    pub fn validate(&self, pi_type: PIType, raw: &str) -> bool {
        match pi_type {
            PIType::Tfn => validate_tfn(raw),
            PIType::Abn => validate_abn(raw),
            PIType::Acn => validate_acn(raw),
            PIType::Medicare => validate_medicare(raw),
            PIType::Bsb => self.validate_bsb(raw),
            PIType::CreditCard => validate_credit_card(raw),
            PIType::DriverLicense => DRIVER_LICENSE_FORM.is_match(raw.trim())
                && raw.chars().any(|c| c.is_ascii_digit()),
            PIType::Passport => PASSPORT_FORM.is_match(raw.trim()),
            PIType::Email => EMAIL_FORM.is_match(raw.trim()),
            PIType::Phone => validate_phone(raw),
            PIType::Name => NAME_FORM.is_match(raw.trim()),
            PIType::Address => ADDRESS_FORM.is_match(raw.trim()),
            PIType::Ip => validate_ip(raw),
        }
    }

    fn validate_bsb(&self, raw: &str) -> bool {
        let digits = strip_non_digits(raw);
        if digits.len() != 6 {
            return false;
        }
        self.bsb_prefixes.contains(&digits[..2])
    }
}

/// TFN: 9 digits, weighted sum divisible by 11.
pub fn validate_tfn(raw: &str) -> bool {
    let digits = strip_non_digits(raw);
    if digits.len() != TFN_WEIGHTS.len() {
        return false;
    }

    let sum: u32 = digits
        .bytes()
        .zip(TFN_WEIGHTS.iter())
        .map(|(d, w)| (d - b'0') as u32 * w)
        .sum();

    sum % 11 == 0
}

/// ABN: 11 digits, first digit reduced by one, weighted sum divisible by 89.
pub fn validate_abn(raw: &str) -> bool {
    let digits = strip_non_digits(raw);
    if digits.len() != ABN_WEIGHTS.len() {
        return false;
    }

    let mut sum: i64 = 0;
    for (i, (d, w)) in digits.bytes().zip(ABN_WEIGHTS.iter()).enumerate() {
        let mut value = (d - b'0') as i64;
        if i == 0 {
            value -= 1;
        }
        sum += value * *w as i64;
    }

    sum % 89 == 0
}

/// ACN: 9 digits, complement of the weighted sum over the first 8 digits
/// must equal the check digit.
pub fn validate_acn(raw: &str) -> bool {
    let digits = strip_non_digits(raw);
    if digits.len() != 9 {
        return false;
    }

    let bytes = digits.as_bytes();
    let sum: u32 = bytes[..8]
        .iter()
        .zip(ACN_WEIGHTS.iter())
        .map(|(d, w)| (d - b'0') as u32 * w)
        .sum();

    let complement = (10 - (sum % 10)) % 10;
    complement == (bytes[8] - b'0') as u32
}

/// Medicare: 10 or 11 digits, first digit 2-6, weighted sum over the first 8
/// digits mod 10 must equal digit 9. The issue number is not checksummed.
pub fn validate_medicare(raw: &str) -> bool {
    let digits = strip_non_digits(raw);
    if digits.len() != 10 && digits.len() != 11 {
        return false;
    }

    let bytes = digits.as_bytes();
    let first = bytes[0] - b'0';
    if !(2..=6).contains(&first) {
        return false;
    }

    let sum: u32 = bytes[..8]
        .iter()
        .zip(MEDICARE_WEIGHTS.iter())
        .map(|(d, w)| (d - b'0') as u32 * w)
        .sum();

    sum % 10 == (bytes[8] - b'0') as u32
}

/// Credit card: standard Luhn over 13-19 stripped digits.
pub fn validate_credit_card(raw: &str) -> bool {
    // Doubled digit with the two-digit results folded back (18 -> 9)
    const LUHN_DOUBLED: [u32; 10] = [0, 2, 4, 6, 8, 1, 3, 5, 7, 9];

    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }

    let total: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(pos, &d)| {
            if pos % 2 == 1 {
                LUHN_DOUBLED[d as usize]
            } else {
                d
            }
        })
        .sum();

    total % 10 == 0
}

/// Phone: AU mobile, landline, or 13/1300/1800 service shapes.
pub fn validate_phone(raw: &str) -> bool {
    let mut digits = strip_non_digits(raw);

    // International prefix folds back to the domestic form
    if digits.len() == 11 && digits.starts_with("61") {
        digits = format!("0{}", &digits[2..]);
    }

    match digits.len() {
        6 => digits.starts_with("13"),
        10 => {
            digits.starts_with("04")
                || digits.starts_with("02")
                || digits.starts_with("03")
                || digits.starts_with("07")
                || digits.starts_with("08")
                || digits.starts_with("1300")
                || digits.starts_with("1800")
        }
        _ => false,
    }
}

/// IP: valid dotted-quad.
pub fn validate_ip(raw: &str) -> bool {
    let parts: Vec<&str> = raw.trim().split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts
        .iter()
        .all(|p| !p.is_empty() && p.len() <= 3 && p.parse::<u8>().is_ok())
}
