// Generators for checksum-valid Australian identifiers
//
// Used by the validator round-trip tests and by `pi-scanner validate
// --sample` to produce demonstration values. Generated numbers are
// syntactically valid but random; they do not belong to anyone.

use rand::Rng;

use crate::constants::{ABN_WEIGHTS, ACN_WEIGHTS, MEDICARE_WEIGHTS, TFN_WEIGHTS};

/// Random TFN passing the mod-11 weight check.
pub fn generate_tfn<R: Rng>(rng: &mut R) -> String {
    loop {
        let mut digits: Vec<u32> = (0..8).map(|_| rng.gen_range(0..10)).collect();
        let sum: u32 = digits
            .iter()
            .zip(TFN_WEIGHTS.iter())
            .map(|(d, w)| d * w)
            .sum();
        // Last weight is 10 == -1 mod 11, so the check digit is sum mod 11
        let check = sum % 11;
        if check <= 9 {
            digits.push(check);
            return digits.iter().map(|d| d.to_string()).collect();
        }
    }
}

/// Random ABN passing the mod-89 weight check.
pub fn generate_abn<R: Rng>(rng: &mut R) -> String {
    loop {
        let digits: Vec<u32> = (0..11).map(|_| rng.gen_range(0..10)).collect();
        let sum: i64 = digits
            .iter()
            .zip(ABN_WEIGHTS.iter())
            .enumerate()
            .map(|(i, (d, w))| {
                let mut value = *d as i64;
                if i == 0 {
                    value -= 1;
                }
                value * *w as i64
            })
            .sum();
        if sum % 89 == 0 {
            return digits.iter().map(|d| d.to_string()).collect();
        }
    }
}

/// Random ACN; the ninth digit is derived, so every draw is valid.
pub fn generate_acn<R: Rng>(rng: &mut R) -> String {
    let mut digits: Vec<u32> = (0..8).map(|_| rng.gen_range(0..10)).collect();
    let sum: u32 = digits
        .iter()
        .zip(ACN_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    digits.push((10 - (sum % 10)) % 10);
    digits.iter().map(|d| d.to_string()).collect()
}

/// Random 10-digit Medicare number: derived check digit plus issue number.
pub fn generate_medicare<R: Rng>(rng: &mut R) -> String {
    let mut digits: Vec<u32> = Vec::with_capacity(10);
    digits.push(rng.gen_range(2..7));
    for _ in 0..7 {
        digits.push(rng.gen_range(0..10));
    }
    let sum: u32 = digits
        .iter()
        .zip(MEDICARE_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    digits.push(sum % 10);
    digits.push(rng.gen_range(1..10)); // issue number
    digits.iter().map(|d| d.to_string()).collect()
}

/// Flip the last digit, breaking any of the checksums above.
pub fn corrupt_last_digit(value: &str) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    if let Some(last) = chars.last_mut() {
        if let Some(d) = last.to_digit(10) {
            *last = char::from_digit((d + 1) % 10, 10).unwrap();
        }
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_identifiers_validate() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            assert!(validators::validate_tfn(&generate_tfn(&mut rng)));
            assert!(validators::validate_abn(&generate_abn(&mut rng)));
            assert!(validators::validate_acn(&generate_acn(&mut rng)));
            assert!(validators::validate_medicare(&generate_medicare(&mut rng)));
        }
    }

    #[test]
    fn test_corrupt_last_digit_breaks_tfn() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let tfn = generate_tfn(&mut rng);
            assert!(!validators::validate_tfn(&corrupt_last_digit(&tfn)));
        }
    }
}
