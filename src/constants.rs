/// Application-wide constants
///
/// This module centralizes the checksum weights, risk weights, thresholds and
/// scan limits so tuning happens in one place.
// ============================================================================
// Checksum Weights
// ============================================================================

/// TFN digit weights (9 digits, weighted sum must be divisible by 11)
pub const TFN_WEIGHTS: [u32; 9] = [1, 4, 3, 7, 5, 8, 6, 9, 10];

/// ABN digit weights (11 digits, first digit reduced by one, sum mod 89 == 0)
pub const ABN_WEIGHTS: [u32; 11] = [10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19];

/// ACN digit weights over the first 8 digits; digit 9 is the check digit
pub const ACN_WEIGHTS: [u32; 8] = [8, 7, 6, 5, 4, 3, 2, 1];

/// Medicare digit weights over the first 8 digits; digit 9 is the check digit
pub const MEDICARE_WEIGHTS: [u32; 8] = [1, 3, 7, 9, 1, 3, 7, 9];

/// BSB prefixes of the major Australian banks, used as the default
/// known-bank set. Overridable through `ScanConfig::bank_bsb_prefixes`.
pub const DEFAULT_BSB_PREFIXES: [&str; 13] = [
    "01", // ANZ
    "03", // Westpac
    "06", // Commonwealth Bank
    "08", // NAB
    "10", // BankSA
    "11", // St George
    "12", // Bank of Queensland
    "14", // Rabobank
    "15", // Town & Country
    "30", // Bankwest
    "33", // St George NSW
    "34", // HSBC
    "73", // Westpac savings
];

// ============================================================================
// Context Analysis
// ============================================================================

/// Lines inspected either side of a candidate for test/mock indicators
pub const TEST_INDICATOR_WINDOW: usize = 5;

/// Lines inspected either side of a candidate for proximity keywords
pub const PROXIMITY_WINDOW: usize = 3;

/// Lines captured either side of a match for the context snippet
pub const SNIPPET_WINDOW: usize = 5;

/// Confidence boost when a rule proximity keyword appears near the match
pub const PROXIMITY_CONFIDENCE_BOOST: f64 = 0.15;

/// Confidence boost when the checksum validator confirmed the match
pub const CHECKSUM_CONFIDENCE_BOOST: f64 = 0.10;

/// Minimum length of a monotone or constant digit run treated as synthetic
pub const SEQUENTIAL_RUN_LEN: usize = 6;

// ============================================================================
// Risk Scoring
// ============================================================================

/// Likelihood multiplier for findings in production code
pub const ENV_MULTIPLIER_PRODUCTION: f64 = 1.0;

/// Likelihood multiplier for findings in test code
pub const ENV_MULTIPLIER_TEST: f64 = 0.5;

/// Likelihood multiplier for findings in mock/demo data
pub const ENV_MULTIPLIER_MOCK: f64 = 0.3;

/// Default exposure for repository files
pub const EXPOSURE_DEFAULT: f64 = 0.8;

/// Exposure for configuration paths
pub const EXPOSURE_CONFIG: f64 = 0.9;

/// Exposure for test paths
pub const EXPOSURE_TEST: f64 = 0.3;

/// Risk bucket lower bound: CRITICAL
pub const RISK_THRESHOLD_CRITICAL: f64 = 0.80;

/// Risk bucket lower bound: HIGH
pub const RISK_THRESHOLD_HIGH: f64 = 0.60;

/// Risk bucket lower bound: MEDIUM
pub const RISK_THRESHOLD_MEDIUM: f64 = 0.40;

/// Per co-occurring finding increment of the proximity bonus
pub const PROXIMITY_BONUS_STEP: f64 = 0.25;

/// Line distance within which findings count as co-occurring
pub const PROXIMITY_BONUS_WINDOW: i64 = 5;

// ============================================================================
// Scan Limits
// ============================================================================

/// Maximum file size scanned by default (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Bytes sniffed for NUL when deciding whether a file is binary
pub const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// Job queue capacity per worker
pub const QUEUE_CAPACITY_PER_WORKER: usize = 10;

/// Grace period for worker shutdown (in milliseconds)
pub const SHUTDOWN_GRACE_MS: u64 = 5_000;
