// Core types for PI detection results
//
// A Finding is the central record: one detected piece of Australian PI with
// its location, confidence and (after scoring) risk assessment. Findings are
// created per file by the detection pipeline and never persisted by the core.

use serde::{Deserialize, Serialize};

use crate::risk_assessment::RiskAssessment;

/// The closed set of PI types this scanner knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PIType {
    Tfn,
    Abn,
    Acn,
    Medicare,
    Bsb,
    CreditCard,
    DriverLicense,
    Passport,
    Email,
    Phone,
    Name,
    Address,
    Ip,
}

impl PIType {
    /// All variants in declaration order. Drives rule registration and
    /// summary breakdowns.
    pub fn all() -> &'static [PIType] {
        &[
            PIType::Tfn,
            PIType::Abn,
            PIType::Acn,
            PIType::Medicare,
            PIType::Bsb,
            PIType::CreditCard,
            PIType::DriverLicense,
            PIType::Passport,
            PIType::Email,
            PIType::Phone,
            PIType::Name,
            PIType::Address,
            PIType::Ip,
        ]
    }

    /// Whether an algorithmic checksum exists for this type.
    pub fn has_checksum(&self) -> bool {
        matches!(
            self,
            PIType::Tfn | PIType::Abn | PIType::Acn | PIType::Medicare | PIType::CreditCard
        )
    }

    /// Base impact score used by the risk scorer.
    pub fn impact(&self) -> f64 {
        match self {
            PIType::Tfn => 1.00,
            PIType::Medicare => 0.95,
            PIType::CreditCard => 0.95,
            PIType::Passport => 0.90,
            PIType::Bsb => 0.80,
            PIType::DriverLicense => 0.75,
            PIType::Abn => 0.70,
            PIType::Acn => 0.70,
            PIType::Address => 0.60,
            PIType::Phone => 0.50,
            PIType::Email => 0.40,
            PIType::Name => 0.30,
            PIType::Ip => 0.20,
        }
    }

    /// Stable reporting rule id (used by the SARIF formatter).
    pub fn rule_id(&self) -> &'static str {
        match self {
            PIType::Tfn => "PI001",
            PIType::Abn => "PI002",
            PIType::Acn => "PI003",
            PIType::Medicare => "PI004",
            PIType::Bsb => "PI005",
            PIType::CreditCard => "PI006",
            PIType::DriverLicense => "PI007",
            PIType::Passport => "PI008",
            PIType::Email => "PI009",
            PIType::Phone => "PI010",
            PIType::Name => "PI011",
            PIType::Address => "PI012",
            PIType::Ip => "PI013",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PIType::Tfn => "Tax File Number",
            PIType::Abn => "Australian Business Number",
            PIType::Acn => "Australian Company Number",
            PIType::Medicare => "Medicare Number",
            PIType::Bsb => "BSB Code",
            PIType::CreditCard => "Credit Card Number",
            PIType::DriverLicense => "Driver License",
            PIType::Passport => "Passport Number",
            PIType::Email => "Email Address",
            PIType::Phone => "Phone Number",
            PIType::Name => "Personal Name",
            PIType::Address => "Street Address",
            PIType::Ip => "IP Address",
        }
    }
}

impl std::str::FromStr for PIType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TFN" => Ok(PIType::Tfn),
            "ABN" => Ok(PIType::Abn),
            "ACN" => Ok(PIType::Acn),
            "MEDICARE" => Ok(PIType::Medicare),
            "BSB" => Ok(PIType::Bsb),
            "CREDIT_CARD" | "CREDITCARD" => Ok(PIType::CreditCard),
            "DRIVER_LICENSE" | "LICENSE" | "LICENCE" => Ok(PIType::DriverLicense),
            "PASSPORT" => Ok(PIType::Passport),
            "EMAIL" => Ok(PIType::Email),
            "PHONE" => Ok(PIType::Phone),
            "NAME" => Ok(PIType::Name),
            "ADDRESS" => Ok(PIType::Address),
            "IP" => Ok(PIType::Ip),
            other => Err(format!("unknown PI type: {other}")),
        }
    }
}

impl std::fmt::Display for PIType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            PIType::Tfn => "TFN",
            PIType::Abn => "ABN",
            PIType::Acn => "ACN",
            PIType::Medicare => "MEDICARE",
            PIType::Bsb => "BSB",
            PIType::CreditCard => "CREDIT_CARD",
            PIType::DriverLicense => "DRIVER_LICENSE",
            PIType::Passport => "PASSPORT",
            PIType::Email => "EMAIL",
            PIType::Phone => "PHONE",
            PIType::Name => "NAME",
            PIType::Address => "ADDRESS",
            PIType::Ip => "IP",
        };
        write!(f, "{}", tag)
    }
}

/// Deployment context inferred for a finding. Test and mock data stay in the
/// result set but scale likelihood down during risk scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Test,
    Mock,
    #[default]
    Unknown,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Test => write!(f, "test"),
            Environment::Mock => write!(f, "mock"),
            Environment::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single detected PI instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub pi_type: PIType,

    /// Raw captured text. Only masked forms leave the formatters.
    #[serde(rename = "match")]
    pub matched: String,

    /// Repo-relative path, forward-slash normalized.
    pub file: String,

    /// 1-based line of the match start.
    pub line: usize,

    /// 1-based code-point column of the match start on that line.
    pub column: usize,

    /// Up to ten lines of surrounding context.
    pub context_snippet: String,

    /// True iff the type has a checksum and it passed.
    pub validated: bool,

    /// Monotone non-decreasing across pipeline stages, clamped to [0, 1].
    pub confidence: f64,

    /// Rule ids that produced this finding (union after deduplication).
    pub detector_names: Vec<String>,

    pub environment: Environment,

    pub in_comment: bool,
    pub in_string: bool,
    pub has_proximity_keyword: bool,

    /// Attached by the risk scorer; None until then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskAssessment>,
}

impl Finding {
    /// Masked form of the matched text, safe for display and reports.
    pub fn masked(&self) -> String {
        crate::utils::mask_value(self.pi_type, &self.matched)
    }
}

/// Per-file processing statistics carried on every file result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStats {
    pub bytes_processed: u64,

    /// Newline count + 1, including for empty files.
    pub lines_processed: u64,

    pub duration_ms: u64,
}
