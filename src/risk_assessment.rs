// Risk scoring for detected PI
//
// Combines per-type impact, context-scaled likelihood and path-based
// exposure, boosts for co-occurring findings (a name next to a TFN next to
// an address is identity-theft material), and attaches Australian
// regulatory flags: APRA CPS 234 reporting, Privacy Act breach and
// notifiable-data-breach status.

use serde::{Deserialize, Serialize};

use crate::config::{EnvMultipliers, RiskThresholds, ScanConfig};
use crate::constants::{
    EXPOSURE_CONFIG, EXPOSURE_DEFAULT, EXPOSURE_TEST, PROXIMITY_BONUS_STEP,
    PROXIMITY_BONUS_WINDOW,
};
use crate::types::{Environment, Finding, PIType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// What the data is abused for when it leaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    IdentityTheft,
    FinancialFraud,
    MedicalPrivacy,
    BusinessExposure,
    ContactExposure,
    NetworkExposure,
}

impl RiskCategory {
    pub fn for_type(pi_type: PIType) -> Self {
        match pi_type {
            PIType::Tfn | PIType::Passport | PIType::DriverLicense => RiskCategory::IdentityTheft,
            PIType::CreditCard | PIType::Bsb => RiskCategory::FinancialFraud,
            PIType::Medicare => RiskCategory::MedicalPrivacy,
            PIType::Abn | PIType::Acn => RiskCategory::BusinessExposure,
            PIType::Email | PIType::Phone | PIType::Name | PIType::Address => {
                RiskCategory::ContactExposure
            }
            PIType::Ip => RiskCategory::NetworkExposure,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceFlags {
    /// APRA CPS 234: high-risk PI near production code paths
    pub apra_reporting: bool,
    /// Privacy Act 1988: validated government identifier in production
    pub privacy_act_breach: bool,
    /// Notifiable Data Breach scheme: critical Privacy Act breach
    pub notifiable_data_breach: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitigation {
    pub priority: u8,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: f64,
    pub risk_level: RiskLevel,
    pub impact: f64,
    pub likelihood: f64,
    pub exposure: f64,
    pub proximity_bonus: f64,
    pub risk_category: RiskCategory,
    pub compliance_flags: ComplianceFlags,
    pub mitigations: Vec<Mitigation>,
}

/// Scores a batch of findings (one file or one repo) in place.
pub struct RiskScorer {
    thresholds: RiskThresholds,
    env_multipliers: EnvMultipliers,
}

impl RiskScorer {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            thresholds: config.risk_thresholds.clone(),
            env_multipliers: config.env_multipliers.clone(),
        }
    }

    /// Attach a RiskAssessment to every finding. Findings are immutable
    /// afterwards.
    pub fn score(&self, findings: &mut [Finding]) {
        // First pass: scores and levels
        let mut levels = Vec::with_capacity(findings.len());
        for i in 0..findings.len() {
            let proximity_bonus = self.proximity_bonus(findings, i);
            let pi_type = findings[i].pi_type;
            let impact = pi_type.impact();
            let likelihood = (findings[i].confidence
                * self.env_multiplier(findings[i].environment))
            .clamp(0.0, 1.0);
            let exposure = exposure_for_path(&findings[i].file);

            let overall_risk = (impact
                * (0.5 * likelihood + 0.3 * exposure + 0.2 * proximity_bonus))
                .clamp(0.0, 1.0);
            let risk_level = self.bucket(overall_risk);
            levels.push(risk_level);

            findings[i].risk = Some(RiskAssessment {
                overall_risk,
                risk_level,
                impact,
                likelihood,
                exposure,
                proximity_bonus,
                risk_category: RiskCategory::for_type(pi_type),
                compliance_flags: ComplianceFlags::default(),
                mitigations: Vec::new(),
            });
        }

        // Second pass: compliance flags need every level in the window.
        // APRA reporting keys off the qualifying neighbor itself: it must be
        // both high-risk and in production code.
        for i in 0..findings.len() {
            let apra_reporting = (0..findings.len()).any(|j| {
                levels[j] >= RiskLevel::High
                    && findings[j].environment == Environment::Production
                    && findings[j].file == findings[i].file
                    && (findings[j].line as i64 - findings[i].line as i64).abs()
                        <= PROXIMITY_BONUS_WINDOW
            });

            let finding = &findings[i];
            let privacy_act_breach = matches!(
                finding.pi_type,
                PIType::Tfn | PIType::Medicare | PIType::Passport | PIType::DriverLicense
            ) && finding.validated
                && finding.environment == Environment::Production;
            let notifiable_data_breach =
                privacy_act_breach && levels[i] == RiskLevel::Critical;

            let mitigations = if levels[i] >= RiskLevel::High {
                mitigations_for(finding.pi_type)
            } else {
                Vec::new()
            };

            if let Some(risk) = findings[i].risk.as_mut() {
                risk.compliance_flags = ComplianceFlags {
                    apra_reporting,
                    privacy_act_breach,
                    notifiable_data_breach,
                };
                risk.mitigations = mitigations;
            }
        }
    }

    fn proximity_bonus(&self, findings: &[Finding], i: usize) -> f64 {
        let cooccurring = findings
            .iter()
            .enumerate()
            .filter(|(j, other)| {
                *j != i
                    && other.file == findings[i].file
                    && (other.line as i64 - findings[i].line as i64).abs()
                        <= PROXIMITY_BONUS_WINDOW
            })
            .count();
        (PROXIMITY_BONUS_STEP * cooccurring as f64).min(1.0)
    }

    fn env_multiplier(&self, environment: Environment) -> f64 {
        match environment {
            Environment::Production | Environment::Unknown => self.env_multipliers.production,
            Environment::Test => self.env_multipliers.test,
            Environment::Mock => self.env_multipliers.mock,
        }
    }

    fn bucket(&self, overall: f64) -> RiskLevel {
        if overall >= self.thresholds.critical {
            RiskLevel::Critical
        } else if overall >= self.thresholds.high {
            RiskLevel::High
        } else if overall >= self.thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Exposure by path class: config paths ship secrets, test paths rarely do.
fn exposure_for_path(file: &str) -> f64 {
    let lower = file.to_ascii_lowercase();
    if lower.contains("test") || lower.contains("spec") || lower.contains("fixture") {
        EXPOSURE_TEST
    } else if lower.contains("config") {
        EXPOSURE_CONFIG
    } else {
        EXPOSURE_DEFAULT
    }
}

fn mitigations_for(pi_type: PIType) -> Vec<Mitigation> {
    let actions: &[&str] = match pi_type {
        PIType::Tfn => &[
            "Remove the TFN from source control and purge it from history",
            "Rotate any credentials or records tied to the exposed TFN",
            "Store tax identifiers only in an approved secrets manager",
        ],
        PIType::Medicare => &[
            "Remove the Medicare number and purge repository history",
            "Notify the privacy officer for Privacy Act assessment",
        ],
        PIType::CreditCard => &[
            "Remove the card number and purge repository history",
            "Have the issuer cancel and reissue the card",
        ],
        PIType::Passport | PIType::DriverLicense => &[
            "Remove the document number and purge repository history",
            "Flag the document for replacement with the issuing authority",
        ],
        PIType::Bsb | PIType::Abn | PIType::Acn => &[
            "Move account and business identifiers into configuration outside source control",
        ],
        _ => &["Remove the personal data from source control and use synthetic fixtures"],
    };

    actions
        .iter()
        .enumerate()
        .map(|(i, action)| Mitigation {
            priority: (i + 1) as u8,
            action: action.to_string(),
        })
        .collect()
}
