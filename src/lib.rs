// Library exports for the PI scanner
//
// The detection core (patterns, validators, context analysis, risk scoring)
// is usable as a library; the binary wires it to the CLI.

pub mod config;
pub mod constants;
pub mod context;
pub mod detection;
pub mod error;
pub mod file_processor;
pub mod patterns;
pub mod report;
pub mod risk_assessment;
pub mod scanner;
pub mod testdata;
pub mod types;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use config::ScanConfig;
pub use detection::{DetectionPipeline, Detector};
pub use error::ScanError;
pub use file_processor::{FileJob, FileProcessor, FileResult};
pub use report::{EmissionAssembler, ScanReport, ScanSummary};
pub use risk_assessment::{ComplianceFlags, RiskAssessment, RiskLevel, RiskScorer};
pub use scanner::Scanner;
pub use types::{Environment, FileStats, Finding, PIType};
pub use validators::Validators;
