// Emission assembler and report formatters
//
// Collects scored findings and per-file errors into a scan report, imposes
// the one total order reporters rely on (risk desc, file asc, line asc) and
// renders CSV and SARIF 2.1.0. Only masked values leave this module.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::ScanError;
use crate::file_processor::FileResult;
use crate::risk_assessment::RiskLevel;
use crate::types::{Environment, Finding, PIType};

/// A per-file error surfaced in the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub file: String,
    pub error: ScanError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl RiskLevelCounts {
    fn bump(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Critical => self.critical += 1,
        }
    }
}

/// Scan-level rollup handed to reporters together with the findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files_scanned: u64,
    pub bytes_scanned: u64,
    pub findings_total: usize,
    pub by_risk_level: RiskLevelCounts,
    pub by_pi_type: BTreeMap<String, usize>,
    pub validated_count: usize,
    pub test_data_count: usize,
    pub top_files: Vec<(String, usize)>,
    pub errors: Vec<FileError>,
}

/// The core's final output: summary plus totally ordered findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub summary: ScanSummary,
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// Copy with every raw match replaced by its masked form, for
    /// persistence outside the core.
    pub fn sanitized(&self) -> ScanReport {
        let mut clone = self.clone();
        for finding in &mut clone.findings {
            finding.matched = finding.masked();
        }
        clone
    }
}

/// Accumulates worker results during a scan and assembles the report.
pub struct EmissionAssembler {
    scan_id: Uuid,
    started_at: DateTime<Utc>,
    findings: Vec<Finding>,
    errors: Vec<FileError>,
    files_scanned: u64,
    bytes_scanned: u64,
}

impl Default for EmissionAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl EmissionAssembler {
    pub fn new() -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            started_at: Utc::now(),
            findings: Vec::new(),
            errors: Vec::new(),
            files_scanned: 0,
            bytes_scanned: 0,
        }
    }

    pub fn add_result(&mut self, result: FileResult) {
        match result.error {
            Some(error) => self.errors.push(FileError { file: result.path, error }),
            None => {
                self.files_scanned += 1;
                self.bytes_scanned += result.stats.bytes_processed;
                self.findings.extend(result.findings);
            }
        }
    }

    /// Borrow the findings collected so far, e.g. for scoring.
    pub fn findings_mut(&mut self) -> &mut Vec<Finding> {
        &mut self.findings
    }

    /// Produce the summary and the sorted findings stream.
    pub fn finish(mut self) -> ScanReport {
        self.findings.sort_by(|a, b| {
            risk_of(b)
                .cmp(&risk_of(a))
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line.cmp(&b.line))
        });

        let mut by_risk_level = RiskLevelCounts::default();
        let mut by_pi_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut per_file: BTreeMap<String, usize> = BTreeMap::new();
        let mut validated_count = 0;
        let mut test_data_count = 0;

        for finding in &self.findings {
            by_risk_level.bump(risk_of(finding));
            *by_pi_type.entry(finding.pi_type.to_string()).or_insert(0) += 1;
            *per_file.entry(finding.file.clone()).or_insert(0) += 1;
            if finding.validated {
                validated_count += 1;
            }
            if matches!(finding.environment, Environment::Test | Environment::Mock) {
                test_data_count += 1;
            }
        }

        let mut top_files: Vec<(String, usize)> = per_file.into_iter().collect();
        top_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_files.truncate(5);

        let summary = ScanSummary {
            scan_id: self.scan_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            files_scanned: self.files_scanned,
            bytes_scanned: self.bytes_scanned,
            findings_total: self.findings.len(),
            by_risk_level,
            by_pi_type,
            validated_count,
            test_data_count,
            top_files,
            errors: self.errors,
        };

        ScanReport {
            summary,
            findings: self.findings,
        }
    }
}

fn risk_of(finding: &Finding) -> RiskLevel {
    finding
        .risk
        .as_ref()
        .map(|r| r.risk_level)
        .unwrap_or(RiskLevel::Low)
}

// ============================================================================
// CSV
// ============================================================================

/// Fixed column order; consumers parse this by position.
const CSV_HEADERS: [&str; 13] = [
    "risk_level",
    "pi_type",
    "file",
    "line",
    "column",
    "value_masked",
    "validated",
    "confidence",
    "environment",
    "detectors",
    "apra_reporting",
    "privacy_act_breach",
    "notifiable_data_breach",
];

pub fn write_csv<W: Write>(report: &ScanReport, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADERS).context("writing csv header")?;

    for finding in &report.findings {
        let flags = finding
            .risk
            .as_ref()
            .map(|r| r.compliance_flags)
            .unwrap_or_default();
        out.write_record([
            risk_of(finding).to_string(),
            finding.pi_type.to_string(),
            finding.file.clone(),
            finding.line.to_string(),
            finding.column.to_string(),
            finding.masked(),
            finding.validated.to_string(),
            format!("{:.2}", finding.confidence),
            finding.environment.to_string(),
            finding.detector_names.join(";"),
            flags.apra_reporting.to_string(),
            flags.privacy_act_breach.to_string(),
            flags.notifiable_data_breach.to_string(),
        ])
        .context("writing csv record")?;
    }

    out.flush().context("flushing csv")?;
    Ok(())
}

// ============================================================================
// SARIF 2.1.0
// ============================================================================

fn sarif_level(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical | RiskLevel::High => "error",
        RiskLevel::Medium => "warning",
        RiskLevel::Low => "note",
    }
}

pub fn to_sarif(report: &ScanReport) -> serde_json::Value {
    let rules: Vec<serde_json::Value> = PIType::all()
        .iter()
        .map(|t| {
            json!({
                "id": t.rule_id(),
                "name": t.display_name().replace(' ', ""),
                "shortDescription": { "text": format!("{} detected", t.display_name()) },
            })
        })
        .collect();

    let results: Vec<serde_json::Value> = report
        .findings
        .iter()
        .map(|f| {
            json!({
                "ruleId": f.pi_type.rule_id(),
                "level": sarif_level(risk_of(f)),
                "message": {
                    "text": format!(
                        "{} {} in {} (confidence {:.2})",
                        f.pi_type.display_name(),
                        f.masked(),
                        f.environment,
                        f.confidence
                    )
                },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": f.file },
                        "region": { "startLine": f.line, "startColumn": f.column }
                    }
                }]
            })
        })
        .collect();

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "pi-scanner",
                    "version": env!("CARGO_PKG_VERSION"),
                    "informationUri": "https://github.com/pi-scanner/pi-scanner",
                    "rules": rules,
                }
            },
            "results": results,
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::risk_assessment::RiskScorer;
    use crate::types::FileStats;

    fn finding(pi_type: PIType, file: &str, line: usize, confidence: f64) -> Finding {
        Finding {
            pi_type,
            matched: "123456782".to_string(),
            file: file.to_string(),
            line,
            column: 1,
            context_snippet: String::new(),
            validated: pi_type.has_checksum(),
            confidence,
            detector_names: vec!["tfn".to_string()],
            environment: Environment::Production,
            in_comment: false,
            in_string: false,
            has_proximity_keyword: true,
            risk: None,
        }
    }

    fn ok_result(path: &str, findings: Vec<Finding>) -> FileResult {
        FileResult {
            path: path.to_string(),
            findings,
            stats: FileStats { bytes_processed: 100, lines_processed: 10, duration_ms: 1 },
            error: None,
        }
    }

    fn scored_report() -> ScanReport {
        let mut assembler = EmissionAssembler::new();
        assembler.add_result(ok_result(
            "src/b.go",
            vec![finding(PIType::Email, "src/b.go", 3, 0.9)],
        ));
        assembler.add_result(ok_result(
            "src/a.go",
            vec![
                finding(PIType::Tfn, "src/a.go", 10, 0.95),
                finding(PIType::Name, "src/a.go", 11, 0.55),
            ],
        ));
        assembler.add_result(FileResult {
            path: "blob.bin".to_string(),
            findings: Vec::new(),
            stats: FileStats::default(),
            error: Some(ScanError::BinarySkipped),
        });

        RiskScorer::new(&ScanConfig::default()).score(assembler.findings_mut());
        assembler.finish()
    }

    #[test]
    fn test_summary_totals() {
        let report = scored_report();
        let summary = &report.summary;

        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.findings_total, 3);
        assert_eq!(summary.by_pi_type["TFN"], 1);
        assert_eq!(summary.validated_count, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.top_files[0].0, "src/a.go");
    }

    #[test]
    fn test_findings_sorted_risk_desc_then_file_then_line() {
        let report = scored_report();
        let levels: Vec<RiskLevel> = report
            .findings
            .iter()
            .map(|f| f.risk.as_ref().unwrap().risk_level)
            .collect();
        let mut expected = levels.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(levels, expected);
        assert_eq!(report.findings[0].pi_type, PIType::Tfn);
    }

    #[test]
    fn test_csv_masks_and_orders_columns() {
        let report = scored_report();
        let mut buffer = Vec::new();
        write_csv(&report, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADERS.join(","));
        assert_eq!(lines.count(), 3);
        assert!(!text.contains("123456782"), "raw values must not leak");
        assert!(text.contains("1*******2"));
    }

    #[test]
    fn test_sarif_shape() {
        let report = scored_report();
        let sarif = to_sarif(&report);

        assert_eq!(sarif["version"], "2.1.0");
        let run = &sarif["runs"][0];
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 13);

        let results = run["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        let tfn = results
            .iter()
            .find(|r| r["ruleId"] == "PI001")
            .expect("tfn result present");
        assert_eq!(tfn["level"], "error");
        assert!(!tfn["message"]["text"]
            .as_str()
            .unwrap()
            .contains("123456782"));
    }

    #[test]
    fn test_sanitized_report_masks_matches() {
        let report = scored_report().sanitized();
        assert!(report.findings.iter().all(|f| !f.matched.contains("123456782")));
    }
}
