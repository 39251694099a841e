// Detection pipeline: pattern scan, checksum validation, context analysis
//
// Runs strictly sequentially within a file, which keeps per-file output
// deterministic without locks. Pure given (bytes, filename, rules,
// validators): no I/O, no global state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::config::ScanConfig;
use crate::context::ContextAnalyzer;
use crate::error::ScanError;
use crate::patterns::PatternEngine;
use crate::types::{Finding, PIType};
use crate::utils::normalize_rel_path;
use crate::validators::Validators;

/// A named detection capability. The built-in pipeline is the primary
/// implementation; alternates (e.g. a semantic validator stage) conform to
/// the same contract and slot in without changing callers.
#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, bytes: &[u8], filename: &str) -> anyhow::Result<Vec<Finding>>;
}

/// Orchestrates pattern engine, validators and context analyzer per file.
pub struct DetectionPipeline {
    engine: PatternEngine,
    validators: Validators,
    analyzer: ContextAnalyzer,
}

impl DetectionPipeline {
    /// Build from configuration. Rule compile failures abort startup with
    /// the complete list of failing rule ids.
    pub fn from_config(config: &ScanConfig) -> Result<Self, Vec<ScanError>> {
        let engine = PatternEngine::new(&config.rules_overrides)?;
        let validators = Validators::with_bsb_prefixes(config.bank_bsb_prefixes.clone());
        Ok(Self {
            engine,
            validators,
            analyzer: ContextAnalyzer::new(),
        })
    }

    pub fn with_engine(engine: PatternEngine, validators: Validators) -> Self {
        Self {
            engine,
            validators,
            analyzer: ContextAnalyzer::new(),
        }
    }

    /// Detect findings in one file.
    ///
    /// The cancellation flag is honored between the pattern scan and context
    /// analysis; a file already past that point completes.
    pub fn detect_file(
        &self,
        bytes: &[u8],
        filename: &str,
        cancel: &AtomicBool,
    ) -> Result<Vec<Finding>, ScanError> {
        let file = normalize_rel_path(filename);
        let candidates = self.engine.scan(bytes, &file);

        if cancel.load(Ordering::Relaxed) {
            return Err(ScanError::Cancelled);
        }

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let content = String::from_utf8_lossy(bytes);
        let lines: Vec<&str> = content.lines().collect();

        let mut findings = Vec::new();
        for candidate in candidates {
            let validated = self.validators.validate(candidate.pi_type, &candidate.matched);

            // Checksummed identifiers that fail their algorithm are noise,
            // as are BSBs outside the known-bank table.
            let gated = candidate.pi_type.has_checksum() || candidate.pi_type == PIType::Bsb;
            if gated && !validated && !candidate.pattern_only {
                trace!(
                    rule = %candidate.rule_id,
                    file = %file,
                    line = candidate.line,
                    "candidate failed validation, dropped"
                );
                continue;
            }
            let validated = validated && candidate.pi_type.has_checksum();

            let keywords = self
                .engine
                .rule(&candidate.rule_id)
                .map(|r| r.proximity_keywords.as_slice())
                .unwrap_or(&[]);

            let verdict =
                self.analyzer
                    .analyze(&candidate, keywords, &lines, &file, validated);
            if !verdict.keep {
                trace!(
                    rule = %candidate.rule_id,
                    file = %file,
                    line = candidate.line,
                    "candidate suppressed by context"
                );
                continue;
            }

            let confidence =
                (candidate.base_confidence + verdict.confidence_delta).clamp(0.0, 1.0);

            findings.push(Finding {
                pi_type: candidate.pi_type,
                matched: candidate.matched,
                file: file.clone(),
                line: candidate.line,
                column: candidate.column,
                context_snippet: self.analyzer.snippet(&lines, candidate.line),
                validated,
                confidence,
                detector_names: vec![candidate.rule_id],
                environment: verdict.environment,
                in_comment: verdict.in_comment,
                in_string: verdict.in_string,
                has_proximity_keyword: verdict.has_proximity_keyword,
                risk: None,
            });
        }

        let findings = dedupe(findings);
        debug!(file = %file, count = findings.len(), "file detection complete");
        Ok(findings)
    }
}

#[async_trait]
impl Detector for DetectionPipeline {
    fn name(&self) -> &str {
        "au-pi-pipeline"
    }

    async fn detect(&self, bytes: &[u8], filename: &str) -> anyhow::Result<Vec<Finding>> {
        let never = AtomicBool::new(false);
        Ok(self.detect_file(bytes, filename, &never)?)
    }
}

/// Merge findings sharing (file, line, column, pi_type): maximum confidence
/// wins, detector names accumulate. First-seen order is preserved so the
/// per-file output stays deterministic.
fn dedupe(findings: Vec<Finding>) -> Vec<Finding> {
    let mut merged: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut index: HashMap<(String, usize, usize, PIType), usize> = HashMap::new();

    for finding in findings {
        let key = (
            finding.file.clone(),
            finding.line,
            finding.column,
            finding.pi_type,
        );
        match index.get(&key) {
            Some(&i) => {
                let kept = &mut merged[i];
                kept.confidence = kept.confidence.max(finding.confidence);
                kept.validated = kept.validated || finding.validated;
                for name in finding.detector_names {
                    if !kept.detector_names.contains(&name) {
                        kept.detector_names.push(name);
                    }
                }
                kept.detector_names.sort();
            }
            None => {
                index.insert(key, merged.len());
                merged.push(finding);
            }
        }
    }

    merged
}
