// Pattern engine: compiled regex rules producing raw candidates
//
// Rules are compiled exactly once when the engine is built; a failing rule
// aborts startup with the offending ids. Scanning works over raw bytes so
// invalid UTF-8 never panics the pipeline, and line/column are derived from
// byte offsets in a single pass per file.

use std::collections::HashMap;

use regex::bytes::Regex;
use tracing::debug;

use crate::config::RuleOverride;
use crate::error::ScanError;
use crate::types::PIType;
use crate::utils::is_binary_content;

/// Static description of a detection rule before compilation.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub id: String,
    pub pi_type: PIType,
    pub pattern: String,
    pub proximity_keywords: Vec<String>,
    pub base_confidence: f64,
    /// Keep candidates even when the checksum validator rejects them.
    pub pattern_only: bool,
}

impl RuleSpec {
    fn new(
        id: &str,
        pi_type: PIType,
        pattern: &str,
        keywords: &[&str],
        base_confidence: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            pi_type,
            pattern: pattern.to_string(),
            proximity_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            base_confidence,
            pattern_only: false,
        }
    }
}

/// The default rule per PI type.
pub fn default_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            "tfn",
            PIType::Tfn,
            r"\b\d{3}[ -]?\d{3}[ -]?\d{3}\b",
            &["tfn", "tax file number", "taxfilenumber", "ato"],
            0.7,
        ),
        RuleSpec::new(
            "abn",
            PIType::Abn,
            r"\b\d{2}[ -]?\d{3}[ -]?\d{3}[ -]?\d{3}\b",
            &["abn", "australian business number", "abr"],
            0.7,
        ),
        RuleSpec::new(
            "acn",
            PIType::Acn,
            r"\b\d{3}[ -]?\d{3}[ -]?\d{3}\b",
            &["acn", "australian company number", "asic"],
            0.7,
        ),
        RuleSpec::new(
            "medicare",
            PIType::Medicare,
            r"\b[2-6]\d{3} ?\d{5} ?\d(?: ?\d)?\b",
            &["medicare", "health insurance", "hic", "irn"],
            0.7,
        ),
        RuleSpec::new(
            "bsb",
            PIType::Bsb,
            r"\b\d{3}[- ]\d{3}\b",
            &["bsb", "bank", "branch", "account"],
            0.6,
        ),
        RuleSpec::new(
            "credit_card",
            PIType::CreditCard,
            r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,4}\b|\b3[47]\d{2}[ -]?\d{6}[ -]?\d{5}\b",
            &["card", "credit", "visa", "mastercard", "amex", "payment"],
            0.75,
        ),
        RuleSpec::new(
            "driver_license",
            PIType::DriverLicense,
            r"(?i)\b(?:driver'?s? +)?licen[cs]e +(?:no\.? *|number *|# *)?[:=]? *([A-Za-z0-9]{6,10})\b",
            &["license", "licence", "driver", "dl"],
            0.6,
        ),
        RuleSpec::new(
            "passport",
            PIType::Passport,
            r"\b[A-Z]{1,2}\d{7}\b",
            &["passport", "travel document", "dfat"],
            0.65,
        ),
        RuleSpec::new(
            "email",
            PIType::Email,
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            &["email", "e-mail", "contact", "mailto"],
            0.9,
        ),
        RuleSpec::new(
            "phone",
            PIType::Phone,
            r"\+61[ -]?\(?0?\)?[ -]?[2-478](?:[ -]?\d){8}|\(0[23478]\)[ -]?\d{4}[ -]?\d{4}|\b0[23478][ -]?\d{4}[ -]?\d{4}\b|\b04\d{2}[ -]?\d{3}[ -]?\d{3}\b|\b1[38]00[ -]?\d{3}[ -]?\d{3}\b|\b13[ -]?\d{2}[ -]?\d{2}\b",
            &["phone", "mobile", "tel", "call", "fax"],
            0.7,
        ),
        RuleSpec::new(
            "name",
            PIType::Name,
            r"\b[A-Z][a-z]+ (?:[A-Z]\. )?[A-Z][a-z]+\b",
            &["name", "customer", "employee", "applicant", "contact"],
            0.4,
        ),
        RuleSpec::new(
            "address",
            PIType::Address,
            r"\b\d{1,5}[A-Za-z]?(?:/\d+)? (?:[A-Z][a-z]+ ){1,3}(?:Street|St|Road|Rd|Avenue|Ave|Drive|Dr|Court|Ct|Place|Pl|Parade|Pde|Crescent|Cres|Lane|Ln|Highway|Hwy|Terrace|Tce|Boulevard|Blvd|Way|Close|Cl)\b",
            &["address", "street", "suburb", "postcode", "deliver"],
            0.5,
        ),
        RuleSpec::new(
            "ip_address",
            PIType::Ip,
            r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d\d?)\b",
            &["ip", "host", "server", "addr", "gateway"],
            0.6,
        ),
    ]
}

/// A rule with its regex compiled.
pub struct CompiledRule {
    pub id: String,
    pub pi_type: PIType,
    pub proximity_keywords: Vec<String>,
    pub base_confidence: f64,
    pub pattern_only: bool,
    regex: Regex,
    /// When the pattern has a capture group, the group is the match
    /// (label-anchored rules like driver_license use this).
    captures_value: bool,
}

/// A raw candidate produced by the pattern engine, before validation and
/// context analysis.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub rule_id: String,
    pub pi_type: PIType,
    pub matched: String,
    pub byte_offset: usize,
    pub line: usize,
    pub column: usize,
    pub base_confidence: f64,
    pub pattern_only: bool,
}

/// Holds the compiled rule set, shared read-only by all workers.
pub struct PatternEngine {
    rules: Vec<CompiledRule>,
    by_id: HashMap<String, usize>,
}

impl PatternEngine {
    /// Compile the default rule set, applying configuration overrides.
    pub fn new(overrides: &HashMap<String, RuleOverride>) -> Result<Self, Vec<ScanError>> {
        Self::with_rules(default_rules(), overrides)
    }

    /// Compile an explicit rule set. Disabled rules are skipped; compile
    /// failures are collected and reported together.
    pub fn with_rules(
        specs: Vec<RuleSpec>,
        overrides: &HashMap<String, RuleOverride>,
    ) -> Result<Self, Vec<ScanError>> {
        let mut rules = Vec::with_capacity(specs.len());
        let mut failures = Vec::new();

        for mut spec in specs {
            if let Some(over) = overrides.get(&spec.id) {
                if !over.enabled {
                    debug!(rule_id = %spec.id, "rule disabled by configuration");
                    continue;
                }
                if let Some(base) = over.base_confidence {
                    spec.base_confidence = base.clamp(0.0, 1.0);
                }
            }

            match Regex::new(&spec.pattern) {
                Ok(regex) => {
                    let captures_value = regex.captures_len() > 1;
                    rules.push(CompiledRule {
                        id: spec.id,
                        pi_type: spec.pi_type,
                        proximity_keywords: spec.proximity_keywords,
                        base_confidence: spec.base_confidence,
                        pattern_only: spec.pattern_only,
                        regex,
                        captures_value,
                    });
                }
                Err(e) => failures.push(ScanError::RuleCompile {
                    rule_id: spec.id,
                    reason: e.to_string(),
                }),
            }
        }

        if !failures.is_empty() {
            return Err(failures);
        }

        let by_id = rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        Ok(Self { rules, by_id })
    }

    pub fn rule(&self, id: &str) -> Option<&CompiledRule> {
        self.by_id.get(id).map(|i| &self.rules[*i])
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Scan file bytes and return candidates in ascending
    /// (byte_offset, rule_id) order. Binary content yields none.
    pub fn scan(&self, bytes: &[u8], filename: &str) -> Vec<Candidate> {
        if is_binary_content(bytes) {
            debug!(file = filename, "binary content, no candidates");
            return Vec::new();
        }

        let line_index = LineIndex::new(bytes);
        let mut candidates: Vec<Candidate> = Vec::new();

        for rule in &self.rules {
            if rule.captures_value {
                for caps in rule.regex.captures_iter(bytes) {
                    if let Some(group) = caps.get(1) {
                        candidates.push(self.candidate(rule, bytes, group.start(), group.end(), &line_index));
                    }
                }
            } else {
                for m in rule.regex.find_iter(bytes) {
                    candidates.push(self.candidate(rule, bytes, m.start(), m.end(), &line_index));
                }
            }
        }

        resolve_overlaps(&mut candidates);
        candidates.sort_by(|a, b| {
            a.byte_offset
                .cmp(&b.byte_offset)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        candidates
    }

    fn candidate(
        &self,
        rule: &CompiledRule,
        bytes: &[u8],
        start: usize,
        end: usize,
        line_index: &LineIndex,
    ) -> Candidate {
        let (line, column) = line_index.locate(bytes, start);
        Candidate {
            rule_id: rule.id.clone(),
            pi_type: rule.pi_type,
            matched: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
            byte_offset: start,
            line,
            column,
            base_confidence: rule.base_confidence,
            pattern_only: rule.pattern_only,
        }
    }
}

/// Overlapping matches of the same PI type at the same offset keep the
/// longest; ties break by rule id ascending.
fn resolve_overlaps(candidates: &mut Vec<Candidate>) {
    let mut keep: HashMap<(PIType, usize), usize> = HashMap::new();
    let mut dropped = vec![false; candidates.len()];

    for (i, c) in candidates.iter().enumerate() {
        match keep.entry((c.pi_type, c.byte_offset)) {
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(i);
            }
            std::collections::hash_map::Entry::Occupied(mut e) => {
                let j = *e.get();
                let incumbent = &candidates[j];
                let longer = c.matched.len() > incumbent.matched.len();
                let tie_wins =
                    c.matched.len() == incumbent.matched.len() && c.rule_id < incumbent.rule_id;
                if longer || tie_wins {
                    dropped[j] = true;
                    e.insert(i);
                } else {
                    dropped[i] = true;
                }
            }
        }
    }

    let mut idx = 0;
    candidates.retain(|_| {
        let d = dropped[idx];
        idx += 1;
        !d
    });
}

/// Byte offsets of line starts, built once per file.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(bytes: &[u8]) -> Self {
        let mut starts = vec![0];
        for (i, b) in bytes.iter().enumerate() {
            if *b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    /// 1-based line and code-point column for a byte offset. UTF-8
    /// continuation bytes do not advance the column, so invalid sequences
    /// degrade to byte positions instead of panicking.
    fn locate(&self, bytes: &[u8], offset: usize) -> (usize, usize) {
        let line_idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.starts[line_idx];
        let column = bytes[line_start..offset]
            .iter()
            .filter(|b| (**b & 0xC0) != 0x80)
            .count()
            + 1;
        (line_idx + 1, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PatternEngine {
        PatternEngine::new(&HashMap::new()).expect("default rules compile")
    }

    fn scan(text: &str) -> Vec<Candidate> {
        engine().scan(text.as_bytes(), "test.go")
    }

    #[test]
    fn test_tfn_candidate_with_location() {
        let candidates = scan("line one\nuser.TFN = \"123456782\"\n");
        let tfn: Vec<_> = candidates.iter().filter(|c| c.pi_type == PIType::Tfn).collect();
        assert_eq!(tfn.len(), 1);
        assert_eq!(tfn[0].matched, "123456782");
        assert_eq!(tfn[0].line, 2);
        assert_eq!(tfn[0].column, 13);
    }

    #[test]
    fn test_abn_with_spaces() {
        let candidates = scan("company.ABN = \"51 824 753 556\"");
        assert!(candidates
            .iter()
            .any(|c| c.pi_type == PIType::Abn && c.matched == "51 824 753 556"));
    }

    #[test]
    fn test_candidates_ordered_by_offset_then_rule() {
        let candidates = scan("a@b.com and 062-000 and 123456782");
        let offsets: Vec<usize> = candidates.iter().map(|c| c.byte_offset).collect();
        let mut sorted = offsets.clone();
        sorted.sort();
        assert_eq!(offsets, sorted);
    }

    #[test]
    fn test_binary_content_yields_nothing() {
        let mut bytes = b"tfn: 123456782".to_vec();
        bytes.insert(0, 0);
        assert!(engine().scan(&bytes, "blob.bin").is_empty());
    }

    #[test]
    fn test_rule_override_disables_and_rescores() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "email".to_string(),
            RuleOverride { enabled: false, base_confidence: None },
        );
        overrides.insert(
            "tfn".to_string(),
            RuleOverride { enabled: true, base_confidence: Some(0.55) },
        );
        let engine = PatternEngine::new(&overrides).unwrap();

        assert!(engine.rule("email").is_none());
        assert_eq!(engine.rule("tfn").unwrap().base_confidence, 0.55);

        let candidates = engine.scan(b"mail me: a@b.com", "x.txt");
        assert!(candidates.iter().all(|c| c.pi_type != PIType::Email));
    }

    #[test]
    fn test_bad_rule_reports_compile_error() {
        let specs = vec![RuleSpec::new("broken", PIType::Ip, r"(unclosed", &[], 0.5)];
        let err = PatternEngine::with_rules(specs, &HashMap::new()).err().unwrap();
        assert_eq!(err.len(), 1);
        assert!(matches!(
            &err[0],
            ScanError::RuleCompile { rule_id, .. } if rule_id == "broken"
        ));
    }

    #[test]
    fn test_label_anchored_license_captures_value_only() {
        let candidates = scan("Driver licence number: AB123456 on file");
        let dl: Vec<_> = candidates
            .iter()
            .filter(|c| c.pi_type == PIType::DriverLicense)
            .collect();
        assert_eq!(dl.len(), 1);
        assert_eq!(dl[0].matched, "AB123456");
    }

    #[test]
    fn test_multibyte_column_counts_code_points() {
        // Two 2-byte characters before the email
        let candidates = scan("éé a@b.com");
        let email = candidates
            .iter()
            .find(|c| c.pi_type == PIType::Email)
            .unwrap();
        assert_eq!(email.line, 1);
        assert_eq!(email.column, 4);
        assert_eq!(email.byte_offset, 5);
    }

    #[test]
    fn test_phone_shapes_match() {
        for text in [
            "call 0412 345 678 now",
            "office (02) 9374 4000",
            "hotline 1300 123 456",
            "intl +61 412 345 678",
        ] {
            assert!(
                scan(text).iter().any(|c| c.pi_type == PIType::Phone),
                "no phone candidate in {:?}",
                text
            );
        }
    }

    #[test]
    fn test_address_and_ip_rules() {
        let candidates = scan("ship to 42 Wallaby Way Sydney, host 10.0.0.1");
        assert!(candidates.iter().any(|c| c.pi_type == PIType::Address));
        assert!(candidates
            .iter()
            .any(|c| c.pi_type == PIType::Ip && c.matched == "10.0.0.1"));
    }
}
