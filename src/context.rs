// Context analyzer: syntactic classification and false-positive suppression
//
// Works purely on strings and line windows, no AST. Given a candidate and the
// file content it decides whether to keep the candidate, which environment it
// lives in (production/test/mock) and how much context boosts its confidence.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{
    CHECKSUM_CONFIDENCE_BOOST, PROXIMITY_CONFIDENCE_BOOST, PROXIMITY_WINDOW,
    SEQUENTIAL_RUN_LEN, SNIPPET_WINDOW, TEST_INDICATOR_WINDOW,
};
use crate::patterns::Candidate;
use crate::types::Environment;
use crate::utils::strip_non_digits;

/// Path fragments that mark a whole file as test data.
const TEST_PATH_TOKENS: [&str; 8] = [
    "test", "spec", "fixture", "mock", "stub", "dummy", "example", "sample",
];

/// Code constructs that mark the surrounding lines as test code.
const TEST_INDICATORS: [&str; 16] = [
    "describe(",
    "it(",
    "test(",
    "assertequal",
    "assert_eq",
    "asserttrue",
    "expect(",
    "beforeeach",
    "aftereach",
    "parametrize",
    "@test",
    "#[test]",
    "func test",
    "def test_",
    "unittest",
    "testcase",
];

/// Words that mark the surrounding lines as mock or demo data.
const MOCK_INDICATORS: [&str; 9] = [
    "mock", "fake", "stub", "placeholder", "lorem", "ipsum", "demo", "sample", "template",
];

/// Comment keywords that make a candidate an obvious false positive.
const COMMENT_SUPPRESSORS: [&str; 5] = ["example", "sample", "todo", "fixme", "placeholder"];

static UUID_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

/// Comment syntax family, inferred from the file extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentStyle {
    /// `//` line comments and `/* */` blocks
    CLike,
    /// `#` line comments
    Hash,
    /// `<!-- -->` blocks
    Markup,
    /// `--` line comments and `/* */` blocks
    Sql,
    /// Recognize the common openers when the extension is unknown
    Generic,
}

fn comment_style(filename: &str) -> CommentStyle {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "go" | "rs" | "js" | "jsx" | "ts" | "tsx" | "java" | "c" | "cc" | "cpp" | "h" | "hpp"
        | "cs" | "php" | "swift" | "kt" | "kts" | "scala" | "dart" | "groovy" => CommentStyle::CLike,
        "py" | "rb" | "sh" | "bash" | "zsh" | "pl" | "yaml" | "yml" | "toml" | "ini" | "conf"
        | "r" | "tf" => CommentStyle::Hash,
        "xml" | "html" | "htm" | "xhtml" | "vue" | "svg" | "md" => CommentStyle::Markup,
        "sql" => CommentStyle::Sql,
        _ => CommentStyle::Generic,
    }
}

/// The analyzer's verdict for one candidate.
#[derive(Debug, Clone)]
pub struct ContextVerdict {
    pub keep: bool,
    pub confidence_delta: f64,
    pub environment: Environment,
    pub in_comment: bool,
    pub in_string: bool,
    pub has_proximity_keyword: bool,
}

/// Stateless, shared by all workers.
#[derive(Debug, Default, Clone)]
pub struct ContextAnalyzer;

impl ContextAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Classify one candidate against its file.
    ///
    /// `validated` is the checksum outcome from the validator stage; it both
    /// feeds the confidence delta and shields the candidate from the
    /// synthetic-shape suppression below.
    pub fn analyze(
        &self,
        candidate: &Candidate,
        proximity_keywords: &[String],
        lines: &[&str],
        filename: &str,
        validated: bool,
    ) -> ContextVerdict {
        let line_idx = candidate.line.saturating_sub(1);
        let line = lines.get(line_idx).copied().unwrap_or("");

        let style = comment_style(filename);
        let in_comment = self.in_comment(lines, line_idx, candidate.column, style);
        let in_string = self.in_string(line, candidate.column);

        let indicator_window =
            window_lower(lines, line_idx, TEST_INDICATOR_WINDOW);
        let environment = self.detect_environment(filename, &indicator_window);

        let proximity_window = window_lower(lines, line_idx, PROXIMITY_WINDOW);
        let has_proximity_keyword = proximity_keywords
            .iter()
            .any(|k| proximity_window.contains(k.as_str()));

        // Obvious false positive: commented-out sample data
        if in_comment
            && COMMENT_SUPPRESSORS
                .iter()
                .any(|s| indicator_window.contains(s))
        {
            return ContextVerdict {
                keep: false,
                confidence_delta: 0.0,
                environment,
                in_comment,
                in_string,
                has_proximity_keyword,
            };
        }

        // Synthetic shapes (UUID fragments, hashes, counter-style digit runs)
        // are suppressed unless a checksum vouched for the value.
        if !validated && self.is_synthetic_shape(&candidate.matched, line, candidate.column) {
            return ContextVerdict {
                keep: false,
                confidence_delta: 0.0,
                environment,
                in_comment,
                in_string,
                has_proximity_keyword,
            };
        }

        let mut delta = 0.0;
        if has_proximity_keyword {
            delta += PROXIMITY_CONFIDENCE_BOOST;
        }
        if validated {
            delta += CHECKSUM_CONFIDENCE_BOOST;
        }

        ContextVerdict {
            keep: true,
            confidence_delta: delta,
            environment,
            in_comment,
            in_string,
            has_proximity_keyword,
        }
    }

    /// Context snippet around a line, at most `2 * SNIPPET_WINDOW` lines.
    pub fn snippet(&self, lines: &[&str], line: usize) -> String {
        let line_idx = line.saturating_sub(1);
        let start = line_idx.saturating_sub(SNIPPET_WINDOW).min(lines.len());
        let end = (line_idx + SNIPPET_WINDOW).min(lines.len());
        lines[start..end].join("\n")
    }

    fn detect_environment(&self, filename: &str, indicator_window: &str) -> Environment {
        let path_lower = filename.to_ascii_lowercase();
        if TEST_PATH_TOKENS.iter().any(|t| path_lower.contains(t)) {
            return Environment::Test;
        }
        if TEST_INDICATORS.iter().any(|t| indicator_window.contains(t)) {
            return Environment::Test;
        }
        if MOCK_INDICATORS.iter().any(|t| indicator_window.contains(t)) {
            return Environment::Mock;
        }
        Environment::Production
    }

    /// Column-aware comment detection: a line opener earlier on the same
    /// line, or a block span crossing the candidate position.
    fn in_comment(
        &self,
        lines: &[&str],
        line_idx: usize,
        column: usize,
        style: CommentStyle,
    ) -> bool {
        let (line_openers, block): (&[&str], Option<(&str, &str)>) = match style {
            CommentStyle::CLike => (&["//"], Some(("/*", "*/"))),
            CommentStyle::Hash => (&["#"], None),
            CommentStyle::Markup => (&[], Some(("<!--", "-->"))),
            CommentStyle::Sql => (&["--"], Some(("/*", "*/"))),
            CommentStyle::Generic => (&["//", "#"], Some(("/*", "*/"))),
        };

        let line = lines.get(line_idx).copied().unwrap_or("");
        let prefix: String = line.chars().take(column.saturating_sub(1)).collect();

        for opener in line_openers {
            if prefix.contains(opener) {
                return true;
            }
        }

        let (open, close) = match block {
            Some(pair) => pair,
            None => return false,
        };

        // Track block state through the preceding lines, then through the
        // candidate line up to its column.
        let mut in_block = false;
        for prior in lines[..line_idx.min(lines.len())].iter() {
            in_block = block_state_after(prior, in_block, open, close);
        }
        block_state_after(&prefix, in_block, open, close)
    }

    /// Odd number of unescaped quotes before the column means the candidate
    /// sits inside a string literal.
    fn in_string(&self, line: &str, column: usize) -> bool {
        let mut quotes = 0usize;
        let mut escaped = false;
        for (i, c) in line.chars().enumerate() {
            if i + 1 >= column {
                break;
            }
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' | '\'' => quotes += 1,
                _ => {}
            }
        }
        quotes % 2 == 1
    }

    /// UUID fragments, long hex hashes and monotone/constant digit runs are
    /// not PI.
    fn is_synthetic_shape(&self, matched: &str, line: &str, column: usize) -> bool {
        let token = surrounding_token(line, column);
        if UUID_TOKEN.is_match(&token) {
            return true;
        }
        let hexish = !token.is_empty() && token.chars().all(|c| c.is_ascii_hexdigit());
        if hexish && matches!(token.len(), 32 | 40 | 64) {
            return true;
        }

        let digits = strip_non_digits(matched);
        has_sequential_run(digits.as_bytes(), SEQUENTIAL_RUN_LEN)
    }
}

/// Lowercased text of the lines within `window` of `line_idx` (inclusive).
fn window_lower(lines: &[&str], line_idx: usize, window: usize) -> String {
    let start = line_idx.saturating_sub(window).min(lines.len());
    let end = (line_idx + window + 1).min(lines.len());
    lines[start..end].join("\n").to_ascii_lowercase()
}

/// Block-comment state after scanning `text`, given the state before it.
fn block_state_after(text: &str, mut in_block: bool, open: &str, close: &str) -> bool {
    let mut rest = text;
    loop {
        if in_block {
            match rest.find(close) {
                Some(i) => {
                    in_block = false;
                    rest = &rest[i + close.len()..];
                }
                None => return true,
            }
        } else {
            match rest.find(open) {
                Some(i) => {
                    in_block = true;
                    rest = &rest[i + open.len()..];
                }
                None => return false,
            }
        }
    }
}

/// Expand the token around `column` over hex digits and hyphens, the shapes
/// UUIDs and hashes are made of.
fn surrounding_token(line: &str, column: usize) -> String {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    let pos = (column.saturating_sub(1)).min(chars.len() - 1);
    let is_tokenish = |c: char| c.is_ascii_hexdigit() || c == '-';

    if !is_tokenish(chars[pos]) {
        return String::new();
    }

    let mut start = pos;
    while start > 0 && is_tokenish(chars[start - 1]) {
        start -= 1;
    }
    let mut end = pos;
    while end + 1 < chars.len() && is_tokenish(chars[end + 1]) {
        end += 1;
    }
    chars[start..=end].iter().collect()
}

/// True when `digits` contains a monotone (+1/-1) or constant run of at
/// least `min_len`.
fn has_sequential_run(digits: &[u8], min_len: usize) -> bool {
    if digits.len() < min_len {
        return false;
    }
    for dir in [1i16, -1, 0] {
        let mut run = 1usize;
        for pair in digits.windows(2) {
            if pair[1] as i16 - pair[0] as i16 == dir {
                run += 1;
                if run >= min_len {
                    return true;
                }
            } else {
                run = 1;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Candidate;
    use crate::types::PIType;

    fn candidate(line: usize, column: usize, matched: &str) -> Candidate {
        Candidate {
            rule_id: "tfn".to_string(),
            pi_type: PIType::Tfn,
            matched: matched.to_string(),
            byte_offset: 0,
            line,
            column,
            base_confidence: 0.7,
            pattern_only: false,
        }
    }

    fn keywords() -> Vec<String> {
        vec!["tfn".to_string(), "tax file number".to_string()]
    }

    #[test]
    fn test_production_assignment_keeps_and_boosts() {
        let lines = vec!["user.TFN = \"123456782\""];
        let analyzer = ContextAnalyzer::new();
        let verdict = analyzer.analyze(&candidate(1, 13, "123456782"), &keywords(), &lines, "src/user.go", true);

        assert!(verdict.keep);
        assert_eq!(verdict.environment, Environment::Production);
        assert!(verdict.has_proximity_keyword);
        assert!(verdict.in_string);
        assert!(!verdict.in_comment);
        // proximity + checksum
        assert!((verdict.confidence_delta - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_test_file_path_sets_environment() {
        let lines = vec!["tfn := \"123456782\""];
        let analyzer = ContextAnalyzer::new();
        let verdict = analyzer.analyze(
            &candidate(1, 9, "123456782"),
            &keywords(),
            &lines,
            "src/user_test.go",
            true,
        );
        assert!(verdict.keep);
        assert_eq!(verdict.environment, Environment::Test);
    }

    #[test]
    fn test_indicator_window_sets_test_environment() {
        let lines = vec![
            "func TestLookup(t *testing.T) {",
            "    assertEqual(lookup(), nil)",
            "    tfn := \"123456782\"",
            "}",
        ];
        let analyzer = ContextAnalyzer::new();
        let verdict =
            analyzer.analyze(&candidate(3, 13, "123456782"), &keywords(), &lines, "src/user.go", true);
        assert_eq!(verdict.environment, Environment::Test);
    }

    #[test]
    fn test_mock_window_sets_mock_environment() {
        let lines = vec!["// placeholder customer record", "tfn := \"123456782\""];
        let analyzer = ContextAnalyzer::new();
        let verdict =
            analyzer.analyze(&candidate(2, 9, "123456782"), &keywords(), &lines, "src/seed.go", true);
        assert_eq!(verdict.environment, Environment::Mock);
    }

    #[test]
    fn test_comment_with_example_suppresses() {
        let lines = vec!["// Example Medicare: 2428778132"];
        let analyzer = ContextAnalyzer::new();
        let verdict = analyzer.analyze(
            &candidate(1, 22, "2428778132"),
            &[],
            &lines,
            "src/billing.go",
            true,
        );
        assert!(!verdict.keep);
        assert!(verdict.in_comment);
    }

    #[test]
    fn test_plain_comment_without_suppressor_keeps() {
        let lines = vec!["// customer tfn 123456782 migrated from legacy"];
        let analyzer = ContextAnalyzer::new();
        let verdict = analyzer.analyze(
            &candidate(1, 17, "123456782"),
            &keywords(),
            &lines,
            "src/migrate.go",
            true,
        );
        assert!(verdict.keep);
        assert!(verdict.in_comment);
    }

    #[test]
    fn test_sequential_digits_suppressed_when_unvalidated() {
        let lines = vec!["id := \"123456789\""];
        let analyzer = ContextAnalyzer::new();
        let verdict =
            analyzer.analyze(&candidate(1, 8, "123456789"), &[], &lines, "x.go", false);
        assert!(!verdict.keep);
    }

    #[test]
    fn test_checksum_overrides_sequential_shape() {
        // 123456782 has a monotone prefix but a passing checksum keeps it
        let lines = vec!["user.TFN = \"123456782\""];
        let analyzer = ContextAnalyzer::new();
        let verdict =
            analyzer.analyze(&candidate(1, 13, "123456782"), &keywords(), &lines, "src/user.go", true);
        assert!(verdict.keep);
    }

    #[test]
    fn test_all_same_digits_suppressed() {
        let lines = vec!["port := 111111"];
        let analyzer = ContextAnalyzer::new();
        let verdict = analyzer.analyze(&candidate(1, 9, "111111"), &[], &lines, "x.go", false);
        assert!(!verdict.keep);
    }

    #[test]
    fn test_uuid_fragment_suppressed() {
        let line = "id = \"123e4567-e89b-12d3-a456-426614174000\"";
        let lines = vec![line];
        let analyzer = ContextAnalyzer::new();
        // pretend a rule matched digits inside the uuid
        let col = line.find("426614174000").unwrap() + 1;
        let verdict =
            analyzer.analyze(&candidate(1, col, "426614174"), &[], &lines, "x.go", false);
        assert!(!verdict.keep);
    }

    #[test]
    fn test_hash_token_suppressed() {
        let line = "sum := \"5f4dcc3b5aa765d61d8327deb882cf99\"";
        let lines = vec![line];
        let analyzer = ContextAnalyzer::new();
        let col = line.find("5f4dcc").unwrap() + 1;
        let verdict = analyzer.analyze(
            &candidate(1, col, "5f4dcc3b5aa765d61d8327deb882cf99"),
            &[],
            &lines,
            "x.go",
            false,
        );
        assert!(!verdict.keep);
    }

    #[test]
    fn test_block_comment_spanning_lines() {
        let lines = vec!["/*", " seed tfn 123456782", "*/", "real := 1"];
        let analyzer = ContextAnalyzer::new();
        let verdict = analyzer.analyze(
            &candidate(2, 11, "123456782"),
            &keywords(),
            &lines,
            "src/seed.go",
            true,
        );
        assert!(verdict.in_comment);
    }

    #[test]
    fn test_hash_comment_only_in_hash_languages() {
        let lines = vec!["# tfn 123456782"];
        let analyzer = ContextAnalyzer::new();

        let py = analyzer.analyze(&candidate(1, 7, "123456782"), &keywords(), &lines, "load.py", true);
        assert!(py.in_comment);

        // '#' is not a comment opener for Go
        let go = analyzer.analyze(&candidate(1, 7, "123456782"), &keywords(), &lines, "load.go", true);
        assert!(!go.in_comment);
    }

    #[test]
    fn test_snippet_window_bounds() {
        let all: Vec<String> = (1..=30).map(|i| format!("line {}", i)).collect();
        let lines: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
        let analyzer = ContextAnalyzer::new();

        let snippet = analyzer.snippet(&lines, 15);
        let count = snippet.lines().count();
        assert!(count <= 10);
        assert!(snippet.contains("line 15"));

        // Near the start the window clamps
        let head = analyzer.snippet(&lines, 1);
        assert!(head.starts_with("line 1"));
    }
}
