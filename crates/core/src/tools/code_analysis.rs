//! # Code Analysis - Pattern Heuristics
//!
//! Line and whole-file regex checks grouped into three analyses:
//!
//! - quality: long lines, TODO-style markers, empty catch blocks, stray prints
//! - security: hardcoded credentials, injection and code-execution sinks
//! - performance: concatenation and allocation inside loops
//!
//! Language-specific rules exist for Java and Python; the generic rules
//! apply to every language.

use super::{normalize_action, ToolCapability, ToolKind, ToolOutput};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::OnceLock;

const MAX_LINE_LENGTH: usize = 100;

// ============================================================================
// Result Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl FindingSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSeverity::Critical => "critical",
            FindingSeverity::High => "high",
            FindingSeverity::Medium => "medium",
            FindingSeverity::Low => "low",
        }
    }
}

/// One heuristic hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub severity: FindingSeverity,
    /// 1-based line, absent for whole-file findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Offending source line, trimmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    pub findings: Vec<Finding>,
    pub count: usize,
    pub severity_counts: SeverityCounts,
}

impl SectionReport {
    fn from_findings(findings: Vec<Finding>) -> Self {
        let mut counts = SeverityCounts::default();
        for finding in &findings {
            match finding.severity {
                FindingSeverity::Critical => counts.critical += 1,
                FindingSeverity::High => counts.high += 1,
                FindingSeverity::Medium => counts.medium += 1,
                FindingSeverity::Low => counts.low += 1,
            }
        }
        Self {
            count: findings.len(),
            findings,
            severity_counts: counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<SectionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SectionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<SectionReport>,
}

/// Which analyses to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Quality,
    Security,
    Performance,
    All,
}

impl AnalysisType {
    pub fn parse(action: &str) -> Option<Self> {
        match normalize_action(action).as_str() {
            "quality" => Some(AnalysisType::Quality),
            "security" => Some(AnalysisType::Security),
            "performance" => Some(AnalysisType::Performance),
            "all" | "" => Some(AnalysisType::All),
            _ => None,
        }
    }

    fn includes(&self, other: AnalysisType) -> bool {
        *self == AnalysisType::All || *self == other
    }
}

// ============================================================================
// Rule Tables
// ============================================================================

struct Rule {
    /// Lowercase language this rule is limited to
    language: Option<&'static str>,
    pattern: &'static str,
    kind: &'static str,
    description: &'static str,
    severity: FindingSeverity,
    impact: Option<&'static str>,
}

const fn rule(
    language: Option<&'static str>,
    pattern: &'static str,
    kind: &'static str,
    description: &'static str,
    severity: FindingSeverity,
) -> Rule {
    Rule {
        language,
        pattern,
        kind,
        description,
        severity,
        impact: None,
    }
}

const QUALITY_RULES: &[Rule] = &[
    rule(
        Some("java"),
        r"catch\s*\([^)]+\)\s*\{\s*\}",
        "error_handling",
        "Empty catch block",
        FindingSeverity::Medium,
    ),
    rule(
        Some("java"),
        r"System\.out\.println",
        "logging",
        "Using System.out.println instead of proper logging",
        FindingSeverity::Low,
    ),
    rule(
        Some("python"),
        r"==\s*None",
        "idiom",
        "Using == None instead of is None",
        FindingSeverity::Low,
    ),
    rule(
        Some("python"),
        r"except\s*:",
        "error_handling",
        "Using bare except clause",
        FindingSeverity::Medium,
    ),
];

const MARKER_PATTERN: &str = r"(?i:TODO|FIXME|XXX|BUG|HACK)";

const SECURITY_RULES: &[Rule] = &[
    rule(
        None,
        r#"(?i)password\s*=\s*['"][^'"]+['"]"#,
        "credentials",
        "Hardcoded password",
        FindingSeverity::High,
    ),
    rule(
        None,
        r#"(?i)api[-_]?key\s*=\s*['"][^'"]+['"]"#,
        "credentials",
        "Hardcoded API key",
        FindingSeverity::High,
    ),
    rule(
        Some("java"),
        r"(?i)\.executeQuery\([^)]*\+",
        "injection",
        "Potential SQL injection",
        FindingSeverity::High,
    ),
    rule(
        Some("java"),
        r"(?i)Runtime\.getRuntime\(\)\.exec\(",
        "injection",
        "Potential command injection",
        FindingSeverity::High,
    ),
    rule(
        Some("python"),
        r"(?i)eval\(",
        "code_execution",
        "Using eval() function",
        FindingSeverity::High,
    ),
    rule(
        Some("python"),
        r"(?i)subprocess\.(?:call|Popen|run)\([^)]*shell\s*=\s*True",
        "injection",
        "Shell=True in subprocess calls",
        FindingSeverity::High,
    ),
];

const QUADRATIC_CONCAT: &str = "Can lead to O(n²) time complexity and excessive memory usage.";

const PERFORMANCE_RULES: &[Rule] = &[
    Rule {
        language: Some("java"),
        pattern: r"(?s)for\s*\([^)]+\)\s*\{[^}]*\+\s*=",
        kind: "string_manipulation",
        description: "String concatenation in a loop. Consider using StringBuilder.",
        severity: FindingSeverity::Medium,
        impact: Some(QUADRATIC_CONCAT),
    },
    Rule {
        language: Some("java"),
        pattern: r"(?s)for\s*\([^)]+\)\s*\{[^}]*new\s+",
        kind: "object_creation",
        description: "Object creation in a loop. Consider reusing objects.",
        severity: FindingSeverity::Medium,
        impact: Some("Can lead to excessive garbage collection and memory pressure."),
    },
    Rule {
        language: Some("python"),
        pattern: r"(?s)for\s+[^:]+:[^\]]*\.append\(",
        kind: "loop_optimization",
        description: "Using .append() in a loop. Consider list comprehension.",
        severity: FindingSeverity::Low,
        impact: Some("List comprehensions are generally faster and more readable."),
    },
    Rule {
        language: Some("python"),
        pattern: r"(?s)for\s+[^:]+:[^\]]*\s*\+\s*=",
        kind: "string_manipulation",
        description: "String concatenation in a loop. Consider using join().",
        severity: FindingSeverity::Medium,
        impact: Some(QUADRATIC_CONCAT),
    },
];

struct CompiledRule {
    rule: &'static Rule,
    regex: Regex,
}

fn compile(rules: &'static [Rule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .filter_map(|rule| match Regex::new(rule.pattern) {
            Ok(regex) => Some(CompiledRule { rule, regex }),
            Err(e) => {
                tracing::error!(pattern = rule.pattern, error = %e, "Invalid analysis pattern");
                None
            }
        })
        .collect()
}

fn quality_rules() -> &'static [CompiledRule] {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| compile(QUALITY_RULES))
}

fn security_rules() -> &'static [CompiledRule] {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| compile(SECURITY_RULES))
}

fn performance_rules() -> &'static [CompiledRule] {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| compile(PERFORMANCE_RULES))
}

fn marker_regex() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(MARKER_PATTERN).ok()).as_ref()
}

fn applies(rule: &Rule, language: &str) -> bool {
    rule.language.map_or(true, |l| l == language)
}

// ============================================================================
// Analyzer
// ============================================================================

/// Run the selected analyses over `code`
pub fn analyze(code: &str, language: &str, analysis: AnalysisType) -> AnalysisReport {
    let lang = language.to_lowercase();
    AnalysisReport {
        language: language.to_string(),
        quality: analysis
            .includes(AnalysisType::Quality)
            .then(|| SectionReport::from_findings(analyze_quality(code, &lang))),
        security: analysis
            .includes(AnalysisType::Security)
            .then(|| SectionReport::from_findings(analyze_security(code, &lang))),
        performance: analysis
            .includes(AnalysisType::Performance)
            .then(|| SectionReport::from_findings(analyze_performance(code, &lang))),
    }
}

fn line_finding(rule: &Rule, line_no: usize) -> Finding {
    Finding {
        kind: rule.kind.to_string(),
        description: rule.description.to_string(),
        severity: rule.severity,
        line: Some(line_no),
        code: None,
        impact: None,
    }
}

fn analyze_quality(code: &str, lang: &str) -> Vec<Finding> {
    let lines: Vec<&str> = code.split('\n').collect();
    let mut findings = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if line.chars().count() > MAX_LINE_LENGTH {
            findings.push(Finding {
                kind: "style".to_string(),
                description: format!("Line too long (> {} characters)", MAX_LINE_LENGTH),
                severity: FindingSeverity::Low,
                line: Some(i + 1),
                code: None,
                impact: None,
            });
        }
    }

    if let Some(marker) = marker_regex() {
        for (i, line) in lines.iter().enumerate() {
            if marker.is_match(line) {
                findings.push(Finding {
                    kind: "maintenance".to_string(),
                    description: format!("TODO or similar comment found: {}", line.trim()),
                    severity: FindingSeverity::Low,
                    line: Some(i + 1),
                    code: None,
                    impact: None,
                });
            }
        }
    }

    for compiled in quality_rules().iter().filter(|c| applies(c.rule, lang)) {
        for (i, line) in lines.iter().enumerate() {
            if compiled.regex.is_match(line) {
                findings.push(line_finding(compiled.rule, i + 1));
            }
        }
    }

    findings
}

fn analyze_security(code: &str, lang: &str) -> Vec<Finding> {
    let lines: Vec<&str> = code.split('\n').collect();
    let mut findings = Vec::new();

    for compiled in security_rules().iter().filter(|c| applies(c.rule, lang)) {
        for (i, line) in lines.iter().enumerate() {
            if compiled.regex.is_match(line) {
                let mut finding = line_finding(compiled.rule, i + 1);
                finding.code = Some(line.trim().to_string());
                findings.push(finding);
            }
        }
    }

    findings
}

fn analyze_performance(code: &str, lang: &str) -> Vec<Finding> {
    performance_rules()
        .iter()
        .filter(|c| applies(c.rule, lang) && c.regex.is_match(code))
        .map(|c| Finding {
            kind: c.rule.kind.to_string(),
            description: c.rule.description.to_string(),
            severity: c.rule.severity,
            line: None,
            code: None,
            impact: c.rule.impact.map(str::to_string),
        })
        .collect()
}

impl AnalysisReport {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Code Analysis Results for {} code\n\n", self.language);

        if let Some(quality) = &self.quality {
            out.push_str("## Code Quality\n\n");
            let c = quality.severity_counts;
            let _ = write!(
                out,
                "Found {} issues: {} high, {} medium, {} low severity.\n\n",
                quality.count, c.high, c.medium, c.low
            );
            if !quality.findings.is_empty() {
                out.push_str("### Issues:\n\n");
                for f in &quality.findings {
                    let _ = writeln!(
                        out,
                        "- **{}** (Line {}, {}): {}",
                        f.kind,
                        f.line.unwrap_or_default(),
                        f.severity.as_str(),
                        f.description
                    );
                }
                out.push('\n');
            }
        }

        if let Some(security) = &self.security {
            out.push_str("## Security Analysis\n\n");
            let c = security.severity_counts;
            let _ = write!(
                out,
                "Found {} vulnerabilities: {} critical, {} high, {} medium, {} low severity.\n\n",
                security.count, c.critical, c.high, c.medium, c.low
            );
            if !security.findings.is_empty() {
                out.push_str("### Vulnerabilities:\n\n");
                for f in &security.findings {
                    let _ = writeln!(
                        out,
                        "- **{}** (Line {}, {}): {}",
                        f.kind,
                        f.line.unwrap_or_default(),
                        f.severity.as_str(),
                        f.description
                    );
                    let _ = writeln!(out, "  Code: `{}`", f.code.as_deref().unwrap_or_default());
                }
                out.push('\n');
            }
        }

        if let Some(performance) = &self.performance {
            out.push_str("## Performance Analysis\n\n");
            let c = performance.severity_counts;
            let _ = write!(
                out,
                "Found {} issues: {} high, {} medium, {} low severity.\n\n",
                performance.count, c.high, c.medium, c.low
            );
            if !performance.findings.is_empty() {
                out.push_str("### Issues:\n\n");
                for f in &performance.findings {
                    let _ = writeln!(
                        out,
                        "- **{}** ({}): {}",
                        f.kind,
                        f.severity.as_str(),
                        f.description
                    );
                    let _ = writeln!(out, "  Impact: {}", f.impact.as_deref().unwrap_or_default());
                }
                out.push('\n');
            }
        }

        out
    }
}

// ============================================================================
// Tool Capability
// ============================================================================

/// Static-analysis capability.
///
/// Actions: `quality`, `security`, `performance`, `all`.
/// Params: `code`, `language`, optional `format` (`"json"` for structured output).
#[derive(Debug, Clone, Default)]
pub struct CodeAnalysisTool;

impl CodeAnalysisTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolCapability for CodeAnalysisTool {
    fn kind(&self) -> ToolKind {
        ToolKind::StaticAnalysis
    }

    fn name(&self) -> &str {
        "code_analysis"
    }

    fn description(&self) -> &str {
        "Analyze code for quality issues, security vulnerabilities and performance problems."
    }

    async fn run(&self, action: &str, params: &serde_json::Value) -> anyhow::Result<ToolOutput> {
        let Some(analysis) = AnalysisType::parse(action) else {
            return Ok(super::unknown_action(action));
        };

        let language = params
            .get("language")
            .and_then(|l| l.as_str())
            .filter(|l| !l.trim().is_empty());
        let Some(language) = language else {
            return Ok(ToolOutput::Text(
                "Language not specified. Please provide a language.".to_string(),
            ));
        };

        let code = params.get("code").and_then(|c| c.as_str()).unwrap_or("");
        if code.trim().is_empty() {
            return Ok(ToolOutput::Text(
                "No code provided. Please provide code to analyze.".to_string(),
            ));
        }

        let report = analyze(code, language, analysis);
        tracing::debug!(
            language = %language,
            quality = report.quality.as_ref().map_or(0, |s| s.count),
            security = report.security.as_ref().map_or(0, |s| s.count),
            performance = report.performance.as_ref().map_or(0, |s| s.count),
            "Code analysis complete"
        );

        if params.get("format").and_then(|f| f.as_str()) == Some("json") {
            Ok(ToolOutput::Structured(serde_json::to_value(&report)?))
        } else {
            Ok(ToolOutput::Text(report.to_markdown()))
        }
    }
}
