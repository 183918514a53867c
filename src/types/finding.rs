use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One independent detection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Oss,
    Secrets,
    StaticRules,
    Iac,
    Containers,
}

impl EngineKind {
    /// Deterministic order in which engines are queried during cross-engine
    /// severity resolution. Ties at a line are broken by this order.
    pub const QUERY_ORDER: [EngineKind; 5] = [
        EngineKind::Oss,
        EngineKind::Secrets,
        EngineKind::StaticRules,
        EngineKind::Iac,
        EngineKind::Containers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Oss => "oss",
            EngineKind::Secrets => "secrets",
            EngineKind::StaticRules => "static_rules",
            EngineKind::Iac => "iac",
            EngineKind::Containers => "containers",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding severity, totally ordered: Info < Low < Medium < High < Critical < Malicious.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
    Malicious,
}

impl Severity {
    /// Parse an engine-reported severity string. Engines are black boxes and
    /// occasionally report values outside the known set; those are downgraded
    /// to `Info` rather than rejected.
    pub fn from_engine_str(raw: &str) -> Severity {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" | "moderate" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            "malicious" => Severity::Malicious,
            "info" | "informational" => Severity::Info,
            other => {
                tracing::debug!("Unknown severity '{}' reported by engine, using info", other);
                Severity::Info
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Malicious => "malicious",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source range of a finding. Lines and columns are zero-based; columns are
/// half-open (`end_col` points one past the last flagged column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl FindingRange {
    pub fn line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start_line: line,
            start_col,
            end_line: line,
            end_col,
        }
    }
}

/// One normalized detection result from one engine.
///
/// `file_path` always refers to the original editor file, never the temp
/// snapshot the engine actually read. `identity` is the engine-specific
/// stable key: scanning unchanged content twice must yield the same identity,
/// otherwise ignore-list matching and hover consistency break across rescans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub engine: EngineKind,
    pub file_path: PathBuf,
    pub range: FindingRange,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub identity: String,
    /// Engine-specific payload (expected/actual values, CVE list, ...)
    /// carried through to hover and quick-fix surfaces unchanged.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Byte snapshot of an editor buffer at the moment an edit event fired.
///
/// The orchestrator never reads the file on disk: the host hands over the
/// buffer text, and scans operate on a temp copy of exactly this text.
#[derive(Debug, Clone)]
pub struct ScanDocument {
    pub path: PathBuf,
    pub text: String,
}

impl ScanDocument {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_total_order() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert!(Severity::Critical < Severity::Malicious);
    }

    #[test]
    fn test_severity_from_engine_str() {
        assert_eq!(Severity::from_engine_str("HIGH"), Severity::High);
        assert_eq!(Severity::from_engine_str("moderate"), Severity::Medium);
        assert_eq!(Severity::from_engine_str("bogus"), Severity::Info);
    }

    #[test]
    fn test_engine_kind_query_order_is_exhaustive() {
        assert_eq!(EngineKind::QUERY_ORDER.len(), 5);
        let mut sorted = EngineKind::QUERY_ORDER.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
    }

    #[test]
    fn test_finding_serde_roundtrip() {
        let finding = Finding {
            engine: EngineKind::Oss,
            file_path: PathBuf::from("/work/package.json"),
            range: FindingRange::line(4, 2, 10),
            severity: Severity::High,
            title: "Vulnerable dependency: lodash".to_string(),
            description: "lodash 3.10.1 has known vulnerabilities".to_string(),
            identity: "lodash:npm".to_string(),
            metadata: serde_json::json!({ "cves": ["CVE-2019-10744"] }),
        };
        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back.identity, "lodash:npm");
        assert_eq!(back.severity, Severity::High);
    }
}
