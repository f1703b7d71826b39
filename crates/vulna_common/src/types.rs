//! Shared record and envelope types for the CVE collection.
//!
//! The agent never mutates records; it only requests filtered subsets and
//! renders whatever the catalog returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single CVE record as stored in the collection.
///
/// Field names follow the upstream feed so that imported documents
/// deserialize without a mapping layer. Flag fields keep their source
/// spelling ("Exploit Exists", "Yes") rather than being re-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CveRecord {
    pub cve_number: String,

    #[serde(default)]
    pub cve_title: String,

    /// CRITICAL, HIGH, MEDIUM or LOW.
    #[serde(default)]
    pub severity: String,

    #[serde(default)]
    pub cvss_score: f64,

    #[serde(default)]
    pub description: String,

    /// Comma-separated search keywords from the feed.
    #[serde(default)]
    pub keywords: String,

    #[serde(default)]
    pub affected_products: String,

    /// "Exploit Exists" when a public exploit is known.
    #[serde(default)]
    pub classifications_exploit: String,

    /// e.g. "Buffer Overflow", "SQL Injection".
    #[serde(default)]
    pub classifications_attack_type: String,

    #[serde(default)]
    pub classifications_location: String,

    #[serde(default)]
    pub classifications_impact: String,

    /// "Yes" when listed in the CISA Known Exploited Vulnerabilities catalog.
    #[serde(default)]
    pub cisa_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_last_modified_date: Option<DateTime<Utc>>,
}

impl CveRecord {
    pub fn has_exploit(&self) -> bool {
        self.classifications_exploit == "Exploit Exists"
    }

    pub fn is_cisa_kev(&self) -> bool {
        self.cisa_key == "Yes"
    }
}

/// Per-severity slice of the aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityCount {
    pub severity: String,
    pub count: u64,
    pub avg_cvss: f64,
}

/// Aggregate summary over the whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CveStatistics {
    pub total_cves: u64,
    pub by_severity: Vec<SeverityCount>,
    pub cisa_kev_count: u64,
    pub with_exploit_count: u64,
}

impl CveStatistics {
    pub fn empty() -> Self {
        Self {
            total_cves: 0,
            by_severity: Vec::new(),
            cisa_kev_count: 0,
            with_exploit_count: 0,
        }
    }
}

/// The filter echo carried inside a list envelope (e.g. `severity`,
/// `min_score`/`max_score`, `keyword`). Flattened into the envelope so the
/// serialized shape matches what the operation advertises.
pub type FilterEcho = serde_json::Map<String, serde_json::Value>;

/// A bounded list of matches together with the filter that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope {
    pub count: usize,
    #[serde(flatten)]
    pub filter: FilterEcho,
    pub results: Vec<CveRecord>,
}

/// What a catalog operation returns. The shape is decided by the operation
/// itself; consumers match on the variant instead of sniffing JSON keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolReply {
    /// Exactly one matched record (id lookup).
    Single(CveRecord),
    /// A bounded list of matches with the filter echoed back.
    List(ListEnvelope),
    /// Aggregate summary of the collection.
    Statistics(CveStatistics),
    /// Plain text: sentinels ("No CVE found with number: ...") and
    /// operation-level error descriptions.
    Text { text: String },
}

impl ToolReply {
    /// Build a list reply, counting the results.
    pub fn list(filter: FilterEcho, results: Vec<CveRecord>) -> Self {
        ToolReply::List(ListEnvelope {
            count: results.len(),
            filter,
            results,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        ToolReply::Text { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: &str) -> CveRecord {
        CveRecord {
            cve_number: number.to_string(),
            cve_title: "Test issue".to_string(),
            severity: "HIGH".to_string(),
            cvss_score: 8.1,
            description: "A test vulnerability".to_string(),
            keywords: String::new(),
            affected_products: "Acme Router".to_string(),
            classifications_exploit: "Exploit Exists".to_string(),
            classifications_attack_type: "Buffer Overflow".to_string(),
            classifications_location: String::new(),
            classifications_impact: String::new(),
            cisa_key: "No".to_string(),
            remediation: None,
            source_last_modified_date: None,
        }
    }

    #[test]
    fn test_record_flags() {
        let rec = record("CVE-2020-000001");
        assert!(rec.has_exploit());
        assert!(!rec.is_cisa_kev());
    }

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        // Imported documents often carry only a subset of fields.
        let rec: CveRecord =
            serde_json::from_str(r#"{"cve_number": "CVE-2021-12345"}"#).unwrap();
        assert_eq!(rec.cve_number, "CVE-2021-12345");
        assert_eq!(rec.cvss_score, 0.0);
        assert!(!rec.has_exploit());
    }

    #[test]
    fn test_list_envelope_flattens_filter() {
        let mut filter = FilterEcho::new();
        filter.insert("severity".to_string(), "HIGH".into());
        let reply = ToolReply::list(filter, vec![record("CVE-2020-000001")]);

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["severity"], "HIGH");
        assert_eq!(json["results"][0]["cve_number"], "CVE-2020-000001");
    }

    #[test]
    fn test_empty_statistics() {
        let stats = CveStatistics::empty();
        assert_eq!(stats.total_cves, 0);
        assert!(stats.by_severity.is_empty());
    }
}
