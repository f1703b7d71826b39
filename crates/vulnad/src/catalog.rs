//! The fixed catalog of CVE query operations.
//!
//! Each operation declares a JSON parameter schema for the model and maps
//! named arguments onto one store call. The reply shape is decided here, per
//! operation. Failures never leave this module as errors: unknown tools,
//! bad arguments and store failures all come back as text the model can read.

use serde_json::{json, Value};

use crate::store::CveStore;
use vulna_common::proto::ToolInfo;
use vulna_common::types::{FilterEcho, ToolReply};

/// Result-limit default shared by most list operations.
const DEFAULT_LIMIT: i64 = 10;
/// Recency defaults follow the feed's publishing cadence.
const DEFAULT_RECENT_DAYS: i64 = 30;
const DEFAULT_RECENT_LIMIT: i64 = 20;

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    schema: fn() -> Value,
}

/// The catalog served by this backend.
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        let tools = vec![
            ToolSpec {
                name: "query_cve_by_number",
                description: "Query CVE details by CVE number (e.g. CVE-2020-000001). \
                    Returns the complete record including severity, CVSS score, \
                    description and remediation.",
                schema: || {
                    object_schema(
                        json!({
                            "cve_number": {
                                "type": "string",
                                "description": "The CVE number to search for"
                            }
                        }),
                        &["cve_number"],
                    )
                },
            },
            ToolSpec {
                name: "query_cve_by_severity",
                description: "Query CVEs by severity level \
                    (CRITICAL, HIGH, MEDIUM or LOW).",
                schema: || {
                    object_schema(
                        json!({
                            "severity": {
                                "type": "string",
                                "description": "Severity level: CRITICAL, HIGH, MEDIUM or LOW"
                            },
                            "limit": limit_schema(DEFAULT_LIMIT)
                        }),
                        &["severity"],
                    )
                },
            },
            ToolSpec {
                name: "query_cve_by_cvss_range",
                description: "Query CVEs whose CVSS score lies in an inclusive range.",
                schema: || {
                    object_schema(
                        json!({
                            "min_score": {
                                "type": "number",
                                "description": "Minimum CVSS score (0.0-10.0)"
                            },
                            "max_score": {
                                "type": "number",
                                "description": "Maximum CVSS score (0.0-10.0)"
                            },
                            "limit": limit_schema(DEFAULT_LIMIT)
                        }),
                        &["min_score", "max_score"],
                    )
                },
            },
            ToolSpec {
                name: "query_cve_by_keyword",
                description: "Search CVEs by keyword in title, description or keywords.",
                schema: || {
                    object_schema(
                        json!({
                            "keyword": {
                                "type": "string",
                                "description": "Keyword to search for"
                            },
                            "limit": limit_schema(DEFAULT_LIMIT)
                        }),
                        &["keyword"],
                    )
                },
            },
            ToolSpec {
                name: "query_cve_by_product",
                description: "Query CVEs by affected product name \
                    (e.g. 'Red Hat', 'Windows', 'Apache').",
                schema: || {
                    object_schema(
                        json!({
                            "product_name": {
                                "type": "string",
                                "description": "Product name to search for"
                            },
                            "limit": limit_schema(DEFAULT_LIMIT)
                        }),
                        &["product_name"],
                    )
                },
            },
            ToolSpec {
                name: "query_cve_with_exploit",
                description: "Query CVEs with (or without) a known public exploit.",
                schema: || {
                    object_schema(
                        json!({
                            "exploit_exists": {
                                "type": "boolean",
                                "description": "True for CVEs with exploits, false for without",
                                "default": true
                            },
                            "limit": limit_schema(DEFAULT_LIMIT)
                        }),
                        &[],
                    )
                },
            },
            ToolSpec {
                name: "query_cve_by_cisa_kev",
                description: "Query CVEs listed in the CISA Known Exploited \
                    Vulnerabilities catalog.",
                schema: || object_schema(json!({"limit": limit_schema(DEFAULT_LIMIT)}), &[]),
            },
            ToolSpec {
                name: "query_cve_by_attack_type",
                description: "Query CVEs by attack type \
                    (e.g. 'Buffer Overflow', 'SQL Injection', 'XSS').",
                schema: || {
                    object_schema(
                        json!({
                            "attack_type": {
                                "type": "string",
                                "description": "Type of attack"
                            },
                            "limit": limit_schema(DEFAULT_LIMIT)
                        }),
                        &["attack_type"],
                    )
                },
            },
            ToolSpec {
                name: "query_recent_cves",
                description: "Query recently modified CVEs within a lookback window.",
                schema: || {
                    object_schema(
                        json!({
                            "days": {
                                "type": "integer",
                                "description": "Number of days to look back",
                                "default": DEFAULT_RECENT_DAYS
                            },
                            "limit": limit_schema(DEFAULT_RECENT_LIMIT)
                        }),
                        &[],
                    )
                },
            },
            ToolSpec {
                name: "get_cve_statistics",
                description: "Get a statistical summary of the CVE collection: \
                    totals, per-severity counts with average CVSS, exploit and \
                    CISA KEV counts.",
                schema: || object_schema(json!({}), &[]),
            },
        ];

        Self { tools }
    }

    /// Advertise every operation for ListTools.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name.to_string(),
                description: t.description.to_string(),
                input_schema: (t.schema)(),
            })
            .collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Run one operation. Every failure mode is folded into the reply text.
    pub async fn execute(&self, store: &CveStore, name: &str, args: &Value) -> ToolReply {
        match self.dispatch(store, name, args).await {
            Ok(reply) => reply,
            Err(msg) => ToolReply::text(msg),
        }
    }

    async fn dispatch(
        &self,
        store: &CveStore,
        name: &str,
        args: &Value,
    ) -> Result<ToolReply, String> {
        match name {
            "query_cve_by_number" => {
                let number = require_str(args, "cve_number")?;
                let found = store
                    .find_by_number(&number)
                    .await
                    .map_err(|e| format!("Error querying CVE by number: {}", e))?;
                Ok(match found {
                    Some(record) => ToolReply::Single(record),
                    None => ToolReply::text(format!("No CVE found with number: {}", number)),
                })
            }

            "query_cve_by_severity" => {
                let severity = require_str(args, "severity")?;
                let limit = opt_int(args, "limit", DEFAULT_LIMIT)?;
                let results = store
                    .find_by_severity(&severity, limit)
                    .await
                    .map_err(|e| format!("Error querying CVE by severity: {}", e))?;
                Ok(ToolReply::list(echo(&[("severity", json!(severity))]), results))
            }

            "query_cve_by_cvss_range" => {
                let min_score = require_f64(args, "min_score")?;
                let max_score = require_f64(args, "max_score")?;
                let limit = opt_int(args, "limit", DEFAULT_LIMIT)?;
                let results = store
                    .find_by_cvss_range(min_score, max_score, limit)
                    .await
                    .map_err(|e| format!("Error querying CVE by CVSS range: {}", e))?;
                Ok(ToolReply::list(
                    echo(&[("min_score", json!(min_score)), ("max_score", json!(max_score))]),
                    results,
                ))
            }

            "query_cve_by_keyword" => {
                let keyword = require_str(args, "keyword")?;
                let limit = opt_int(args, "limit", DEFAULT_LIMIT)?;
                let results = store
                    .search_keyword(&keyword, limit)
                    .await
                    .map_err(|e| format!("Error querying CVE by keyword: {}", e))?;
                Ok(ToolReply::list(echo(&[("keyword", json!(keyword))]), results))
            }

            "query_cve_by_product" => {
                let product = require_str(args, "product_name")?;
                let limit = opt_int(args, "limit", DEFAULT_LIMIT)?;
                let results = store
                    .find_by_product(&product, limit)
                    .await
                    .map_err(|e| format!("Error querying CVE by product: {}", e))?;
                Ok(ToolReply::list(echo(&[("product", json!(product))]), results))
            }

            "query_cve_with_exploit" => {
                let exploit_exists = opt_bool(args, "exploit_exists", true)?;
                let limit = opt_int(args, "limit", DEFAULT_LIMIT)?;
                let results = store
                    .find_by_exploit(exploit_exists, limit)
                    .await
                    .map_err(|e| format!("Error querying CVE with exploit: {}", e))?;
                Ok(ToolReply::list(
                    echo(&[("exploit_exists", json!(exploit_exists))]),
                    results,
                ))
            }

            "query_cve_by_cisa_kev" => {
                let limit = opt_int(args, "limit", DEFAULT_LIMIT)?;
                let results = store
                    .find_cisa_kev(limit)
                    .await
                    .map_err(|e| format!("Error querying CISA KEV CVEs: {}", e))?;
                Ok(ToolReply::list(echo(&[]), results))
            }

            "query_cve_by_attack_type" => {
                let attack_type = require_str(args, "attack_type")?;
                let limit = opt_int(args, "limit", DEFAULT_LIMIT)?;
                let results = store
                    .find_by_attack_type(&attack_type, limit)
                    .await
                    .map_err(|e| format!("Error querying CVE by attack type: {}", e))?;
                Ok(ToolReply::list(echo(&[("attack_type", json!(attack_type))]), results))
            }

            "query_recent_cves" => {
                let days = opt_int(args, "days", DEFAULT_RECENT_DAYS)?;
                let limit = opt_int(args, "limit", DEFAULT_RECENT_LIMIT)?;
                let results = store
                    .find_recent(days, limit)
                    .await
                    .map_err(|e| format!("Error querying recent CVEs: {}", e))?;
                Ok(ToolReply::list(echo(&[("days_back", json!(days))]), results))
            }

            "get_cve_statistics" => {
                let stats = store
                    .statistics()
                    .await
                    .map_err(|e| format!("Error getting CVE statistics: {}", e))?;
                Ok(ToolReply::Statistics(stats))
            }

            other => Err(format!("Error: unknown tool '{}'", other)),
        }
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn limit_schema(default: i64) -> Value {
    json!({
        "type": "integer",
        "description": "Maximum number of results to return",
        "default": default
    })
}

fn echo(pairs: &[(&str, Value)]) -> FilterEcho {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn require_str(args: &Value, key: &str) -> Result<String, String> {
    match args.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(format!("Error: argument '{}' must be a non-empty string", key)),
        None => Err(format!("Error: missing required argument '{}'", key)),
    }
}

fn require_f64(args: &Value, key: &str) -> Result<f64, String> {
    match args.get(key) {
        Some(value) => value
            .as_f64()
            .ok_or_else(|| format!("Error: argument '{}' must be a number", key)),
        None => Err(format!("Error: missing required argument '{}'", key)),
    }
}

fn opt_int(args: &Value, key: &str, default: i64) -> Result<i64, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| format!("Error: argument '{}' must be an integer", key)),
    }
}

fn opt_bool(args: &Value, key: &str, default: bool) -> Result<bool, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| format!("Error: argument '{}' must be a boolean", key)),
    }
}
