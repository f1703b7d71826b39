//! SQLite-backed CVE collection.
//!
//! Single connection behind an async mutex; every operation is read-only
//! except `insert`, which only the import path uses. Results come back in
//! insertion order unless an operation defines its own ordering.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use vulna_common::types::{CveRecord, CveStatistics, SeverityCount};

/// Handle to the CVE store. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct CveStore {
    conn: Arc<Mutex<Connection>>,
}

impl CveStore {
    /// Open or create the store at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        info!("Opening CVE store at {}", path.display());

        let path: PathBuf = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path).context("Failed to open SQLite database")?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .context("Database open task failed")??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or replace one record, keyed by CVE number.
    pub async fn insert(&self, record: &CveRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO cves (
                cve_number, cve_title, severity, cvss_score, description,
                keywords, affected_products, classifications_exploit,
                classifications_attack_type, classifications_location,
                classifications_impact, cisa_key, remediation,
                source_last_modified_date
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(cve_number) DO UPDATE SET
                cve_title = excluded.cve_title,
                severity = excluded.severity,
                cvss_score = excluded.cvss_score,
                description = excluded.description,
                keywords = excluded.keywords,
                affected_products = excluded.affected_products,
                classifications_exploit = excluded.classifications_exploit,
                classifications_attack_type = excluded.classifications_attack_type,
                classifications_location = excluded.classifications_location,
                classifications_impact = excluded.classifications_impact,
                cisa_key = excluded.cisa_key,
                remediation = excluded.remediation,
                source_last_modified_date = excluded.source_last_modified_date",
            params![
                record.cve_number,
                record.cve_title,
                record.severity,
                record.cvss_score,
                record.description,
                record.keywords,
                record.affected_products,
                record.classifications_exploit,
                record.classifications_attack_type,
                record.classifications_location,
                record.classifications_impact,
                record.cisa_key,
                record.remediation,
                record.source_last_modified_date.map(|d| d.to_rfc3339()),
            ],
        )
        .context("Failed to insert CVE record")?;
        Ok(())
    }

    /// Look up one record by CVE number.
    pub async fn find_by_number(&self, cve_number: &str) -> Result<Option<CveRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select("WHERE cve_number = ?1 LIMIT 1"))?;
        let mut rows = stmt.query_map(params![cve_number], row_to_record)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Records matching a severity level, case-insensitively.
    pub async fn find_by_severity(&self, severity: &str, limit: i64) -> Result<Vec<CveRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select("WHERE severity = ?1 ORDER BY id LIMIT ?2"))?;
        let rows = stmt.query_map(params![severity.to_uppercase(), limit], row_to_record)?;
        collect(rows)
    }

    /// Records with a CVSS score in `[min_score, max_score]`, both inclusive.
    pub async fn find_by_cvss_range(
        &self,
        min_score: f64,
        max_score: f64,
        limit: i64,
    ) -> Result<Vec<CveRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select(
            "WHERE cvss_score >= ?1 AND cvss_score <= ?2 ORDER BY id LIMIT ?3",
        ))?;
        let rows = stmt.query_map(params![min_score, max_score, limit], row_to_record)?;
        collect(rows)
    }

    /// Case-insensitive substring search over title, description and keywords.
    pub async fn search_keyword(&self, keyword: &str, limit: i64) -> Result<Vec<CveRecord>> {
        let pattern = like_pattern(keyword);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select(
            "WHERE lower(cve_title) LIKE ?1
                OR lower(description) LIKE ?1
                OR lower(keywords) LIKE ?1
              ORDER BY id LIMIT ?2",
        ))?;
        let rows = stmt.query_map(params![pattern, limit], row_to_record)?;
        collect(rows)
    }

    /// Records whose affected-products field mentions the given product.
    pub async fn find_by_product(&self, product: &str, limit: i64) -> Result<Vec<CveRecord>> {
        let pattern = like_pattern(product);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select(
            "WHERE lower(affected_products) LIKE ?1 ORDER BY id LIMIT ?2",
        ))?;
        let rows = stmt.query_map(params![pattern, limit], row_to_record)?;
        collect(rows)
    }

    /// Records with (or explicitly without) a known public exploit.
    pub async fn find_by_exploit(&self, exploit_exists: bool, limit: i64) -> Result<Vec<CveRecord>> {
        let conn = self.conn.lock().await;
        let clause = if exploit_exists {
            "WHERE classifications_exploit = 'Exploit Exists' ORDER BY id LIMIT ?1"
        } else {
            "WHERE classifications_exploit <> 'Exploit Exists' ORDER BY id LIMIT ?1"
        };
        let mut stmt = conn.prepare(&select(clause))?;
        let rows = stmt.query_map(params![limit], row_to_record)?;
        collect(rows)
    }

    /// Records listed in the CISA Known Exploited Vulnerabilities catalog.
    pub async fn find_cisa_kev(&self, limit: i64) -> Result<Vec<CveRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select("WHERE cisa_key = 'Yes' ORDER BY id LIMIT ?1"))?;
        let rows = stmt.query_map(params![limit], row_to_record)?;
        collect(rows)
    }

    /// Records whose attack type mentions the given string.
    pub async fn find_by_attack_type(&self, attack_type: &str, limit: i64) -> Result<Vec<CveRecord>> {
        let pattern = like_pattern(attack_type);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select(
            "WHERE lower(classifications_attack_type) LIKE ?1 ORDER BY id LIMIT ?2",
        ))?;
        let rows = stmt.query_map(params![pattern, limit], row_to_record)?;
        collect(rows)
    }

    /// Records modified within the last `days` days, newest first.
    pub async fn find_recent(&self, days: i64, limit: i64) -> Result<Vec<CveRecord>> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&select(
            "WHERE source_last_modified_date >= ?1
              ORDER BY source_last_modified_date DESC LIMIT ?2",
        ))?;
        let rows = stmt.query_map(params![cutoff, limit], row_to_record)?;
        collect(rows)
    }

    /// Aggregate summary. An empty collection yields zero counts, not an error.
    pub async fn statistics(&self) -> Result<CveStatistics> {
        let conn = self.conn.lock().await;

        let total_cves =
            conn.query_row("SELECT COUNT(*) FROM cves", [], |row| row.get::<_, i64>(0))? as u64;

        let mut stmt = conn.prepare(
            "SELECT severity, COUNT(*), AVG(cvss_score)
               FROM cves GROUP BY severity ORDER BY severity",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SeverityCount {
                severity: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
                // Stable two-decimal output keeps the envelope readable.
                avg_cvss: (row.get::<_, f64>(2)? * 100.0).round() / 100.0,
            })
        })?;
        let by_severity = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        let cisa_kev_count = conn.query_row(
            "SELECT COUNT(*) FROM cves WHERE cisa_key = 'Yes'",
            [],
            |row| row.get::<_, i64>(0),
        )? as u64;
        let with_exploit_count = conn.query_row(
            "SELECT COUNT(*) FROM cves WHERE classifications_exploit = 'Exploit Exists'",
            [],
            |row| row.get::<_, i64>(0),
        )? as u64;

        Ok(CveStatistics {
            total_cves,
            by_severity,
            cisa_kev_count,
            with_exploit_count,
        })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cves (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cve_number TEXT NOT NULL UNIQUE,
            cve_title TEXT NOT NULL DEFAULT '',
            severity TEXT NOT NULL DEFAULT '',
            cvss_score REAL NOT NULL DEFAULT 0.0,
            description TEXT NOT NULL DEFAULT '',
            keywords TEXT NOT NULL DEFAULT '',
            affected_products TEXT NOT NULL DEFAULT '',
            classifications_exploit TEXT NOT NULL DEFAULT '',
            classifications_attack_type TEXT NOT NULL DEFAULT '',
            classifications_location TEXT NOT NULL DEFAULT '',
            classifications_impact TEXT NOT NULL DEFAULT '',
            cisa_key TEXT NOT NULL DEFAULT '',
            remediation TEXT,
            source_last_modified_date TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_cves_severity ON cves(severity);
         CREATE INDEX IF NOT EXISTS idx_cves_cvss ON cves(cvss_score);
         CREATE INDEX IF NOT EXISTS idx_cves_modified ON cves(source_last_modified_date);",
    )
    .context("Failed to initialize schema")?;
    Ok(())
}

const COLUMNS: &str = "cve_number, cve_title, severity, cvss_score, description, \
     keywords, affected_products, classifications_exploit, \
     classifications_attack_type, classifications_location, \
     classifications_impact, cisa_key, remediation, source_last_modified_date";

fn select(clause: &str) -> String {
    format!("SELECT {} FROM cves {}", COLUMNS, clause)
}

fn like_pattern(needle: &str) -> String {
    format!("%{}%", needle.to_lowercase())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CveRecord> {
    let modified: Option<String> = row.get(13)?;
    Ok(CveRecord {
        cve_number: row.get(0)?,
        cve_title: row.get(1)?,
        severity: row.get(2)?,
        cvss_score: row.get(3)?,
        description: row.get(4)?,
        keywords: row.get(5)?,
        affected_products: row.get(6)?,
        classifications_exploit: row.get(7)?,
        classifications_attack_type: row.get(8)?,
        classifications_location: row.get(9)?,
        classifications_impact: row.get(10)?,
        cisa_key: row.get(11)?,
        remediation: row.get(12)?,
        source_last_modified_date: modified
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<CveRecord>>,
) -> Result<Vec<CveRecord>> {
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to read CVE rows")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: &str, severity: &str, score: f64) -> CveRecord {
        CveRecord {
            cve_number: number.to_string(),
            cve_title: format!("Issue {}", number),
            severity: severity.to_string(),
            cvss_score: score,
            description: "A vulnerability allowing directory traversal".to_string(),
            keywords: "traversal, web".to_string(),
            affected_products: "Red Hat Enterprise Linux".to_string(),
            classifications_exploit: "Exploit Exists".to_string(),
            classifications_attack_type: "Directory Traversal".to_string(),
            classifications_location: "Remote".to_string(),
            classifications_impact: "Information Disclosure".to_string(),
            cisa_key: "No".to_string(),
            remediation: None,
            source_last_modified_date: Some(Utc::now()),
        }
    }

    async fn seeded() -> CveStore {
        let store = CveStore::open_in_memory().unwrap();
        for (i, sev, score) in [
            (1, "CRITICAL", 9.8),
            (2, "CRITICAL", 9.1),
            (3, "HIGH", 8.0),
            (4, "CRITICAL", 10.0),
            (5, "LOW", 2.1),
            (6, "CRITICAL", 9.0),
            (7, "CRITICAL", 8.9),
        ] {
            let mut rec = record(&format!("CVE-2024-{:06}", i), sev, score);
            if i == 5 {
                rec.cisa_key = "Yes".to_string();
                rec.classifications_exploit = "No Exploit".to_string();
            }
            store.insert(&rec).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_find_by_number_round_trip() {
        let store = seeded().await;
        let found = store.find_by_number("CVE-2024-000003").await.unwrap();
        assert_eq!(found.unwrap().cve_number, "CVE-2024-000003");

        let missing = store.find_by_number("CVE-1999-999999").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_severity_limit_and_insertion_order() {
        let store = seeded().await;
        let results = store.find_by_severity("critical", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].cve_number, "CVE-2024-000001");
        assert_eq!(results[1].cve_number, "CVE-2024-000002");
        assert_eq!(results[2].cve_number, "CVE-2024-000004");
    }

    #[tokio::test]
    async fn test_cvss_range_inclusive_bounds() {
        let store = seeded().await;
        let results = store.find_by_cvss_range(9.0, 10.0, 10).await.unwrap();
        let numbers: Vec<_> = results.iter().map(|r| r.cve_number.as_str()).collect();
        // 9.0 and 10.0 are both included; 8.9 and 8.0 are not.
        assert!(numbers.contains(&"CVE-2024-000004")); // 10.0
        assert!(numbers.contains(&"CVE-2024-000006")); // 9.0
        assert!(!numbers.contains(&"CVE-2024-000007")); // 8.9
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_keyword_search_is_case_insensitive() {
        let store = seeded().await;
        let results = store.search_keyword("DIRECTORY traversal", 10).await.unwrap();
        assert_eq!(results.len(), 7);
    }

    #[tokio::test]
    async fn test_exploit_and_kev_filters() {
        let store = seeded().await;
        let with = store.find_by_exploit(true, 10).await.unwrap();
        assert_eq!(with.len(), 6);
        let without = store.find_by_exploit(false, 10).await.unwrap();
        assert_eq!(without.len(), 1);
        let kev = store.find_cisa_kev(10).await.unwrap();
        assert_eq!(kev.len(), 1);
        assert_eq!(kev[0].cve_number, "CVE-2024-000005");
    }

    #[tokio::test]
    async fn test_recent_window_and_ordering() {
        let store = CveStore::open_in_memory().unwrap();
        let mut old = record("CVE-2020-000001", "HIGH", 7.0);
        old.source_last_modified_date = Some(Utc::now() - Duration::days(90));
        let mut newer = record("CVE-2024-000001", "HIGH", 7.5);
        newer.source_last_modified_date = Some(Utc::now() - Duration::days(2));
        let mut newest = record("CVE-2024-000002", "HIGH", 7.6);
        newest.source_last_modified_date = Some(Utc::now() - Duration::days(1));
        for rec in [&old, &newer, &newest] {
            store.insert(rec).await.unwrap();
        }

        let results = store.find_recent(30, 20).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].cve_number, "CVE-2024-000002");
        assert_eq!(results[1].cve_number, "CVE-2024-000001");
    }

    #[tokio::test]
    async fn test_statistics_on_empty_collection() {
        let store = CveStore::open_in_memory().unwrap();
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_cves, 0);
        assert!(stats.by_severity.is_empty());
        assert_eq!(stats.cisa_kev_count, 0);
        assert_eq!(stats.with_exploit_count, 0);
    }

    #[tokio::test]
    async fn test_statistics_breakdown() {
        let store = seeded().await;
        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_cves, 7);
        assert_eq!(stats.cisa_kev_count, 1);
        assert_eq!(stats.with_exploit_count, 6);

        let critical = stats
            .by_severity
            .iter()
            .find(|s| s.severity == "CRITICAL")
            .unwrap();
        assert_eq!(critical.count, 5);
        // (9.8 + 9.1 + 10.0 + 9.0 + 8.9) / 5 = 9.36
        assert!((critical.avg_cvss - 9.36).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_insert_replaces_by_cve_number() {
        let store = CveStore::open_in_memory().unwrap();
        store.insert(&record("CVE-2024-000001", "LOW", 2.0)).await.unwrap();
        store.insert(&record("CVE-2024-000001", "HIGH", 8.0)).await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_cves, 1);
        let found = store.find_by_number("CVE-2024-000001").await.unwrap().unwrap();
        assert_eq!(found.severity, "HIGH");
    }
}
