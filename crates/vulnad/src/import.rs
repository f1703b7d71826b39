//! Bulk ingestion of CVE records from a JSON file.
//!
//! The file is a JSON array of records in the feed's field naming. Records
//! that fail to insert are counted and logged, not fatal: a partially
//! imported collection is still queryable.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::store::CveStore;
use vulna_common::types::CveRecord;

/// Outcome of one import run.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
}

/// Load a JSON array of records into the store.
pub async fn import_file(store: &CveStore, path: &Path) -> Result<ImportReport> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let records: Vec<CveRecord> =
        serde_json::from_str(&raw).context("Failed to parse CVE JSON array")?;

    info!("Importing {} records from {}", records.len(), path.display());

    let mut report = ImportReport::default();
    for record in &records {
        match store.insert(record).await {
            Ok(()) => report.imported += 1,
            Err(e) => {
                warn!("Skipping {}: {}", record.cve_number, e);
                report.failed += 1;
            }
        }
    }

    info!("Imported {} records ({} failed)", report.imported, report.failed);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_import_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"cve_number": "CVE-2022-000001", "severity": "HIGH", "cvss_score": 8.2}},
                {{"cve_number": "CVE-2022-000002", "severity": "LOW", "cvss_score": 1.9}}
            ]"#
        )
        .unwrap();

        let store = CveStore::open_in_memory().unwrap();
        let report = import_file(&store, file.path()).await.unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 0);

        let found = store.find_by_number("CVE-2022-000001").await.unwrap();
        assert_eq!(found.unwrap().severity, "HIGH");
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let store = CveStore::open_in_memory().unwrap();
        assert!(import_file(&store, file.path()).await.is_err());
    }
}
