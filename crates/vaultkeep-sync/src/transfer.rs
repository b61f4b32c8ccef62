//! Vault export and import.
//!
//! An export is a plaintext JSON document: items grouped by category plus a
//! small metadata header. Import checks the whole document before adding
//! anything, then adds item by item and reports what failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use vaultkeep_core::{ItemCategory, ItemId, NewItem, VaultItem};

use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};

/// Version written into new exports and the only one accepted on import.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub item_count: usize,
}

/// A plaintext vault export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    #[serde(default)]
    pub items: BTreeMap<ItemCategory, Vec<VaultItem>>,
}

impl ExportDocument {
    /// Group `items` by category.
    pub fn new(items: impl IntoIterator<Item = VaultItem>, exported_at: DateTime<Utc>) -> Self {
        let mut grouped: BTreeMap<ItemCategory, Vec<VaultItem>> = BTreeMap::new();
        for item in items {
            grouped.entry(item.category()).or_default().push(item);
        }
        for section in grouped.values_mut() {
            section.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        }

        let item_count = grouped.values().map(Vec::len).sum();
        Self {
            metadata: ExportMetadata {
                format_version: FORMAT_VERSION,
                exported_at,
                item_count,
            },
            items: grouped,
        }
    }

    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &VaultItem> {
        self.items.values().flatten()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document. Malformed JSON is an import validation failure.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::ImportValidation(format!("malformed export document: {e}")))
    }

    /// Check the document, collecting every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.metadata.format_version != FORMAT_VERSION {
            errors.push(format!(
                "unsupported format_version {} (expected {FORMAT_VERSION})",
                self.metadata.format_version
            ));
        }

        let actual = self.len();
        if self.metadata.item_count != actual {
            errors.push(format!(
                "item_count is {} but the document holds {actual} items",
                self.metadata.item_count
            ));
        }

        for (section, items) in &self.items {
            for (index, item) in items.iter().enumerate() {
                if item.category() != *section {
                    errors.push(format!(
                        "{section}[{index}] is a {} item",
                        item.category()
                    ));
                }
                if let Err(e) = item.validate() {
                    errors.push(format!("{section}[{index}]: {e}"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyncError::ImportValidation(errors.join("; ")))
        }
    }
}

/// Outcome of an import that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub ids: Vec<ItemId>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Export the readable items of `engine`'s vault.
///
/// Records that cannot be decrypted are left out and logged.
pub fn export_vault(engine: &SyncEngine) -> Result<ExportDocument> {
    let snapshot = engine.snapshot();
    let skipped = snapshot.unreadable().count();
    if skipped > 0 {
        warn!(user_id = %engine.user(), skipped, "unreadable items left out of export");
    }

    let document = ExportDocument::new(snapshot.items().cloned(), Utc::now());
    info!(user_id = %engine.user(), items = document.metadata.item_count, "vault exported");
    Ok(document)
}

/// Import `document` into `engine`'s vault.
///
/// An invalid document is rejected before any item is added. After that,
/// items are added one at a time and individual failures are reported in
/// the returned [`ImportReport`] instead of aborting the import.
pub async fn import_vault(engine: &SyncEngine, document: ExportDocument) -> Result<ImportReport> {
    document.validate()?;

    let mut report = ImportReport::default();
    for item in document.items.into_values().flatten() {
        let name = item.name.clone();
        match engine.add(into_new_item(item)).await {
            Ok(id) => {
                report.imported += 1;
                report.ids.push(id);
            }
            Err(SyncError::KeyUnavailable) => return Err(SyncError::KeyUnavailable),
            Err(e) => {
                report.failed += 1;
                report.errors.push(format!("{name}: {e}"));
            }
        }
    }

    info!(
        user_id = %engine.user(),
        imported = report.imported,
        failed = report.failed,
        "vault import finished"
    );
    Ok(report)
}

fn into_new_item(item: VaultItem) -> NewItem {
    NewItem {
        name: item.name,
        notes: item.notes,
        favorite: item.favorite,
        tags: item.tags,
        details: item.details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryVaultStore, VaultStore};
    use std::sync::Arc;
    use vaultkeep_core::config::ConfigBuilder;
    use vaultkeep_core::{ItemDetails, UserId};
    use vaultkeep_crypto::SessionKey;

    async fn engine(store: Arc<MemoryVaultStore>) -> SyncEngine {
        let config = ConfigBuilder::new().retry(10, 40, 3).build();
        let engine = SyncEngine::new(UserId::new("alice"), store, SessionKey::random(), &config);
        engine.start().await.unwrap();
        engine
    }

    fn item(id: &str, new: NewItem) -> VaultItem {
        VaultItem::from_new(ItemId::new(id), new, Utc::now())
    }

    #[test]
    fn test_document_groups_by_category() {
        let document = ExportDocument::new(
            vec![
                item("1", NewItem::login("Zebra", None, Some("pw"))),
                item("2", NewItem::note("Wifi", "abc")),
                item("3", NewItem::login("apple", None, None)),
            ],
            Utc::now(),
        );

        assert_eq!(document.metadata.item_count, 3);
        let logins: Vec<_> = document.items[&ItemCategory::Login]
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(logins, vec!["apple", "Zebra"]);

        let json = document.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["items"]["secure-note"].is_array());
        assert_eq!(ExportDocument::from_json(&json).unwrap(), document);
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = ExportDocument::from_json("{ not json");
        assert!(matches!(result, Err(SyncError::ImportValidation(_))));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut document = ExportDocument::new(
            vec![item("1", NewItem::note("Wifi", "abc")), item("2", NewItem::note("  ", ""))],
            Utc::now(),
        );
        document.metadata.format_version = 7;
        document.metadata.item_count = 5;
        document
            .items
            .entry(ItemCategory::CreditCard)
            .or_default()
            .push(item("3", NewItem::new("Visa", ItemDetails::Identity(Default::default()))));

        let Err(SyncError::ImportValidation(message)) = document.validate() else {
            panic!("expected validation failure");
        };
        assert!(message.contains("format_version"));
        assert!(message.contains("item_count"));
        assert!(message.contains("name must not be empty"));
        assert!(message.contains("credit-card[0] is a identity item"));
    }

    #[tokio::test]
    async fn test_invalid_import_adds_nothing() {
        let store = Arc::new(MemoryVaultStore::new());
        let engine = engine(store.clone()).await;
        let alice = UserId::new("alice");
        let before = store.get_change_info(&alice).await.unwrap();

        let mut document = ExportDocument::new(vec![item("1", NewItem::note("Wifi", "abc"))], Utc::now());
        document.metadata.item_count = 2;

        assert!(matches!(
            import_vault(&engine, document).await,
            Err(SyncError::ImportValidation(_))
        ));
        assert_eq!(store.get_change_info(&alice).await.unwrap(), before);
        assert!(engine.items().is_empty());
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = engine(Arc::new(MemoryVaultStore::new())).await;
        source
            .add(NewItem::login("GitHub", Some("octocat"), Some("s3cret-pass")).with_tag("dev"))
            .await
            .unwrap();
        source.add(NewItem::note("Wifi", "hunter2").with_favorite(true)).await.unwrap();

        let json = export_vault(&source).unwrap().to_json().unwrap();

        let target = engine(Arc::new(MemoryVaultStore::new())).await;
        let report = import_vault(&target, ExportDocument::from_json(&json).unwrap())
            .await
            .unwrap();
        assert_eq!(report.imported, 2);
        assert!(report.is_complete());

        let mut names: Vec<_> = target.items().into_iter().map(|i| i.name).collect();
        names.sort();
        assert_eq!(names, vec!["GitHub", "Wifi"]);

        let wifi = target.search("wifi").remove(0);
        assert!(wifi.favorite);
        assert_eq!(wifi.notes.as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn test_import_reports_individual_failures() {
        let store = Arc::new(MemoryVaultStore::new());
        let engine = engine(store.clone()).await;
        let document = ExportDocument::new(
            vec![item("1", NewItem::note("A", "a")), item("2", NewItem::note("B", "b"))],
            Utc::now(),
        );

        store.set_offline(true);
        let report = import_vault(&engine, document).await.unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors.len(), 2);
    }
}
