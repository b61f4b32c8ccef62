//! Security audit over an unlocked vault.

use std::sync::Arc;
use vaultkeep_core::NewItem;
use vaultkeep_integration_tests::unlock;
use vaultkeep_sync::MemoryVaultStore;

#[tokio::test]
async fn test_report_over_large_vault() {
    let store = Arc::new(MemoryVaultStore::new());
    let session = unlock(store, "alice", "audit me").await;
    let engine = session.engine();

    // Enough items that analysis runs on the background worker
    for i in 0..60 {
        let password = format!("unique-password-{i:03}");
        engine
            .add(NewItem::login(format!("Site {i}"), Some("ada"), Some(&password)))
            .await
            .unwrap();
    }
    engine.add(NewItem::login("Reuse A", None, Some("shared-password"))).await.unwrap();
    engine.add(NewItem::login("Reuse B", None, Some("shared-password"))).await.unwrap();
    engine.add(NewItem::login("Short", None, Some("abc"))).await.unwrap();
    engine.add(NewItem::login("Empty", Some("ada"), None)).await.unwrap();
    engine.add(NewItem::note("Not a login", "body")).await.unwrap();

    let report = session.audit_report().await.unwrap();
    assert_eq!(report.total_items, 65);
    assert_eq!(report.duplicate, 2);
    assert_eq!(report.weak, 1);
    assert_eq!(report.missing, 1);
    assert_eq!(report.old, 0);
    assert_eq!(report.flagged_items(), 4);
    assert_eq!(report.score, 93);

    let highlighted = session.highlight().await.unwrap();
    assert_eq!(highlighted.len(), 4);
}
