//! Reconciliation against the sqlite repository (requires the `service` feature).

#![cfg(feature = "service")]

mod common;

use common::{init_logging, title_mods, TITLE_FAMILY};
use relsync_core::{
    config::MaintainerConfig,
    db::{db_init, DbConnection},
    maintainer::RelationMaintainer,
    properties::{LifecycleState, Pid},
    repository::EdgeStore,
};
use tempfile::TempDir;

async fn seeded(temp_dir: &TempDir, config: &MaintainerConfig) -> DbConnection {
    let pool = db_init(&temp_dir.path().join("relsync.db")).await.unwrap();
    let db = DbConnection::new(pool, config.relation.uri_prefix.clone());
    let title = Pid::from("uuid:title");
    db.put_record(&title, LifecycleState::Active).await.unwrap();
    db.put_datastream(
        &title,
        &config.metadata.datastream,
        &title_mods("1759-01-01", "1800-12-31"),
    )
    .await
    .unwrap();
    for (child, date) in [
        ("uuid:a", "1760-01-01"),
        ("uuid:b", "1760-01-02T00:00:00.000+01:00"),
        ("uuid:c", "1900-01-01"),
    ] {
        let child = Pid::from(child);
        db.put_record(&child, LifecycleState::Active).await.unwrap();
        db.put_edition(&child, TITLE_FAMILY, date).await.unwrap();
    }
    db
}

#[tokio::test]
async fn test_reconcile_against_sqlite() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let config = MaintainerConfig::default();
    let db = seeded(&temp_dir, &config).await;
    let title = Pid::from("uuid:title");

    // "c" is linked but outside the title's range
    db.set_state(&Pid::from("uuid:c"), LifecycleState::Inactive, "setup")
        .await
        .unwrap();
    db.add_edge(&Pid::from("uuid:c"), &config.relation.predicate, &title, "setup")
        .await
        .unwrap();
    db.set_state(&Pid::from("uuid:c"), LifecycleState::Active, "setup")
        .await
        .unwrap();

    let maintainer = RelationMaintainer::new(&db, &db, &config).unwrap();
    assert_eq!(
        db.title_records(&config.metadata.datastream).await.unwrap(),
        vec![title.clone()]
    );
    let run = maintainer.maintain_all(vec![title.clone()]).await;
    assert!(!run.contains_failures());

    let report = run.succeeded().next().unwrap();
    assert_eq!(report.added, vec![Pid::from("uuid:a"), Pid::from("uuid:b")]);
    assert_eq!(report.removed, vec![Pid::from("uuid:c")]);

    let mut linked = db
        .inverse_edges(&title, &config.relation.predicate)
        .await
        .unwrap()
        .into_iter()
        .map(|edge| edge.subject)
        .collect::<Vec<_>>();
    linked.sort();
    assert_eq!(linked, vec![Pid::from("uuid:a"), Pid::from("uuid:b")]);
    for child in ["uuid:a", "uuid:b", "uuid:c"] {
        assert_eq!(
            db.state(&Pid::from(child)).await.unwrap(),
            LifecycleState::Active
        );
    }
}

#[tokio::test]
async fn test_reopened_database_keeps_relations() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let config = MaintainerConfig::default();
    let title = Pid::from("uuid:title");
    {
        let db = seeded(&temp_dir, &config).await;
        let maintainer = RelationMaintainer::new(&db, &db, &config).unwrap();
        maintainer.maintain(&title).await.unwrap();
        db.pool.close().await;
    }

    let pool = db_init(&temp_dir.path().join("relsync.db")).await.unwrap();
    let db = DbConnection::new(pool, config.relation.uri_prefix.clone());
    let maintainer = RelationMaintainer::new(&db, &db, &config).unwrap();
    let plan = maintainer.plan(&title).await.unwrap();
    assert!(plan.items.is_empty());
    assert_eq!(plan.current.len(), 2);
}
