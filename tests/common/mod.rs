//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use relsync_core::{
    config::MaintainerConfig,
    memory::MemoryRepository,
    properties::{Edge, LifecycleState, Pid},
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub const TITLE_FAMILY: &str = "adresseavisen";

/// MODS for a title of [TITLE_FAMILY] issued between `start` and `end`.
#[allow(dead_code)]
pub fn title_mods(start: &str, end: &str) -> String {
    format!(
        r#"<mods:mods xmlns:mods="http://www.loc.gov/mods/v3">
    <mods:titleInfo><mods:title>Adresseavisen</mods:title></mods:titleInfo>
    <mods:identifier type="title_family">{TITLE_FAMILY}</mods:identifier>
    <mods:originInfo>
        <mods:dateIssued encoding="w3cdtf" point="start">{start}</mods:dateIssued>
        <mods:dateIssued encoding="w3cdtf" point="end">{end}</mods:dateIssued>
    </mods:originInfo>
</mods:mods>"#
    )
}

/// A published parent `title` and published children `a`, `b` and `c`. `wanted` children are
/// indexed inside the title's issue range, `linked` children already point at the parent.
#[allow(dead_code)]
pub fn scenario(
    config: &MaintainerConfig,
    title: &Pid,
    wanted: &[&str],
    linked: &[&str],
) -> MemoryRepository {
    let repo = MemoryRepository::new();
    repo.put_record(title, LifecycleState::Active);
    repo.put_datastream(
        title,
        &config.metadata.datastream,
        &title_mods("1759-01-01", "1800-12-31"),
    );
    for (day, child) in ["a", "b", "c"].iter().enumerate() {
        let child = Pid::from(*child);
        repo.put_record(&child, LifecycleState::Active);
        if wanted.contains(&child.as_str()) {
            repo.put_indexed(&child, TITLE_FAMILY, &format!("1760-01-0{}", day + 1));
        } else {
            // Same family, outside the title's range
            repo.put_indexed(&child, TITLE_FAMILY, "1900-01-01");
        }
        if linked.contains(&child.as_str()) {
            repo.put_edge(Edge::new(
                child.clone(),
                config.relation.predicate.clone(),
                title.clone(),
            ));
        }
    }
    repo
}
