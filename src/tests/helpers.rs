//! Shared test utilities for relation maintenance testing

use crate::{
    config::MaintainerConfig,
    memory::MemoryRepository,
    properties::{Edge, LifecycleState, Pid},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub const TITLE: &str = "uuid:title-berlingske";
pub const TITLE_FAMILY: &str = "berlingsketidende";
pub const EDITIONS: [&str; 5] = [
    "uuid:edition-1749-01-03",
    "uuid:edition-1749-01-07",
    "uuid:edition-1749-01-10",
    "uuid:edition-1749-01-14",
    "uuid:edition-1749-01-17",
];

/// A MODS document declaring `identifier` as title family and the given issue range.
pub fn mods_document(identifier: &str, start_date: &str, end_date: &str) -> String {
    let mut origin_info = String::new();
    if !start_date.is_empty() {
        origin_info.push_str(&format!(
            "\n        <dateIssued point=\"start\">{start_date}</dateIssued>"
        ));
    }
    if !end_date.is_empty() {
        origin_info.push_str(&format!(
            "\n        <dateIssued point=\"end\">{end_date}</dateIssued>"
        ));
    }
    format!(
        r#"<mods xmlns="http://www.loc.gov/mods/v3">
    <identifier type="title_family">{identifier}</identifier>
    <originInfo>{origin_info}
    </originInfo>
</mods>"#
    )
}

/// A published title record whose MODS matches the `wanted` editions, with `linked` editions
/// already pointing at it. Every edition is published.
pub fn title_repository(
    config: &MaintainerConfig,
    wanted: &[&str],
    linked: &[&str],
) -> MemoryRepository {
    let repo = MemoryRepository::new();
    let title = Pid::from(TITLE);
    repo.put_record(&title, LifecycleState::Active);
    repo.put_datastream(
        &title,
        &config.metadata.datastream,
        &mods_document(TITLE_FAMILY, "1749-01-01", "1762-12-31"),
    );
    for edition in EDITIONS.iter() {
        repo.put_record(&Pid::from(*edition), LifecycleState::Active);
    }
    for edition in wanted.iter() {
        // The edition pid carries its issue date
        let date = edition.trim_start_matches("uuid:edition-");
        repo.put_indexed(&Pid::from(*edition), TITLE_FAMILY, date);
    }
    for edition in linked.iter() {
        repo.put_edge(Edge::new(
            Pid::from(*edition),
            config.relation.predicate.clone(),
            title.clone(),
        ));
    }
    repo
}
