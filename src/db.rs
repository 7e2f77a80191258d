//! Sqlite-backed repository and search index.
//!
//! Relation endpoints are stored as URIs (`info:fedora/<pid>`), lifecycle states as their
//! single-letter codes. Editions are indexed by identifier and issue date in their own table,
//! standing in for the search index.

use futures::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    migrate::{MigrateDatabase, Migration as SqlxMigration, MigrationSource, MigrationType, Migrator},
    sqlite::{Sqlite, SqliteConnectOptions},
    ConnectOptions, Pool, Row,
};
use std::{path::Path, str::FromStr};

use crate::{
    error::RelsyncError,
    properties::{Edge, LifecycleState, MatchCriteria, Pid, Predicate},
    repository::{DatastreamSource, EdgeQuery, EdgeStore},
};

#[derive(Debug, Clone)]
pub struct DbConnection {
    pub pool: Pool<Sqlite>,
    uri_prefix: String,
}

impl DbConnection {
    pub fn new<S: Into<String>>(pool: Pool<Sqlite>, uri_prefix: S) -> Self {
        DbConnection {
            pool,
            uri_prefix: uri_prefix.into(),
        }
    }

    fn uri(&self, pid: &Pid) -> String {
        pid.to_uri(&self.uri_prefix)
    }

    fn pid(&self, uri: &str) -> Pid {
        Pid::from_uri(uri, &self.uri_prefix)
    }

    fn edge_from_row(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Edge, RelsyncError> {
        Ok(Edge::new(
            self.pid(&row.try_get::<String, _>("subject")?),
            Predicate::new(row.try_get::<String, _>("predicate")?),
            self.pid(&row.try_get::<String, _>("object")?),
        ))
    }

    pub async fn put_record(&self, record: &Pid, state: LifecycleState) -> Result<(), RelsyncError> {
        sqlx::query("INSERT OR REPLACE INTO records (pid, state) VALUES (?, ?)")
            .bind(record.as_str())
            .bind(state.code())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn put_datastream(
        &self,
        record: &Pid,
        name: &str,
        content: &str,
    ) -> Result<(), RelsyncError> {
        sqlx::query("INSERT OR REPLACE INTO datastreams (pid, name, content) VALUES (?, ?, ?)")
            .bind(record.as_str())
            .bind(name)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Make `record` findable by [EdgeQuery::find] under `identifier`.
    pub async fn put_edition(
        &self,
        record: &Pid,
        identifier: &str,
        date_issued: &str,
    ) -> Result<(), RelsyncError> {
        sqlx::query("INSERT OR REPLACE INTO editions (pid, identifier, date_issued) VALUES (?, ?, ?)")
            .bind(record.as_str())
            .bind(identifier)
            .bind(date_issued)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records carrying a `datastream` metadata stream that are not editions themselves: the
    /// parents a full run reconciles.
    pub async fn title_records(&self, datastream: &str) -> Result<Vec<Pid>, RelsyncError> {
        let rows = sqlx::query(
            "SELECT DISTINCT pid FROM datastreams WHERE name = ? \
             AND pid NOT IN (SELECT pid FROM editions) ORDER BY pid",
        )
        .bind(datastream)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(Pid::new(row.try_get::<String, _>("pid")?)))
            .collect()
    }

    pub async fn state(&self, record: &Pid) -> Result<LifecycleState, RelsyncError> {
        let row = sqlx::query("SELECT state FROM records WHERE pid = ?")
            .bind(record.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RelsyncError::NotFound(format!("record {record}")))?;
        LifecycleState::from_str(&row.try_get::<String, _>("state")?)
    }

    async fn writable(&self, record: &Pid) -> Result<(), RelsyncError> {
        match self.state(record).await? {
            LifecycleState::Active => {
                Err(RelsyncError::Obstacle(format!("{record} is published")))
            }
            LifecycleState::Inactive => Ok(()),
        }
    }
}

impl EdgeQuery for DbConnection {
    async fn find(&self, criteria: &MatchCriteria) -> Result<Vec<Pid>, RelsyncError> {
        let rows = sqlx::query("SELECT pid, date_issued FROM editions WHERE identifier = ?")
            .bind(&criteria.identifier)
            .fetch_all(&self.pool)
            .await?;
        let mut hits = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let date_issued = row.try_get::<String, _>("date_issued")?;
            if criteria.covers(&date_issued) {
                hits.push((date_issued, Pid::new(row.try_get::<String, _>("pid")?)));
            }
        }
        hits.sort();
        tracing::debug!("[DbConnection] {} matched {} editions", criteria, hits.len());
        Ok(hits.into_iter().map(|(_, pid)| pid).collect())
    }
}

impl EdgeStore for DbConnection {
    async fn inverse_edges(
        &self,
        parent: &Pid,
        predicate: &Predicate,
    ) -> Result<Vec<Edge>, RelsyncError> {
        let rows = sqlx::query(
            "SELECT subject, predicate, object FROM relations WHERE object = ? AND predicate = ?",
        )
        .bind(self.uri(parent))
        .bind(predicate.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| self.edge_from_row(row)).collect()
    }

    async fn named_edges(
        &self,
        child: &Pid,
        predicate: &Predicate,
        object: Option<&Pid>,
    ) -> Result<Vec<Edge>, RelsyncError> {
        let rows = match object {
            Some(object) => {
                sqlx::query(
                    "SELECT subject, predicate, object FROM relations \
                     WHERE subject = ? AND predicate = ? AND object = ?",
                )
                .bind(self.uri(child))
                .bind(predicate.as_str())
                .bind(self.uri(object))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT subject, predicate, object FROM relations \
                     WHERE subject = ? AND predicate = ?",
                )
                .bind(self.uri(child))
                .bind(predicate.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(|row| self.edge_from_row(row)).collect()
    }

    async fn add_edge(
        &self,
        child: &Pid,
        predicate: &Predicate,
        parent: &Pid,
        comment: &str,
    ) -> Result<(), RelsyncError> {
        self.writable(child).await?;
        sqlx::query("INSERT OR IGNORE INTO relations (subject, predicate, object) VALUES (?, ?, ?)")
            .bind(self.uri(child))
            .bind(predicate.as_str())
            .bind(self.uri(parent))
            .execute(&self.pool)
            .await?;
        tracing::trace!("[DbConnection] add {} -> {}: {}", child, parent, comment);
        Ok(())
    }

    async fn delete_edge(
        &self,
        child: &Pid,
        predicate: &Predicate,
        parent: &Pid,
        comment: &str,
    ) -> Result<(), RelsyncError> {
        self.writable(child).await?;
        sqlx::query("DELETE FROM relations WHERE subject = ? AND predicate = ? AND object = ?")
            .bind(self.uri(child))
            .bind(predicate.as_str())
            .bind(self.uri(parent))
            .execute(&self.pool)
            .await?;
        tracing::trace!("[DbConnection] delete {} -> {}: {}", child, parent, comment);
        Ok(())
    }

    async fn set_state(
        &self,
        record: &Pid,
        state: LifecycleState,
        comment: &str,
    ) -> Result<(), RelsyncError> {
        let result = sqlx::query("UPDATE records SET state = ? WHERE pid = ?")
            .bind(state.code())
            .bind(record.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RelsyncError::NotFound(format!("record {record}")));
        }
        tracing::trace!("[DbConnection] {} -> {}: {}", record, state, comment);
        Ok(())
    }
}

impl DatastreamSource for DbConnection {
    async fn datastream(&self, record: &Pid, name: &str) -> Result<String, RelsyncError> {
        let row = sqlx::query("SELECT content FROM datastreams WHERE pid = ? AND name = ?")
            .bind(record.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RelsyncError::NotFound(format!("datastream {name} of {record}")))?;
        Ok(row.try_get::<String, _>("content")?)
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
    pub kind: MigrationType,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            let mut migrations = Vec::new();
            for migration in self.0 {
                if matches!(migration.kind, MigrationType::ReversibleUp) {
                    migrations.push(SqlxMigration::new(
                        migration.version,
                        migration.description.into(),
                        migration.kind,
                        migration.sql.into(),
                        false,
                    ));
                }
            }
            Ok(migrations)
        })
    }
}

fn migrations() -> MigrationList {
    MigrationList(vec![Migration {
        version: 1,
        description: "create_initial_tables",
        sql: "\
        CREATE TABLE records (pid TEXT PRIMARY KEY, state TEXT NOT NULL); \
        CREATE TABLE datastreams (pid TEXT NOT NULL, name TEXT NOT NULL, content TEXT NOT NULL, UNIQUE(pid, name)); \
        CREATE TABLE relations (subject TEXT NOT NULL, predicate TEXT NOT NULL, object TEXT NOT NULL, UNIQUE(subject, predicate, object)); \
        CREATE TABLE editions (pid TEXT PRIMARY KEY, identifier TEXT NOT NULL, date_issued TEXT NOT NULL); \
        CREATE INDEX editions_identifier ON editions (identifier); \
        CREATE INDEX relations_object ON relations (object, predicate);",
        kind: MigrationType::ReversibleUp,
    }])
}

/// Open (creating if needed) the sqlite database at `db_path` and bring its schema up to date.
pub async fn db_init(db_path: &Path) -> Result<Pool<Sqlite>, RelsyncError> {
    let fqdb = format!("sqlite:{}", db_path.display());
    tracing::debug!("Initializing relation db from file: {:?}", fqdb);
    if !Sqlite::database_exists(&fqdb).await.unwrap_or(false) {
        Sqlite::create_database(&fqdb).await?;
    }
    let options = SqliteConnectOptions::from_str(&fqdb)?
        .read_only(false)
        .disable_statement_logging()
        .create_if_missing(true);
    let pool = sqlx::pool::PoolOptions::<Sqlite>::new()
        .connect_with(options)
        .await?;

    let migrator = Migrator::new(migrations()).await?;
    migrator.run(&pool).await?;

    let records = sqlx::query("SELECT COUNT(*) FROM records;")
        .fetch_one(&pool)
        .await?;
    let relations = sqlx::query("SELECT COUNT(*) FROM relations;")
        .fetch_one(&pool)
        .await?;
    tracing::info!(
        "DB Connection initialized.\n \
         \tRecord count:\t{:?} \n \
         \tRelation count:\t{:?}",
        records.try_get::<i64, usize>(0)?,
        relations.try_get::<i64, usize>(0)?
    );

    Ok(pool)
}
