//! # SQLite-backed observation store
//!
//! [`SqliteStore`] implements [`ExposureStore`] over a single `observations` table. The
//! grouping-key column names come from configuration; the store interpolates them as
//! quoted identifiers after validating their character set, and binds every value as a
//! parameter.
//!
//! Timestamps are stored as TEXT in one canonical `%Y-%m-%d %H:%M:%S` format, so the
//! store's lexicographic comparisons are chronological comparisons.

use camino::Utf8Path;
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::constants::{Exposures, GroupingKey};
use crate::nightstack_errors::NightstackError;
use crate::stacking::StackBatch;
use crate::stage::{Stage, Status};
use crate::store::{AnchorDirection, DateWindow, ExposureStore};
use crate::exposures::Exposure;

/// Canonical TEXT timestamp format of the `obsdate` column.
pub const OBSDATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp in the canonical column format.
pub fn format_obsdate(value: &NaiveDateTime) -> String {
    value.format(OBSDATE_FORMAT).to_string()
}

/// Parse a timestamp from the canonical column format.
pub fn parse_obsdate(value: &str) -> Result<NaiveDateTime, NightstackError> {
    Ok(NaiveDateTime::parse_from_str(value, OBSDATE_FORMAT)?)
}

const OBSERVATIONS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY,
    telescope TEXT NOT NULL,
    camera TEXT NOT NULL,
    instrument TEXT NOT NULL,
    filter TEXT NOT NULL,
    imagetype TEXT NOT NULL,
    target TEXT NOT NULL,
    exptime REAL NOT NULL,
    obsdate TEXT NOT NULL,
    iobs INTEGER NOT NULL,
    nobs INTEGER NOT NULL,
    stage INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'unknown',
    "set" INTEGER NOT NULL DEFAULT 0
)
"#;

/// [`ExposureStore`] implementation over a SQLite `observations` table.
pub struct SqliteStore {
    conn: Connection,
    key_columns: Vec<String>,
}

impl SqliteStore {
    /// Open a store on an existing database file.
    ///
    /// Arguments
    /// ---------
    /// * `path`: the SQLite database file.
    /// * `key_columns`: the configured independent column names, in order.
    pub fn open(path: &Utf8Path, key_columns: Vec<String>) -> Result<Self, NightstackError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, key_columns)
    }

    /// Open an in-memory store; used by the simulator and the tests.
    pub fn open_in_memory(key_columns: Vec<String>) -> Result<Self, NightstackError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, key_columns)
    }

    fn with_connection(
        conn: Connection,
        key_columns: Vec<String>,
    ) -> Result<Self, NightstackError> {
        validate_identifiers(&key_columns)?;
        Ok(SqliteStore { conn, key_columns })
    }

    /// Create the `observations` table when it does not exist yet.
    pub fn init_schema(&self) -> Result<(), NightstackError> {
        self.conn.execute_batch(OBSERVATIONS_DDL)?;
        Ok(())
    }

    /// Direct access to the underlying connection, for ingestion and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// `"col1" = ? AND "col2" = ? ...` over the configured key columns.
    fn key_predicate(&self) -> String {
        self.key_columns
            .iter()
            .map(|c| format!("\"{c}\" = ?"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn quoted_key_columns(&self) -> String {
        self.key_columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn window_predicate(window: &DateWindow, clauses: &mut Vec<String>, args: &mut Vec<String>) {
        if let Some(from) = window.from {
            clauses.push("obsdate >= ?".to_string());
            args.push(format_obsdate(&from));
        }
        if let Some(to) = window.to {
            clauses.push("obsdate <= ?".to_string());
            args.push(format_obsdate(&to));
        }
    }
}

fn validate_identifiers(columns: &[String]) -> Result<(), NightstackError> {
    if columns.is_empty() {
        return Err(NightstackError::InvalidConfiguration(
            "independent columns list is empty".to_string(),
        ));
    }
    for column in columns {
        if column.is_empty()
            || !column
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(NightstackError::InvalidConfiguration(format!(
                "invalid independent column name: {column:?}"
            )));
        }
    }
    Ok(())
}

/// Row fields as stored, before the stage/status vocabulary is checked.
struct RawRow {
    id: i64,
    imagetype: String,
    target: String,
    filter: String,
    exptime: f64,
    obsdate: String,
    iobs: i64,
    nobs: i64,
    stage: i64,
    status: String,
    set: i64,
}

impl RawRow {
    /// Convert into an [`Exposure`], reporting vocabulary violations against the record id.
    fn into_exposure(self) -> Result<Exposure, NightstackError> {
        let id = self.id;
        let integrity = move |reason: String| NightstackError::DataIntegrity { id, reason };
        let stage = Stage::from_i64(self.stage).map_err(|e| integrity(e.to_string()))?;
        let status: Status = self
            .status
            .parse()
            .map_err(|e: NightstackError| integrity(e.to_string()))?;
        let obsdate = parse_obsdate(&self.obsdate).map_err(|e| integrity(e.to_string()))?;
        Ok(Exposure {
            id: self.id,
            imagetype: self.imagetype,
            target: self.target,
            filter: self.filter,
            exptime: self.exptime,
            obsdate,
            iobs: u32::try_from(self.iobs)
                .map_err(|_| integrity(format!("negative iobs: {}", self.iobs)))?,
            nobs: u32::try_from(self.nobs)
                .map_err(|_| integrity(format!("negative nobs: {}", self.nobs)))?,
            stage,
            status,
            set: self.set,
        })
    }
}

impl ExposureStore for SqliteStore {
    fn resolve_anchor(
        &self,
        direction: AnchorDirection,
        bound: NaiveDateTime,
    ) -> Result<Option<NaiveDateTime>, NightstackError> {
        let (comparison, order) = match direction {
            AnchorDirection::Earliest => (">=", "ASC"),
            AnchorDirection::Latest => ("<=", "DESC"),
        };
        let sql = format!(
            "SELECT obsdate FROM observations \
             WHERE status = 'completed' AND stage = 3 AND obsdate {comparison} ?1 \
             ORDER BY obsdate {order} LIMIT 1"
        );
        let anchor: Option<String> = self
            .conn
            .query_row(&sql, params![format_obsdate(&bound)], |row| row.get(0))
            .optional()?;
        anchor.as_deref().map(parse_obsdate).transpose()
    }

    fn distinct_keys(&self, window: &DateWindow) -> Result<Vec<GroupingKey>, NightstackError> {
        let columns = self.quoted_key_columns();
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        Self::window_predicate(window, &mut clauses, &mut args);

        let mut sql = format!("SELECT DISTINCT {columns} FROM observations");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY {columns}"));

        let width = self.key_columns.len();
        let mut stmt = self.conn.prepare(&sql)?;
        let keys = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                (0..width)
                    .map(|i| row.get::<_, String>(i))
                    .collect::<Result<Vec<String>, _>>()
            })?
            .map(|values| values.map(GroupingKey::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn query(
        &self,
        key: &GroupingKey,
        window: &DateWindow,
    ) -> Result<Exposures, NightstackError> {
        let mut clauses = vec![self.key_predicate()];
        let mut args: Vec<String> = key.values().to_vec();
        Self::window_predicate(window, &mut clauses, &mut args);

        let sql = format!(
            "SELECT id, imagetype, target, filter, exptime, obsdate, \
                    iobs, nobs, stage, status, \"set\" \
             FROM observations WHERE {} ORDER BY obsdate, id",
            clauses.join(" AND ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(RawRow {
                    id: row.get(0)?,
                    imagetype: row.get(1)?,
                    target: row.get(2)?,
                    filter: row.get(3)?,
                    exptime: row.get(4)?,
                    obsdate: row.get(5)?,
                    iobs: row.get(6)?,
                    nobs: row.get(7)?,
                    stage: row.get(8)?,
                    status: row.get(9)?,
                    set: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<RawRow>, _>>()?;

        rows.into_iter().map(RawRow::into_exposure).collect()
    }

    fn apply_updates(&mut self, batches: &[StackBatch]) -> Result<usize, NightstackError> {
        let mut applied = 0;
        for batch in batches {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "UPDATE observations SET stage = ?1, status = ?2, \"set\" = ?3 WHERE id = ?4",
                )?;
                for update in &batch.updates {
                    stmt.execute(params![
                        update.stage.as_i64(),
                        update.status.as_str(),
                        update.set,
                        update.id
                    ])?;
                }
            }
            tx.commit()?;
            applied += batch.updates.len();
        }
        debug!(batches = batches.len(), applied, "updates applied");
        Ok(applied)
    }
}
