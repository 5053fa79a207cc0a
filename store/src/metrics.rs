use crate::{
    error::StoreError,
    sqlite,
};
use chrono::{
    DateTime,
    Utc,
};
use drift_monitor_analysis::{
    FeatureDriftRow,
    MetricsStore,
    ModelId,
    PerformanceRow,
};
use rusqlite::{
    params,
    Connection,
};
use std::{
    path::Path,
    sync::Mutex,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS model_performance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    accuracy REAL NOT NULL,
    precision REAL NOT NULL,
    recall REAL NOT NULL,
    f1_score REAL NOT NULL,
    data_drift_score INTEGER NOT NULL,
    window_size INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS model_performance_model_time ON model_performance (model_id, timestamp);

CREATE TABLE IF NOT EXISTS feature_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    feature_name TEXT NOT NULL,
    drift_score REAL NOT NULL,
    drifted INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS feature_metrics_model_time ON feature_metrics (model_id, timestamp);
";

/// `model_performance` and `feature_metrics`, both append-only.
pub struct SqliteMetricsStore {
    conn: Mutex<Connection>,
}

impl SqliteMetricsStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(sqlite::open(path, SCHEMA)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(sqlite::open_in_memory(SCHEMA)?),
        })
    }

    /// Writes the performance row and its feature rows in one transaction.
    pub fn append(&self, performance: &PerformanceRow, features: &[FeatureDriftRow]) -> Result<(), StoreError> {
        let mut conn = sqlite::lock(&self.conn)?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO model_performance
                (model_id, timestamp, accuracy, precision, recall, f1_score, data_drift_score, window_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                performance.model_id.as_str(),
                sqlite::format_timestamp(performance.timestamp),
                performance.accuracy,
                performance.precision,
                performance.recall,
                performance.f1,
                performance.drift_score,
                i64::try_from(performance.window_size).unwrap_or(i64::MAX),
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO feature_metrics (model_id, timestamp, feature_name, drift_score, drifted)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in features {
                stmt.execute(params![
                    row.model_id.as_str(),
                    sqlite::format_timestamp(row.timestamp),
                    row.feature_name,
                    row.drift_score,
                    row.drifted,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// The performance series of `model_id`, oldest first.
    pub fn performance_series(&self, model_id: &ModelId) -> Result<Vec<PerformanceRow>, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, accuracy, precision, recall, f1_score, data_drift_score, window_size
             FROM model_performance
             WHERE model_id = ?1
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![model_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, u8>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut series = Vec::new();
        for row in rows {
            let (timestamp, accuracy, precision, recall, f1, drift_score, window_size) = row?;
            series.push(PerformanceRow {
                model_id: model_id.clone(),
                timestamp: sqlite::parse_timestamp(&timestamp)?,
                accuracy,
                precision,
                recall,
                f1,
                drift_score,
                window_size: usize::try_from(window_size).unwrap_or_default(),
            });
        }
        Ok(series)
    }

    /// The feature rows sharing the most recent timestamp of `model_id`, lowest
    /// drift score (strongest evidence of drift) first. Empty when nothing was
    /// persisted yet.
    pub fn latest_feature_drift(&self, model_id: &ModelId) -> Result<Vec<FeatureDriftRow>, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, feature_name, drift_score, drifted
             FROM feature_metrics
             WHERE model_id = ?1
               AND timestamp = (SELECT MAX(timestamp) FROM feature_metrics WHERE model_id = ?1)
             ORDER BY drift_score ASC, feature_name ASC",
        )?;
        let rows = stmt.query_map(params![model_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut snapshot = Vec::new();
        for row in rows {
            let (timestamp, feature_name, drift_score, drifted) = row?;
            snapshot.push(FeatureDriftRow {
                model_id: model_id.clone(),
                timestamp: sqlite::parse_timestamp(&timestamp)?,
                feature_name,
                drift_score,
                drifted,
            });
        }
        Ok(snapshot)
    }

    pub fn most_recent(&self, model_id: &ModelId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(timestamp) FROM model_performance WHERE model_id = ?1",
            params![model_id.as_str()],
            |row| row.get(0),
        )?;
        latest.as_deref().map(sqlite::parse_timestamp).transpose()
    }
}

impl MetricsStore for SqliteMetricsStore {
    fn persist(&self, performance: &PerformanceRow, features: &[FeatureDriftRow]) -> eyre::Result<()> {
        Ok(self.append(performance, features)?)
    }

    fn latest_timestamp(&self, model_id: &ModelId) -> eyre::Result<Option<DateTime<Utc>>> {
        Ok(self.most_recent(model_id)?)
    }

    fn ping(&self) -> eyre::Result<()> {
        let conn = sqlite::lock(&self.conn)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
