use crate::{
    error::StoreError,
    sqlite,
};
use chrono::{
    DateTime,
    Utc,
};
use drift_monitor_analysis::{
    ModelId,
    Observation,
    ObservationStore,
};
use rusqlite::{
    params,
    Connection,
};
use std::{
    collections::BTreeMap,
    path::Path,
    sync::Mutex,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS live_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_id TEXT NOT NULL,
    feature_json TEXT NOT NULL,
    ground_truth INTEGER NOT NULL,
    ingested_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS live_data_model_time ON live_data (model_id, ingested_at);
";

/// Append-only `live_data` table.
pub struct SqliteObservationStore {
    conn: Mutex<Connection>,
}

impl SqliteObservationStore {
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

    pub fn append(&self, observation: &Observation) -> Result<i64, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        conn.execute(
            "INSERT INTO live_data (model_id, feature_json, ground_truth, ingested_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                observation.model_id.as_str(),
                serde_json::to_string(&observation.features)?,
                observation.ground_truth,
                sqlite::format_timestamp(observation.ingested_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Number of observations of `model_id`, over all time.
    pub fn count(&self, model_id: &ModelId) -> Result<usize, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM live_data WHERE model_id = ?1",
            params![model_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn select_since(&self, model_id: &ModelId, since: DateTime<Utc>) -> Result<Vec<Observation>, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT feature_json, ground_truth, ingested_at
             FROM live_data
             WHERE model_id = ?1 AND ingested_at >= ?2
             ORDER BY ingested_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![model_id.as_str(), sqlite::format_timestamp(since)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut observations = Vec::new();
        for row in rows {
            let (feature_json, ground_truth, ingested_at) = row?;
            let features: BTreeMap<String, f64> = serde_json::from_str(&feature_json)?;
            observations.push(Observation {
                model_id: model_id.clone(),
                features,
                ground_truth,
                ingested_at: sqlite::parse_timestamp(&ingested_at)?,
            });
        }
        Ok(observations)
    }
}

impl ObservationStore for SqliteObservationStore {
    fn fetch_window(&self, model_id: &ModelId, since: DateTime<Utc>) -> eyre::Result<Vec<Observation>> {
        Ok(self.select_since(model_id, since)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn observation(id: &str, radius: f64, ingested_at: DateTime<Utc>) -> Observation {
        Observation {
            model_id: ModelId::new(id),
            features: BTreeMap::from([("mean radius".to_string(), radius), ("mean texture".to_string(), 10.0)]),
            ground_truth: 1,
            ingested_at,
        }
    }

    #[test]
    fn window_is_per_model_and_inclusive() {
        let store = SqliteObservationStore::open_in_memory().unwrap();
        let now = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let since = now - Duration::hours(1);

        store.append(&observation("a", 1.0, now - Duration::minutes(90))).unwrap();
        store.append(&observation("a", 2.0, since)).unwrap();
        store.append(&observation("b", 3.0, now)).unwrap();
        store.append(&observation("a", 4.0, now)).unwrap();

        let window = store.fetch_window(&ModelId::new("a"), since).unwrap();

        assert_eq!(
            window.iter().map(|o| o.features["mean radius"]).collect::<Vec<_>>(),
            vec![2.0, 4.0]
        );
        assert_eq!(window[0], observation("a", 2.0, since));
        assert_eq!(store.count(&ModelId::new("a")).unwrap(), 3);
    }

    #[test]
    fn rows_survive_reopening() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("live_data.db");
        let now = Utc::now();

        SqliteObservationStore::open(&path)
            .unwrap()
            .append(&observation("a", 1.0, now))
            .unwrap();
        let reopened = SqliteObservationStore::open(&path).unwrap();

        assert_eq!(reopened.fetch_window(&ModelId::new("a"), now - Duration::seconds(1)).unwrap().len(), 1);
    }
}
