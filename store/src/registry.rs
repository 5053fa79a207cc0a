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
    ModelRegistry,
};
use rusqlite::{
    params,
    Connection,
    ErrorCode,
    OptionalExtension,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::Path,
    sync::Mutex,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS model_registry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model_name TEXT NOT NULL,
    model_version TEXT NOT NULL,
    model_id TEXT NOT NULL UNIQUE,
    description TEXT,
    registered_at TEXT NOT NULL
);
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub model_id: ModelId,
    pub model_name: String,
    pub model_version: String,
    pub description: Option<String>,
    pub registered_at: DateTime<Utc>,
}

pub struct SqliteModelRegistry {
    conn: Mutex<Connection>,
}

impl SqliteModelRegistry {
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

    /// Registers a model version under the identifier derived from its name and
    /// version. Fails with [`StoreError::AlreadyRegistered`] for a known identifier.
    pub fn register(
        &self,
        model_name: &str,
        model_version: &str,
        description: Option<&str>,
    ) -> Result<RegisteredModel, StoreError> {
        let model = RegisteredModel {
            model_id: ModelId::from_name_and_version(model_name, model_version),
            model_name: model_name.to_string(),
            model_version: model_version.to_string(),
            description: description.map(str::to_string),
            registered_at: Utc::now(),
        };

        let conn = sqlite::lock(&self.conn)?;
        let inserted = conn.execute(
            "INSERT INTO model_registry (model_name, model_version, model_id, description, registered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                model.model_name,
                model.model_version,
                model.model_id.as_str(),
                model.description,
                sqlite::format_timestamp(model.registered_at),
            ],
        );
        match inserted {
            Ok(_) => {
                info!(model_id = %model.model_id, "registered model");
                Ok(model)
            }
            Err(rusqlite::Error::SqliteFailure(error, _)) if error.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::AlreadyRegistered(model.model_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn get(&self, model_id: &ModelId) -> Result<Option<RegisteredModel>, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT model_id, model_name, model_version, description, registered_at
                 FROM model_registry WHERE model_id = ?1",
                params![model_id.as_str()],
                read_row,
            )
            .optional()?;
        row.map(into_model).transpose()
    }

    /// Every registered model in registration order.
    pub fn list(&self) -> Result<Vec<RegisteredModel>, StoreError> {
        let conn = sqlite::lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT model_id, model_name, model_version, description, registered_at
             FROM model_registry ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], read_row)?;

        let mut models = Vec::new();
        for row in rows {
            models.push(into_model(row?)?);
        }
        Ok(models)
    }
}

type Row = (String, String, String, Option<String>, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_model((model_id, model_name, model_version, description, registered_at): Row) -> Result<RegisteredModel, StoreError> {
    Ok(RegisteredModel {
        model_id: ModelId::new(model_id),
        model_name,
        model_version,
        description,
        registered_at: sqlite::parse_timestamp(&registered_at)?,
    })
}

impl ModelRegistry for SqliteModelRegistry {
    fn list_registered_models(&self) -> eyre::Result<Vec<ModelId>> {
        Ok(self.list()?.into_iter().map(|model| model.model_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn register_derives_the_identifier() {
        let registry = SqliteModelRegistry::open_in_memory().unwrap();
        let model = registry.register("Cancer Model", "v1.0", Some("breast cancer")).unwrap();

        assert_eq!(model.model_id.as_str(), "cancer_model_v1.0");
        assert_eq!(registry.get(&model.model_id).unwrap().map(|m| m.model_name), Some("Cancer Model".to_string()));
        assert_eq!(registry.get(&ModelId::new("missing")).unwrap(), None);
    }

    #[test]
    fn duplicates_are_rejected() {
        let registry = SqliteModelRegistry::open_in_memory().unwrap();
        registry.register("Cancer Model", "v1.0", None).unwrap();

        let err = registry.register("cancer model", "v1.0", None).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRegistered(id) if id.as_str() == "cancer_model_v1.0"));
    }

    #[test]
    fn lists_in_registration_order() {
        let registry = SqliteModelRegistry::open_in_memory().unwrap();
        registry.register("b", "1", None).unwrap();
        registry.register("a", "2", None).unwrap();

        let ids = registry.list_registered_models().unwrap();
        assert_eq!(ids, vec![ModelId::new("b_1"), ModelId::new("a_2")]);
    }
}
