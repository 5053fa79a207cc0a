use crate::logistic::LogisticModel;
use drift_monitor_analysis::{
    AssetError,
    AssetProvider,
    ModelAssets,
    ModelId,
    ReferenceTable,
};
use polars::prelude::{
    CsvReadOptions,
    DataType,
    SerReader,
};
use std::{
    fs::File,
    io::Cursor,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};

pub const REFERENCE_FILE: &str = "reference_data.csv";
pub const MODEL_FILE: &str = "model.json";

/// Reads reference data and models from `<root>/<model_id>/`.
#[derive(Debug, Clone)]
pub struct FsAssetProvider {
    root: PathBuf,
}

impl FsAssetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `None` for identifiers that are not a plain directory name.
    fn model_dir(&self, model_id: &ModelId) -> Option<PathBuf> {
        let id = model_id.as_str();
        let plain = !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\']);
        plain.then(|| self.root.join(id))
    }

    /// Validates the reference CSV and the model against each other without
    /// touching the filesystem.
    pub fn stage_assets(
        &self,
        model_id: &ModelId,
        reference_csv: &[u8],
        model: &LogisticModel,
    ) -> Result<StagedAssets, AssetError> {
        let dir = self.model_dir(model_id).ok_or_else(|| AssetError::InvalidModel {
            model_id: model_id.clone(),
            reason: "the identifier is not a valid directory name".to_string(),
        })?;
        let reference = read_reference(reference_csv.to_vec()).map_err(|reason| AssetError::InvalidReference {
            model_id: model_id.clone(),
            reason,
        })?;
        check_model(model_id, &reference, model)?;

        let model_json = serde_json::to_vec_pretty(model).map_err(|e| AssetError::InvalidModel {
            model_id: model_id.clone(),
            reason: e.to_string(),
        })?;

        Ok(StagedAssets {
            model_id: model_id.clone(),
            dir,
            reference_csv: reference_csv.to_vec(),
            model_json,
            rows: reference.n_rows(),
            features: reference.feature_names().len(),
        })
    }

    /// [`stage_assets`](Self::stage_assets) followed by [`StagedAssets::write`].
    pub fn store_assets(&self, model_id: &ModelId, reference_csv: &[u8], model: &LogisticModel) -> Result<(), AssetError> {
        self.stage_assets(model_id, reference_csv, model)?.write()
    }

    pub fn load_reference(&self, model_id: &ModelId) -> Result<ReferenceTable, AssetError> {
        let path = self.existing_file(model_id, REFERENCE_FILE)?;
        read_reference(std::fs::read(path)?).map_err(|reason| AssetError::InvalidReference {
            model_id: model_id.clone(),
            reason,
        })
    }

    pub fn load_model(&self, model_id: &ModelId) -> Result<LogisticModel, AssetError> {
        let path = self.existing_file(model_id, MODEL_FILE)?;
        let invalid = |reason: String| AssetError::InvalidModel {
            model_id: model_id.clone(),
            reason,
        };
        let model: LogisticModel = serde_json::from_reader(File::open(path)?).map_err(|e| invalid(e.to_string()))?;
        model.validate().map_err(invalid)?;
        Ok(model)
    }

    fn existing_file(&self, model_id: &ModelId, name: &str) -> Result<PathBuf, AssetError> {
        self.model_dir(model_id)
            .map(|dir| dir.join(name))
            .filter(|path| path.is_file())
            .ok_or_else(|| AssetError::AssetsNotFound(model_id.clone()))
    }
}

/// Validated assets of one model version that are not on disk yet.
#[derive(Debug)]
pub struct StagedAssets {
    model_id: ModelId,
    dir: PathBuf,
    reference_csv: Vec<u8>,
    model_json: Vec<u8>,
    rows: usize,
    features: usize,
}

impl StagedAssets {
    pub fn model_id(&self) -> &ModelId {
        &self.model_id
    }

    /// Each file is written beside its final name and renamed into place, so a
    /// reader never sees a partially written file.
    pub fn write(self) -> Result<(), AssetError> {
        std::fs::create_dir_all(&self.dir)?;
        for (name, contents) in [(REFERENCE_FILE, &self.reference_csv), (MODEL_FILE, &self.model_json)] {
            let partial = self.dir.join(format!(".{name}.partial"));
            std::fs::write(&partial, contents)?;
            std::fs::rename(&partial, self.dir.join(name))?;
        }

        info!(model_id = %self.model_id, rows = self.rows, features = self.features, "stored model assets");
        Ok(())
    }
}

impl AssetProvider for FsAssetProvider {
    fn load_reference_assets(&self, model_id: &ModelId) -> Result<ModelAssets, AssetError> {
        let reference = self.load_reference(model_id)?;
        let model = self.load_model(model_id)?;
        check_model(model_id, &reference, &model)?;

        Ok(ModelAssets {
            reference: Arc::new(reference),
            predictor: Arc::new(model),
        })
    }
}

fn check_model(model_id: &ModelId, reference: &ReferenceTable, model: &LogisticModel) -> Result<(), AssetError> {
    if model.feature_names != reference.feature_names() {
        return Err(AssetError::InvalidModel {
            model_id: model_id.clone(),
            reason: format!(
                "the model expects features {:?} but the reference data has {:?}",
                model.feature_names,
                reference.feature_names()
            ),
        });
    }
    model.validate().map_err(|reason| AssetError::InvalidModel {
        model_id: model_id.clone(),
        reason,
    })
}

/// Parses a CSV with a header row and numeric columns, one of them `target`.
pub fn read_reference(csv: Vec<u8>) -> Result<ReferenceTable, String> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(Cursor::new(csv))
        .finish()
        .map_err(|e| e.to_string())?;

    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let name = column.name().to_string();
        let values = column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .map_err(|e| format!("column `{name}`: {e}"))?;
        let values = values
            .f64()
            .map_err(|e| format!("column `{name}`: {e}"))?
            .into_iter()
            .enumerate()
            .map(|(row, value)| value.ok_or_else(|| format!("column `{name}` has a missing or non-numeric value in row {row}")))
            .collect::<Result<Vec<f64>, String>>()?;
        columns.push((name, values));
    }

    ReferenceTable::from_columns(columns).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logistic::FitSettings;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    const CSV: &str = "mean radius,mean texture,target\n\
                       10.0,20.0,1\n\
                       11.0,21.0,1\n\
                       19.0,25.0,0\n\
                       21.0,27.0,0\n";

    fn model() -> LogisticModel {
        let reference = read_reference(CSV.as_bytes().to_vec()).unwrap();
        LogisticModel::fit(&reference, &FitSettings::default()).unwrap()
    }

    #[test]
    fn reads_reference_columns_in_order() {
        let reference = read_reference(CSV.as_bytes().to_vec()).unwrap();

        assert_eq!(reference.feature_names(), ["mean radius".to_string(), "mean texture".to_string()]);
        assert_eq!(reference.target().to_vec(), vec![1, 1, 0, 0]);
        assert_eq!(reference.column(0).to_vec(), vec![10.0, 11.0, 19.0, 21.0]);
    }

    #[test]
    fn rejects_csv_without_target_or_with_text() {
        let no_target = read_reference(b"a,b\n1,2\n".to_vec());
        assert!(no_target.unwrap_err().contains("target"));

        let text = read_reference(b"a,target\nlarge,1\nsmall,0\n".to_vec());
        assert!(text.is_err());
    }

    #[test]
    fn stores_and_loads_assets() {
        let dir = TempDir::new().unwrap();
        let provider = FsAssetProvider::new(dir.path());
        let id = ModelId::new("cancer_model_v1.0");

        provider.store_assets(&id, CSV.as_bytes(), &model()).unwrap();
        let assets = provider.load_reference_assets(&id).unwrap();

        assert_eq!(assets.reference.n_rows(), 4);
        assert!(format!("{assets:?}").contains("reference_rows: 4"));
        assert_eq!(
            assets.predictor.predict(assets.reference.features()).unwrap(),
            vec![1, 1, 0, 0]
        );
    }

    #[test]
    fn missing_assets_are_reported_as_such() {
        let dir = TempDir::new().unwrap();
        let provider = FsAssetProvider::new(dir.path());

        let err = provider.load_reference_assets(&ModelId::new("unknown")).unwrap_err();
        assert!(matches!(err, AssetError::AssetsNotFound(id) if id.as_str() == "unknown"));

        let err = provider.load_reference_assets(&ModelId::new("../escape")).unwrap_err();
        assert!(matches!(err, AssetError::AssetsNotFound(_)));
    }

    #[test]
    fn model_must_match_the_reference_schema() {
        let dir = TempDir::new().unwrap();
        let provider = FsAssetProvider::new(dir.path());
        let mut model = model();
        model.feature_names.reverse();

        let err = provider
            .store_assets(&ModelId::new("m"), CSV.as_bytes(), &model)
            .unwrap_err();
        assert!(matches!(err, AssetError::InvalidModel { .. }));
        assert!(!dir.path().join("m").exists());
    }

    #[test]
    fn staging_writes_nothing_until_asked() {
        let dir = TempDir::new().unwrap();
        let provider = FsAssetProvider::new(dir.path());
        let id = ModelId::new("cancer_model_v1.0");

        let staged = provider.stage_assets(&id, CSV.as_bytes(), &model()).unwrap();
        assert_eq!(staged.model_id(), &id);
        assert!(!dir.path().join("cancer_model_v1.0").exists());

        staged.write().unwrap();
        let stored: Vec<_> = std::fs::read_dir(dir.path().join("cancer_model_v1.0"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        assert_eq!(stored, vec![MODEL_FILE.to_string(), REFERENCE_FILE.to_string()]);
    }
}
