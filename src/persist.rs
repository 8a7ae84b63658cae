// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! On-disk model store
//!
//! A model directory holds the gzipped JSON vectorizer, one gzipped JSON file
//! per classifier and a plain `manifest.json` recording checksums and metrics.

use crate::features::TfidfVectorizer;
use crate::metrics::{CrossValidationScores, EvaluationMetrics};
use crate::models::{ModelKind, TrainedModel};
use crate::training::{ModelBundle, ScoredModel};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MODELS_DIR: &str = "models";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORIZER_FILE: &str = "vectorizer.json.gz";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No manifest found in {0}, train a model first")]
    MissingManifest(PathBuf),

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Manifest has no checksum for {0}")]
    UnlistedFile(String),

    #[error("Best model {0} is not in the manifest")]
    UnknownBest(ModelKind),
}

/// Per-model record in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: ModelKind,
    pub file: String,
    pub metrics: EvaluationMetrics,
    pub cv: CrossValidationScores,
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub best: ModelKind,
    pub vocabulary_size: usize,
    /// File name -> hex SHA-256 of its bytes
    pub checksums: BTreeMap<String, String>,
    pub models: Vec<ManifestEntry>,
}

/// Model directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODELS_DIR)
    }
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn exists(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Write the bundle, replacing any previous one, and return its manifest
    ///
    /// Every file is first written as `<name>.tmp` and renamed into place only
    /// once all of them are written, manifest last. A save that fails while
    /// writing leaves the previous bundle loadable.
    pub fn save(&self, bundle: &ModelBundle) -> Result<Manifest, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut staged = vec![VECTORIZER_FILE.to_string()];
        let mut checksums = BTreeMap::new();
        checksums.insert(VECTORIZER_FILE.to_string(), self.write_gz(VECTORIZER_FILE, &bundle.vectorizer)?);

        let mut models = Vec::with_capacity(bundle.models.len());
        for scored in &bundle.models {
            let file = format!("{}.json.gz", scored.kind().slug());
            checksums.insert(file.clone(), self.write_gz(&file, &scored.model)?);
            staged.push(file.clone());
            models.push(ManifestEntry {
                kind: scored.kind(),
                file,
                metrics: scored.metrics.clone(),
                cv: scored.cv.clone(),
            });
        }

        let manifest = Manifest {
            version: bundle.version.clone(),
            trained_at: bundle.trained_at,
            best: bundle.best_model().kind(),
            vocabulary_size: bundle.vectorizer.vocabulary_size(),
            checksums,
            models,
        };

        let path = self.manifest_path();
        let json = serde_json::to_string_pretty(&manifest).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let staged_manifest = staging_path(&path);
        std::fs::write(&staged_manifest, json).map_err(|source| StoreError::Io {
            path: staged_manifest.clone(),
            source,
        })?;

        for file in &staged {
            self.commit(&self.dir.join(file))?;
        }
        self.commit(&path)?;

        tracing::info!("Model bundle saved to {}", self.dir.display());
        Ok(manifest)
    }

    pub fn read_manifest(&self) -> Result<Manifest, StoreError> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Err(StoreError::MissingManifest(self.dir.clone()));
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::Io { path: path.clone(), source })?;
        serde_json::from_str(&raw).map_err(|source| StoreError::Json { path, source })
    }

    /// Load and checksum-verify the bundle described by the manifest
    pub fn load(&self) -> Result<ModelBundle, StoreError> {
        let manifest = self.read_manifest()?;

        let vectorizer: TfidfVectorizer = self.read_gz(VECTORIZER_FILE, &manifest)?;
        let mut models = Vec::with_capacity(manifest.models.len());
        for entry in &manifest.models {
            let model: TrainedModel = self.read_gz(&entry.file, &manifest)?;
            models.push(ScoredModel {
                model,
                metrics: entry.metrics.clone(),
                cv: entry.cv.clone(),
            });
        }

        let best = models
            .iter()
            .position(|m| m.kind() == manifest.best)
            .ok_or(StoreError::UnknownBest(manifest.best))?;

        if manifest.version != env!("CARGO_PKG_VERSION") {
            tracing::warn!(
                "Models were saved by version {}, running {}",
                manifest.version,
                env!("CARGO_PKG_VERSION")
            );
        }
        tracing::info!("Loaded {} models from {} (best: {})", models.len(), self.dir.display(), manifest.best);

        Ok(ModelBundle {
            vectorizer,
            models,
            best,
            trained_at: manifest.trained_at,
            version: manifest.version,
        })
    }

    /// Rename `<path>.tmp` onto `path`
    fn commit(&self, path: &Path) -> Result<(), StoreError> {
        std::fs::rename(staging_path(path), path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_gz<T: Serialize>(&self, file: &str, value: &T) -> Result<String, StoreError> {
        let path = staging_path(&self.dir.join(file));
        let io_err = |source| StoreError::Io { path: path.clone(), source };

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        serde_json::to_writer(&mut encoder, value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        encoder.flush().map_err(io_err)?;
        let bytes = encoder.finish().map_err(io_err)?;

        std::fs::write(&path, &bytes).map_err(io_err)?;
        tracing::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(sha256_hex(&bytes))
    }

    fn read_gz<T: DeserializeOwned>(&self, file: &str, manifest: &Manifest) -> Result<T, StoreError> {
        let path = self.dir.join(file);
        let expected = manifest
            .checksums
            .get(file)
            .ok_or_else(|| StoreError::UnlistedFile(file.to_string()))?;

        let bytes = std::fs::read(&path).map_err(|source| StoreError::Io { path: path.clone(), source })?;
        let actual = sha256_hex(&bytes);
        if &actual != expected {
            return Err(StoreError::ChecksumMismatch {
                file: file.to_string(),
                expected: expected.clone(),
                actual,
            });
        }

        serde_json::from_reader(GzDecoder::new(bytes.as_slice())).map_err(|source| StoreError::Json { path, source })
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Dataset;
    use crate::features::VectorizerParams;
    use crate::models::Classifier;
    use crate::training::{Trainer, TrainingConfig};

    fn small_bundle() -> ModelBundle {
        let config = TrainingConfig {
            cv_folds: 0,
            show_progress: false,
            models: vec![ModelKind::NaiveBayes, ModelKind::GradientBoosting],
            vectorizer: VectorizerParams {
                min_df: 1,
                ..VectorizerParams::default()
            },
            ..TrainingConfig::default()
        };
        Trainer::new(config).train(&Dataset::synthetic(60, 5)).unwrap().bundle
    }

    #[test]
    fn test_save_load_gives_identical_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let bundle = small_bundle();

        let manifest = store.save(&bundle).unwrap();
        assert_eq!(manifest.checksums.len(), 3);
        assert!(dir.path().join("naive-bayes.json.gz").is_file());
        assert!(dir.path().join(VECTORIZER_FILE).is_file());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.best, bundle.best);
        assert_eq!(loaded.models.len(), 2);

        let text = "shocking secret elite hiding leaked video";
        let before = bundle.vectorizer.transform(text);
        let after = loaded.vectorizer.transform(text);
        assert_eq!(before, after);
        for (a, b) in bundle.models.iter().zip(&loaded.models) {
            assert_eq!(a.model.predict_proba(&before), b.model.predict_proba(&after));
            assert_eq!(a.metrics.f1_score, b.metrics.f1_score);
        }
    }

    #[test]
    fn test_tampered_file_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(&small_bundle()).unwrap();

        std::fs::write(dir.path().join("gradient-boosting.json.gz"), b"not a model").unwrap();
        match store.load() {
            Err(StoreError::ChecksumMismatch { file, .. }) => assert_eq!(file, "gradient-boosting.json.gz"),
            other => panic!("expected checksum mismatch, got {:?}", other.map(|b| b.models.len())),
        }
    }

    #[test]
    fn test_failed_save_keeps_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let bundle = small_bundle();
        store.save(&bundle).unwrap();

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        // A directory squatting on a staging path makes the next save fail mid-way.
        std::fs::create_dir(dir.path().join("gradient-boosting.json.gz.tmp")).unwrap();
        assert!(matches!(store.save(&bundle), Err(StoreError::Io { .. })));

        let loaded = store.load().unwrap();
        assert_eq!(loaded.models.len(), 2);
        assert_eq!(loaded.best, bundle.best);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("nothing-here"));
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(StoreError::MissingManifest(_))));
    }
}
