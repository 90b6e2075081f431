//! Session store — one entry per registered dataset.
//!
//! Datasets are created by the external ingestion step and handed in via
//! [`SessionStore::register`]. Removal drops the entry; the backing handle
//! is released when the last `Arc` clone goes away.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::info;

use crate::dataset::Dataset;
use crate::error::AppError;

/// Serializable dataset metadata, as exposed by the request surface.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub dataset_id: String,
    pub file_name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub created_at: String,
}

/// Map of dataset id → dataset, keyed by opaque identifiers.
#[derive(Default)]
pub struct SessionStore {
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-ingested dataset. Replaces any entry with the
    /// same id.
    pub fn register(&self, dataset: Dataset) -> Arc<Dataset> {
        let entry = Arc::new(dataset);
        let mut map = self.datasets.write().unwrap_or_else(|e| e.into_inner());
        info!(dataset_id = %entry.id, rows = entry.row_count, "dataset registered");
        map.insert(entry.id.clone(), entry.clone());
        entry
    }

    pub fn get(&self, dataset_id: &str) -> Result<Arc<Dataset>, AppError> {
        let map = self.datasets.read().unwrap_or_else(|e| e.into_inner());
        map.get(dataset_id)
            .cloned()
            .ok_or_else(|| AppError::DatasetNotFound(dataset_id.to_string()))
    }

    pub fn info(&self, dataset_id: &str) -> Result<DatasetInfo, AppError> {
        let ds = self.get(dataset_id)?;
        Ok(DatasetInfo {
            dataset_id: ds.id.clone(),
            file_name: ds.file_name.clone(),
            columns: ds.columns.clone(),
            row_count: ds.row_count,
            created_at: ds.created_at.clone(),
        })
    }

    /// Remove a dataset. The backing storage handle is released with the
    /// final `Arc` drop.
    pub fn remove(&self, dataset_id: &str) -> Result<(), AppError> {
        let mut map = self.datasets.write().unwrap_or_else(|e| e.into_inner());
        map.remove(dataset_id)
            .map(|_| info!(dataset_id = %dataset_id, "dataset removed"))
            .ok_or_else(|| AppError::DatasetNotFound(dataset_id.to_string()))
    }
}
