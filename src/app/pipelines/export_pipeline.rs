use crate::core::export::{ExportBatch, ExportOptions, ExportReport, Exporter};
use crate::core::store::StoreCache;
use crate::core::{ConfigProvider, Itinerary, Pipeline, Storage};
use crate::utils::error::Result;
use std::sync::Arc;

pub struct ExportPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) cache: Arc<StoreCache>,
}

impl<S: Storage, C: ConfigProvider> ExportPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self::with_cache(storage, config, Arc::new(StoreCache::new()))
    }

    /// Share a cache with other consumers of the same source file.
    pub fn with_cache(storage: S, config: C, cache: Arc<StoreCache>) -> Self {
        Self {
            storage,
            config,
            cache,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ExportPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Itinerary>> {
        tracing::debug!("Loading itineraries from: {}", self.config.source_path());
        let store = self.cache.load(self.config.source_path())?;

        // 指定了行程編號時忽略篩選條件
        let ids = self.config.itinerary_ids();
        if !ids.is_empty() {
            let mut selected = Vec::with_capacity(ids.len());
            for id in ids {
                selected.push(store.lookup(id)?.clone());
            }
            return Ok(selected);
        }

        let selection = self.config.selection();
        if !selection.is_empty() {
            tracing::debug!("Applying filters: {:?}", selection);
        }
        let selected: Vec<Itinerary> = store.filter(selection).into_iter().cloned().collect();

        if selected.is_empty() {
            tracing::warn!("No itineraries match the current selection");
        }
        Ok(selected)
    }

    async fn transform(&self, itineraries: Vec<Itinerary>) -> Result<ExportBatch> {
        let exporter = Exporter::new(ExportOptions {
            naming: self.config.naming_policy(),
            preview_rows: self.config.preview_rows(),
        });
        Ok(exporter.export_all(&itineraries, self.config.export_formats()))
    }

    async fn load(&self, batch: ExportBatch) -> Result<ExportReport> {
        let mut report = ExportReport::default();

        for failure in &batch.failures {
            report.failed.push(format!(
                "itinerary {} ({}): {}",
                failure.itinerary_id, failure.format, failure.error
            ));
        }

        for artifact in &batch.artifacts {
            tracing::debug!(
                "Writing {} ({} bytes, {})",
                artifact.file_name,
                artifact.bytes.len(),
                artifact.mime_type
            );
            match self
                .storage
                .write_file(&artifact.file_name, &artifact.bytes)
                .await
            {
                Ok(()) => report
                    .written
                    .push(format!("{}/{}", self.config.output_path(), artifact.file_name)),
                Err(e) => {
                    tracing::error!("❌ Failed to write {}: {}", artifact.file_name, e);
                    report.failed.push(format!("{}: {}", artifact.file_name, e));
                }
            }
        }

        Ok(report)
    }
}
