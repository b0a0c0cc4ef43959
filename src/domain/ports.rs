use crate::core::export::{ExportBatch, ExportReport};
use crate::domain::model::{ExportFormat, FilterSelection, Itinerary, NamingPolicy};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn source_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn export_formats(&self) -> &[ExportFormat];
    fn naming_policy(&self) -> NamingPolicy;
    fn preview_rows(&self) -> usize;
    fn selection(&self) -> &FilterSelection;
    /// Explicitly requested itineraries; when empty the filter selection applies.
    fn itinerary_ids(&self) -> &[String];
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Itinerary>>;
    async fn transform(&self, itineraries: Vec<Itinerary>) -> Result<ExportBatch>;
    async fn load(&self, batch: ExportBatch) -> Result<ExportReport>;
}
