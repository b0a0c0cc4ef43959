use crate::core::export::ExportReport;
use crate::core::Pipeline;
use crate::utils::error::Result;

pub struct ExportEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ExportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<ExportReport> {
        tracing::info!("Starting export...");

        // Extract
        let itineraries = self.pipeline.extract().await?;
        tracing::info!("Selected {} itineraries", itineraries.len());

        // Transform
        let batch = self.pipeline.transform(itineraries).await?;
        tracing::info!(
            "Rendered {} artifacts ({} failed)",
            batch.artifacts.len(),
            batch.failures.len()
        );

        // Load
        let report = self.pipeline.load(batch).await?;
        tracing::info!("Wrote {} files", report.written.len());

        Ok(report)
    }
}
