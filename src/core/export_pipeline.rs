pub use crate::app::pipelines::export_pipeline::ExportPipeline;
