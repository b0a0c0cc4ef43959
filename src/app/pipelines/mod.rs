pub mod export_pipeline;
