pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use app::pipelines::export_pipeline::ExportPipeline;
pub use config::{settings::ExportSettings, storage::LocalStorage, toml_config::TomlConfig};
pub use core::{
    etl::ExportEngine,
    export::{Artifact, ExportReport, Exporter},
    projector::{project, NamedTables, Table},
    store::{ItineraryStore, StoreCache},
};
pub use domain::model::{ExportFormat, Facets, FilterSelection, Itinerary, NamingPolicy};
pub use utils::error::{ExportError, LoadError, NotFoundError, Result, ViewerError};
