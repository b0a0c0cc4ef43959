use crate::config::toml_config::TomlConfig;
use crate::core::export::DEFAULT_PREVIEW_ROWS;
use crate::core::ConfigProvider;
use crate::domain::model::{ExportFormat, FilterSelection, NamingPolicy};
use crate::utils::error::{Result, ViewerError};
use crate::utils::validation::{self, Validate};

pub const DEFAULT_SOURCE_PATH: &str = "bfm_parsed_output.json";
pub const DEFAULT_OUTPUT_PATH: &str = "./exports";
const MAX_PREVIEW_ROWS: usize = 1000;

/// Effective settings after merging defaults, the TOML file and CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub source_path: String,
    pub output_path: String,
    pub formats: Vec<ExportFormat>,
    pub naming: NamingPolicy,
    pub preview_rows: usize,
    pub selection: FilterSelection,
    pub itinerary_ids: Vec<String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            source_path: DEFAULT_SOURCE_PATH.to_string(),
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
            formats: vec![ExportFormat::Xlsx, ExportFormat::Pdf],
            naming: NamingPolicy::Lenient,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            selection: FilterSelection::default(),
            itinerary_ids: Vec::new(),
        }
    }
}

impl ExportSettings {
    pub fn from_toml(config: &TomlConfig) -> Self {
        let defaults = Self::default();
        Self {
            source_path: config.source.path.clone().unwrap_or(defaults.source_path),
            output_path: config
                .export
                .output_path
                .clone()
                .unwrap_or(defaults.output_path),
            formats: config.export.formats.clone().unwrap_or(defaults.formats),
            naming: if config.strict_naming() {
                NamingPolicy::Strict
            } else {
                NamingPolicy::Lenient
            },
            preview_rows: config.export.preview_rows.unwrap_or(defaults.preview_rows),
            selection: FilterSelection {
                passenger_types: config.filters.passenger_types.iter().cloned().collect(),
                routes: config.filters.routes.iter().cloned().collect(),
                departure_dates: config.filters.departure_dates.iter().cloned().collect(),
            },
            itinerary_ids: Vec::new(),
        }
    }
}

impl Validate for ExportSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_path("source.path", &self.source_path)?;
        validation::validate_file_extensions(
            "source.path",
            std::slice::from_ref(&self.source_path),
            &["json"],
        )?;
        validation::validate_path("export.output_path", &self.output_path)?;
        validation::validate_range("export.preview_rows", self.preview_rows, 1, MAX_PREVIEW_ROWS)?;

        if self.formats.is_empty() {
            return Err(ViewerError::MissingConfigError {
                field: "export.formats".to_string(),
            });
        }
        for id in &self.itinerary_ids {
            validation::validate_non_empty_string("itinerary", id)?;
        }
        Ok(())
    }
}

impl ConfigProvider for ExportSettings {
    fn source_path(&self) -> &str {
        &self.source_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn export_formats(&self) -> &[ExportFormat] {
        &self.formats
    }

    fn naming_policy(&self) -> NamingPolicy {
        self.naming
    }

    fn preview_rows(&self) -> usize {
        self.preview_rows
    }

    fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    fn itinerary_ids(&self) -> &[String] {
        &self.itinerary_ids
    }
}
