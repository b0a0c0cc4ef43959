pub mod settings;
pub mod storage;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli_args::{CliConfig, Command};

#[cfg(feature = "cli")]
mod cli_args {
    use super::settings::ExportSettings;
    use super::toml_config::TomlConfig;
    use crate::domain::model::{ExportFormat, NamingPolicy};
    use crate::utils::error::Result;
    use clap::{Parser, Subcommand};

    #[derive(Debug, Clone, Parser)]
    #[command(name = "bfm-viewer")]
    #[command(about = "Browse, filter and export parsed BFM itineraries")]
    pub struct CliConfig {
        /// Path to the parsed itinerary JSON file
        #[arg(short, long)]
        pub source: Option<String>,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        pub config: Option<String>,

        /// Directory for exported files
        #[arg(short, long)]
        pub output: Option<String>,

        /// Keep itineraries with a penalty entry for this passenger type (repeatable)
        #[arg(long = "passenger-type")]
        pub passenger_types: Vec<String>,

        /// Keep itineraries on this route, e.g. "JFK → LHR" (repeatable)
        #[arg(long = "route")]
        pub routes: Vec<String>,

        /// Keep itineraries departing on this date (repeatable)
        #[arg(long = "date")]
        pub departure_dates: Vec<String>,

        /// Fail instead of overwriting tables or sheets whose names collide
        #[arg(long)]
        pub strict: bool,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub log_json: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// List itineraries matching the filters
        List,
        /// Show the distinct passenger types, routes and departure dates
        Facets,
        /// Print every table of one itinerary
        Show {
            itinerary: String,
            /// Limit rows per table
            #[arg(long)]
            rows: Option<usize>,
        },
        /// Write export files for the selected itineraries
        Export {
            /// Itinerary id to export (repeatable); defaults to all filtered itineraries
            #[arg(long = "itinerary")]
            itineraries: Vec<String>,

            #[arg(long = "format", value_enum)]
            formats: Vec<ExportFormat>,
        },
    }

    impl CliConfig {
        pub fn load_file_config(&self) -> Result<TomlConfig> {
            match &self.config {
                Some(path) => TomlConfig::from_file(path),
                None => Ok(TomlConfig::default()),
            }
        }

        /// 合併設定：預設值 < TOML 檔案 < 命令列參數
        pub fn resolve(&self, file_config: &TomlConfig) -> ExportSettings {
            let mut settings = ExportSettings::from_toml(file_config);

            if let Some(source) = &self.source {
                settings.source_path = source.clone();
            }
            if let Some(output) = &self.output {
                settings.output_path = output.clone();
            }
            if self.strict {
                settings.naming = NamingPolicy::Strict;
            }
            if !self.passenger_types.is_empty() {
                settings.selection.passenger_types = self.passenger_types.iter().cloned().collect();
            }
            if !self.routes.is_empty() {
                settings.selection.routes = self.routes.iter().cloned().collect();
            }
            if !self.departure_dates.is_empty() {
                settings.selection.departure_dates =
                    self.departure_dates.iter().cloned().collect();
            }

            if let Command::Export {
                itineraries,
                formats,
            } = &self.command
            {
                settings.itinerary_ids = itineraries.clone();
                if !formats.is_empty() {
                    settings.formats = formats.clone();
                }
            }

            settings
        }
    }

}
