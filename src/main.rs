use bfm_viewer::core::projector::project_with;
use bfm_viewer::core::store::{ItineraryStore, StoreCache};
use bfm_viewer::utils::error::{ErrorSeverity, ViewerError};
use bfm_viewer::utils::{logger, validation::Validate};
use bfm_viewer::{CliConfig, Command, ExportEngine, ExportPipeline, ExportSettings, LocalStorage};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 設定檔需要在初始化日誌前讀取，錯誤延後回報
    let file_config = cli.load_file_config();
    let (verbose, json) = match &file_config {
        Ok(config) => (
            cli.verbose || config.verbose_logging(),
            cli.log_json || config.json_logging(),
        ),
        Err(_) => (cli.verbose, cli.log_json),
    };

    // 初始化日誌
    if json {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting bfm-viewer");

    let file_config = match file_config {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };
    let settings = cli.resolve(&file_config);
    if verbose {
        tracing::debug!("Resolved settings: {:?}", settings);
    }

    // 驗證配置
    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        exit_with(e);
    }

    let cache = Arc::new(StoreCache::new());

    match &cli.command {
        Command::List => {
            let store = load_or_exit(&cache, &settings);
            let selected = store.filter(&settings.selection);
            tracing::info!("{} of {} itineraries match", selected.len(), store.len());
            for itin in selected {
                println!(
                    "{}\t{}\t{}",
                    itin.label(),
                    itin.route().unwrap_or_default(),
                    itin.departure_date().unwrap_or_default()
                );
            }
        }
        Command::Facets => {
            let store = load_or_exit(&cache, &settings);
            let facets = store.facets();
            println!("{}", serde_json::to_string_pretty(&facets)?);
        }
        Command::Show { itinerary, rows } => {
            let store = load_or_exit(&cache, &settings);
            let itin = match store.lookup(itinerary) {
                Ok(itin) => itin,
                Err(e) => exit_with(e.into()),
            };
            let tables = match project_with(itin, settings.naming) {
                Ok(tables) => tables,
                Err(e) => exit_with(e.into()),
            };

            println!("🧭 Itinerary ID: {}", itin.itinerary_id);
            for (name, table) in tables.iter() {
                println!();
                println!("== {} ({} rows)", name, table.len());
                println!("{}", table.render_text(*rows));
            }
        }
        Command::Export { .. } => {
            let storage = LocalStorage::new(settings.output_path.clone());
            let pipeline = ExportPipeline::with_cache(storage, settings, cache);
            let engine = ExportEngine::new(pipeline);

            match engine.run().await {
                Ok(report) => {
                    for path in &report.written {
                        println!("📁 {}", path);
                    }
                    if !report.is_clean() {
                        for failure in &report.failed {
                            eprintln!("❌ {}", failure);
                        }
                        std::process::exit(2);
                    }
                    tracing::info!("✅ Export completed successfully!");
                }
                Err(e) => exit_with(e),
            }
        }
    }

    Ok(())
}

fn load_or_exit(cache: &StoreCache, settings: &ExportSettings) -> Arc<ItineraryStore> {
    match cache.load(&settings.source_path) {
        Ok(store) => store,
        Err(e) => exit_with(e.into()),
    }
}

fn exit_with(e: ViewerError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ bfm-viewer failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
