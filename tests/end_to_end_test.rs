use anyhow::Result;
use bfm_viewer::core::export::export_spreadsheet;
use bfm_viewer::{
    project, ExportEngine, ExportPipeline, ExportSettings, FilterSelection, ItineraryStore,
    LocalStorage, StoreCache,
};
use regex::Regex;
use std::io::{Cursor, Read};
use tempfile::TempDir;

const SAMPLE: &str = r#"[
  {
    "itineraryId": 42,
    "segments": {"Outbound": [{"origin": "JFK", "destination": "LHR", "departureDate": "2024-06-01"}]},
    "baggage": {},
    "segmentDetails": {},
    "fareInfo": [{"type": "ADT", "amount": 450}],
    "taxes": [{"code": "US", "amount": 25}],
    "penalties": [{"passengerType": "ADT", "penaltiesByDirection": {"Outbound": [{"type": "change", "fee": 100}]}}]
  }
]"#;

struct Workbook {
    sheets: Vec<(String, String)>,
}

impl Workbook {
    fn open(bytes: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let workbook = read_entry(&mut archive, "xl/workbook.xml")?;
        let name_re = Regex::new(r#"<sheet name="([^"]*)""#)?;

        let mut sheets = Vec::new();
        for (index, caps) in name_re.captures_iter(&workbook).enumerate() {
            let xml = read_entry(&mut archive, &format!("xl/worksheets/sheet{}.xml", index + 1))?;
            sheets.push((caps[1].to_string(), xml));
        }
        Ok(Self { sheets })
    }

    fn names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn sheet(&self, name: &str) -> &str {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, xml)| xml.as_str())
            .unwrap_or_else(|| panic!("sheet {} missing", name))
    }

    /// Data rows, excluding the header.
    fn row_count(&self, name: &str) -> usize {
        self.sheet(name).matches("<row ").count().saturating_sub(1)
    }

    fn header(&self, name: &str) -> Vec<String> {
        let xml = self.sheet(name);
        let Some(start) = xml.find(r#"<row r="1">"#) else {
            return Vec::new();
        };
        let end = start + xml[start..].find("</row>").unwrap();
        let text_re = Regex::new(r"<t(?: [^>]*)?>([^<]*)</t>").unwrap();
        text_re
            .captures_iter(&xml[start..end])
            .map(|c| c[1].to_string())
            .collect()
    }
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<String> {
    let mut content = String::new();
    archive.by_name(name)?.read_to_string(&mut content)?;
    Ok(content)
}

#[test]
fn test_sample_itinerary_projection_and_facets() -> Result<()> {
    let store = ItineraryStore::from_json_str(SAMPLE)?;
    let itin = store.lookup("42")?;
    assert_eq!(itin.label(), "Itinerary 42");

    let tables = project(itin);
    assert_eq!(tables.get("Segments_Outbound").unwrap().len(), 1);
    assert!(tables.get("Segments_Inbound").unwrap().is_empty());
    assert_eq!(tables.get("Penalties_ADT_Outbound").unwrap().len(), 1);
    assert!(tables.get("Penalties_ADT_Inbound").unwrap().is_empty());
    assert_eq!(tables.get("FareInfo").unwrap().columns(), &["type", "amount"]);

    let facets = store.facets();
    assert_eq!(facets.routes.iter().collect::<Vec<_>>(), vec!["JFK → LHR"]);
    assert_eq!(
        facets.departure_dates.iter().collect::<Vec<_>>(),
        vec!["2024-06-01"]
    );
    assert_eq!(facets.passenger_types.iter().collect::<Vec<_>>(), vec!["ADT"]);
    Ok(())
}

#[test]
fn test_route_filter_on_sample() -> Result<()> {
    let store = ItineraryStore::from_json_str(SAMPLE)?;

    let mut selection = FilterSelection::default();
    selection.routes.insert("JFK → LHR".to_string());
    assert_eq!(store.filter(&selection).len(), 1);

    let mut selection = FilterSelection::default();
    selection.routes.insert("LHR → JFK".to_string());
    assert!(store.filter(&selection).is_empty());
    Ok(())
}

#[test]
fn test_spreadsheet_round_trip_preserves_rows_and_columns() -> Result<()> {
    let store = ItineraryStore::from_json_str(
        r#"[{
            "itineraryId": 7,
            "taxes": [
                {"code": "US", "amount": 25},
                {"currency": "USD", "exempt": true},
                {"code": "XF", "note": "a < b & c"}
            ]
        }]"#,
    )?;
    let tables = project(store.lookup("7")?);
    let workbook = Workbook::open(&export_spreadsheet(&tables)?)?;

    assert_eq!(workbook.names().len(), tables.len());
    for (name, table) in tables.iter() {
        assert_eq!(workbook.row_count(name), table.len(), "rows of {}", name);
        assert_eq!(workbook.header(name), table.columns(), "columns of {}", name);
    }
    assert_eq!(
        workbook.header("Taxes"),
        vec!["code", "amount", "currency", "exempt", "note"]
    );
    assert!(workbook.sheet("Taxes").contains("a &lt; b &amp; c"));
    Ok(())
}

#[test]
fn test_duplicate_passenger_type_exports_second_entry() -> Result<()> {
    let store = ItineraryStore::from_json_str(
        r#"[{
            "itineraryId": 8,
            "penalties": [
                {"passengerType": "ADT", "penaltiesByDirection": {"Outbound": [{"type": "change", "fee": 100}]}},
                {"passengerType": "ADT", "penaltiesByDirection": {"Outbound": [{"type": "cancel", "fee": 250}, {"type": "noshow", "fee": 400}]}}
            ]
        }]"#,
    )?;
    let tables = project(store.lookup("8")?);
    let workbook = Workbook::open(&export_spreadsheet(&tables)?)?;

    let adt_sheets = workbook
        .names()
        .into_iter()
        .filter(|n| *n == "Penalties_ADT_Outbound")
        .count();
    assert_eq!(adt_sheets, 1);
    assert_eq!(workbook.row_count("Penalties_ADT_Outbound"), 2);
    let sheet = workbook.sheet("Penalties_ADT_Outbound");
    assert!(sheet.contains("cancel"));
    assert!(!sheet.contains("change"));
    Ok(())
}

#[tokio::test]
async fn test_export_command_writes_files_to_disk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("bfm_parsed_output.json");
    tokio::fs::write(&source, SAMPLE).await?;
    let output_path = temp_dir.path().join("out").to_str().unwrap().to_string();

    let settings = ExportSettings {
        source_path: source.to_str().unwrap().to_string(),
        output_path: output_path.clone(),
        ..ExportSettings::default()
    };
    let storage = LocalStorage::new(output_path.clone());
    let engine = ExportEngine::new(ExportPipeline::new(storage, settings));

    let report = engine.run().await?;
    assert!(report.is_clean());
    assert_eq!(report.written.len(), 2);

    let xlsx = std::fs::read(temp_dir.path().join("out/itinerary_42_details.xlsx"))?;
    let workbook = Workbook::open(&xlsx)?;
    assert_eq!(workbook.names()[0], "Segments_Outbound");
    assert_eq!(workbook.row_count("Segments_Outbound"), 1);

    let pdf = std::fs::read(temp_dir.path().join("out/itinerary_42.pdf"))?;
    assert!(pdf.starts_with(b"%PDF-1.4"));
    assert!(String::from_utf8_lossy(&pdf).contains("(Itinerary ID: 42) Tj"));
    Ok(())
}

#[test]
fn test_cache_reloads_after_source_changes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("itins.json");
    std::fs::write(&source, r#"[{"itineraryId": 1}]"#)?;

    let cache = StoreCache::new();
    assert_eq!(cache.load(&source)?.len(), 1);

    std::fs::write(&source, r#"[{"itineraryId": 1}, {"itineraryId": 2}]"#)?;
    let file = std::fs::File::options().write(true).open(&source)?;
    file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(60))?;

    assert_eq!(cache.load(&source)?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_hostile_itinerary_id_stays_in_output_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("itins.json");
    tokio::fs::write(&source, r#"[{"itineraryId": "/../../../escaped"}]"#).await?;
    let output = temp_dir.path().join("a/b/out");
    let output_path = output.to_str().unwrap().to_string();

    let settings = ExportSettings {
        source_path: source.to_str().unwrap().to_string(),
        output_path: output_path.clone(),
        ..ExportSettings::default()
    };
    let engine = ExportEngine::new(ExportPipeline::new(
        LocalStorage::new(output_path),
        settings,
    ));

    let report = engine.run().await?;
    assert!(report.is_clean());
    assert_eq!(report.written.len(), 2);
    assert!(!temp_dir.path().join("a/escaped.pdf").exists());
    assert!(!temp_dir.path().join("escaped.pdf").exists());

    let written: Vec<_> = std::fs::read_dir(&output)?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<_>>()?;
    assert_eq!(written.len(), 2);
    Ok(())
}
