use super::xlsx::clean_table_name;
use crate::core::projector::{NamedTables, Table};
use crate::utils::error::ExportError;
use std::io::{Cursor, Write};
use zip::write::{FileOptions, ZipWriter};

/// One CSV document for a table: header row, then one line per record.
/// A table without columns yields an empty document.
pub fn table_to_csv(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if !table.columns().is_empty() {
        writer.write_record(table.columns())?;
        for row in 0..table.len() {
            writer.write_record(table.row_cells(row))?;
        }
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// Archive entry for a table. Separators are replaced, so the entry always
/// extracts into the archive's own folder.
pub fn entry_name(table_name: &str) -> String {
    let cleaned = clean_table_name(table_name);
    if cleaned.is_empty() {
        "Table.csv".to_string()
    } else {
        format!("{}.csv", cleaned)
    }
}

/// Zip archive with one `{TableName}.csv` entry per table.
pub fn write_bundle(tables: &NamedTables) -> Result<Vec<u8>, ExportError> {
    // 清理後同名的表格：後者覆蓋前者，位置不變
    let mut entries: Vec<(String, &Table)> = Vec::new();
    for (name, table) in tables.iter() {
        let entry = entry_name(name);
        match entries.iter_mut().find(|(existing, _)| *existing == entry) {
            Some(slot) => {
                tracing::warn!("⚠️ CSV entry '{}' replaced by table {}", entry, name);
                slot.1 = table;
            }
            None => entries.push((entry, table)),
        }
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (entry, table) in entries {
        let csv_data = table_to_csv(table)?;
        zip.start_file::<_, ()>(entry, FileOptions::default())?;
        zip.write_all(&csv_data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Record;
    use serde_json::json;
    use std::io::Read;

    #[test]
    fn test_table_to_csv_fills_missing_cells() {
        let table = Table::from_records(vec![
            Record::from(json!({"code": "US", "amount": 25}).as_object().cloned().unwrap()),
            Record::from(json!({"code": "XF, fee", "note": "quoted"}).as_object().cloned().unwrap()),
        ]);
        let csv_text = String::from_utf8(table_to_csv(&table).unwrap()).unwrap();
        assert_eq!(csv_text, "code,amount,note\nUS,25,\n\"XF, fee\",,quoted\n");

        assert!(table_to_csv(&Table::default()).unwrap().is_empty());
    }

    #[test]
    fn test_bundle_contains_one_file_per_table() {
        let mut tables = NamedTables::new();
        tables.insert(
            "Taxes",
            Table::from_records(vec![Record::from(
                json!({"code": "US"}).as_object().cloned().unwrap(),
            )]),
        );
        tables.insert("FareInfo", Table::default());

        let bytes = write_bundle(&tables).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("Taxes.csv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "code\nUS\n");
        assert_eq!(archive.by_name("FareInfo.csv").unwrap().size(), 0);
    }

    #[test]
    fn test_entry_names_stay_inside_archive_folder() {
        assert_eq!(
            entry_name("Penalties_/../../evil_Outbound"),
            "Penalties__.._.._evil_Outbound.csv"
        );
        assert_eq!(entry_name("a\\b"), "a_b.csv");
        assert_eq!(entry_name(""), "Table.csv");

        let mut tables = NamedTables::new();
        tables.insert("Penalties_/../../evil_Outbound", Table::default());
        tables.insert("Penalties_:../../evil_Outbound", Table::default());
        tables.insert("Taxes", Table::default());

        let bytes = write_bundle(&tables).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 2);
        for name in names {
            assert!(!name.contains('/') && !name.contains('\\'), "{}", name);
        }
    }
}
