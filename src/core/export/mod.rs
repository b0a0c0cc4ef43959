pub mod csv_bundle;
pub mod pdf;
pub mod xlsx;

use crate::core::projector::{project_with, NamedTables, Table};
use crate::domain::model::{Direction, ExportFormat, Itinerary, NamingPolicy};
use crate::utils::error::ExportError;
use pdf::{TextDocument, TextStyle};
use xlsx::WorkbookWriter;

pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// A finished export, ready to be written or offered for download.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub itinerary_id: String,
    pub format: ExportFormat,
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct ExportFailure {
    pub itinerary_id: String,
    pub format: ExportFormat,
    pub error: ExportError,
}

/// 轉換階段的結果：成功的檔案與失敗的匯出分開保存，單一失敗不影響其他匯出
#[derive(Debug, Default)]
pub struct ExportBatch {
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<ExportFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub written: Vec<String>,
    pub failed: Vec<String>,
}

impl ExportReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Multi-sheet workbook with one sheet per table, overwriting on name collisions.
pub fn export_spreadsheet(tables: &NamedTables) -> Result<Vec<u8>, ExportError> {
    WorkbookWriter::new(NamingPolicy::Lenient).to_bytes(tables)
}

/// Paginated preview document with the default row limit.
pub fn export_document(itin: &Itinerary) -> Result<Vec<u8>, ExportError> {
    document_for(itin, DEFAULT_PREVIEW_ROWS).to_bytes()
}

pub fn export_csv_bundle(tables: &NamedTables) -> Result<Vec<u8>, ExportError> {
    csv_bundle::write_bundle(tables)
}

fn document_for(itin: &Itinerary, preview_rows: usize) -> TextDocument {
    let mut doc = TextDocument::new(itin.label());
    doc.push(TextStyle::Title, &format!("Itinerary ID: {}", itin.itinerary_id));
    doc.blank_line();

    for (label, records) in [
        ("Segments", &itin.segments),
        ("Baggage", &itin.baggage),
        ("Segment Details", &itin.segment_details),
    ] {
        for direction in Direction::ALL {
            doc.push(TextStyle::Heading, &format!("{} - {}", label, direction));
            let table = Table::from_records(records.get(direction).to_vec());
            doc.push(TextStyle::Body, &table.render_text(Some(preview_rows)));
            doc.blank_line();
        }
    }
    doc
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub naming: NamingPolicy,
    pub preview_rows: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            naming: NamingPolicy::Lenient,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

/// Produces artifacts for single itineraries under one set of options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    pub fn export(&self, itin: &Itinerary, format: ExportFormat) -> Result<Artifact, ExportError> {
        let bytes = match format {
            ExportFormat::Xlsx => {
                let tables = project_with(itin, self.options.naming)?;
                WorkbookWriter::new(self.options.naming).to_bytes(&tables)?
            }
            ExportFormat::Pdf => document_for(itin, self.options.preview_rows).to_bytes()?,
            ExportFormat::Csv => {
                let tables = project_with(itin, self.options.naming)?;
                csv_bundle::write_bundle(&tables)?
            }
        };

        tracing::debug!(
            "Rendered {} for itinerary {} ({} bytes)",
            format,
            itin.itinerary_id,
            bytes.len()
        );

        Ok(Artifact {
            itinerary_id: itin.itinerary_id.clone(),
            format,
            file_name: format.file_name(&itin.itinerary_id),
            mime_type: format.mime_type(),
            bytes,
        })
    }

    /// Export every itinerary in every format, collecting failures instead of
    /// stopping at the first one.
    pub fn export_all(&self, itineraries: &[Itinerary], formats: &[ExportFormat]) -> ExportBatch {
        let mut batch = ExportBatch::default();
        for itin in itineraries {
            for format in formats {
                match self.export(itin, *format) {
                    Ok(artifact) => batch.artifacts.push(artifact),
                    Err(error) => {
                        tracing::error!(
                            "❌ Export of itinerary {} as {} failed: {}",
                            itin.itinerary_id,
                            format,
                            error
                        );
                        batch.failures.push(ExportFailure {
                            itinerary_id: itin.itinerary_id.clone(),
                            format: *format,
                            error,
                        });
                    }
                }
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn itinerary(value: serde_json::Value) -> Itinerary {
        Itinerary::from_value(&value).unwrap()
    }

    #[test]
    fn test_document_preview_limits_rows() {
        let segments: Vec<_> = (0..15)
            .map(|i| json!({"flight": format!("FL-{:03}", i)}))
            .collect();
        let itin = itinerary(json!({"itineraryId": 42, "segments": {"Outbound": segments}}));

        let text = String::from_utf8_lossy(&export_document(&itin).unwrap()).into_owned();
        assert!(text.contains("(Itinerary ID: 42) Tj"));
        assert!(text.contains("(Segments - Outbound) Tj"));
        assert!(text.contains("(Segment Details - Inbound) Tj"));
        assert!(text.contains("FL-009"));
        assert!(!text.contains("FL-010"));
        assert!(text.contains("(... 5 more rows) Tj"));
    }

    #[test]
    fn test_exporter_names_artifacts() {
        let itin = itinerary(json!({"itineraryId": "A7"}));
        let exporter = Exporter::default();

        let xlsx = exporter.export(&itin, ExportFormat::Xlsx).unwrap();
        assert_eq!(xlsx.file_name, "itinerary_A7_details.xlsx");
        assert_eq!(
            xlsx.mime_type,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert!(xlsx.bytes.starts_with(b"PK"));

        let pdf = exporter.export(&itin, ExportFormat::Pdf).unwrap();
        assert_eq!(pdf.file_name, "itinerary_A7.pdf");
        assert!(pdf.bytes.starts_with(b"%PDF"));

        let csv = exporter.export(&itin, ExportFormat::Csv).unwrap();
        assert_eq!(csv.file_name, "itinerary_A7_tables.zip");
    }

    #[test]
    fn test_strict_failure_does_not_block_other_exports() {
        let clean = itinerary(json!({"itineraryId": 1, "penalties": [{"passengerType": "ADT"}]}));
        let clashing = itinerary(json!({
            "itineraryId": 2,
            "penalties": [{"passengerType": "ADT"}, {"passengerType": "ADT"}]
        }));

        let exporter = Exporter::new(ExportOptions {
            naming: NamingPolicy::Strict,
            ..ExportOptions::default()
        });
        let batch = exporter.export_all(
            &[clean, clashing],
            &[ExportFormat::Xlsx, ExportFormat::Pdf],
        );

        // PDF 不含罰則表，因此嚴格模式下仍可輸出
        assert_eq!(batch.artifacts.len(), 3);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].itinerary_id, "2");
        assert_eq!(batch.failures[0].format, ExportFormat::Xlsx);
    }
}
