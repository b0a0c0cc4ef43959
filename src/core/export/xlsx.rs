use crate::core::projector::{NamedTables, Table};
use crate::domain::model::NamingPolicy;
use crate::utils::error::ExportError;
use serde_json::Value;
use std::io::{Cursor, Seek, Write};
use zip::write::{FileOptions, ZipWriter};

/// Excel's sheet-name length limit.
pub const SHEET_NAME_MAX_LEN: usize = 31;

const INVALID_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Replace characters Excel rejects (path separators among them) and NUL with `_`.
pub fn clean_table_name(table_name: &str) -> String {
    table_name
        .chars()
        .map(|c| {
            if INVALID_SHEET_CHARS.contains(&c) || c == '\0' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Replace characters Excel rejects, then cut to the length limit.
pub fn sheet_name(table_name: &str) -> String {
    let cut: String = clean_table_name(table_name)
        .chars()
        .take(SHEET_NAME_MAX_LEN)
        .collect();
    if cut.is_empty() {
        "Sheet".to_string()
    } else {
        cut
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Escape text for XML content and attributes, dropping characters XML 1.0
/// cannot carry.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

struct Sheet<'a> {
    name: String,
    source: &'a str,
    table: &'a Table,
}

/// Writes [`NamedTables`] as a multi-sheet OOXML workbook.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookWriter {
    naming: NamingPolicy,
}

impl WorkbookWriter {
    pub fn new(naming: NamingPolicy) -> Self {
        Self { naming }
    }

    pub fn to_bytes(&self, tables: &NamedTables) -> Result<Vec<u8>, ExportError> {
        let cursor = self.write_to(Cursor::new(Vec::new()), tables)?;
        Ok(cursor.into_inner())
    }

    pub fn write_to<W: Write + Seek>(
        &self,
        writer: W,
        tables: &NamedTables,
    ) -> Result<W, ExportError> {
        let sheets = self.plan_sheets(tables)?;

        let mut zip = ZipWriter::new(writer);

        zip.start_file::<_, ()>("[Content_Types].xml", FileOptions::default())?;
        zip.write_all(content_types_xml(sheets.len()).as_bytes())?;

        zip.start_file::<_, ()>("_rels/.rels", FileOptions::default())?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file::<_, ()>("docProps/core.xml", FileOptions::default())?;
        zip.write_all(core_properties_xml().as_bytes())?;

        zip.start_file::<_, ()>("xl/workbook.xml", FileOptions::default())?;
        zip.write_all(workbook_xml(&sheets).as_bytes())?;

        zip.start_file::<_, ()>("xl/_rels/workbook.xml.rels", FileOptions::default())?;
        zip.write_all(workbook_rels_xml(sheets.len()).as_bytes())?;

        for (index, sheet) in sheets.iter().enumerate() {
            let path = format!("xl/worksheets/sheet{}.xml", index + 1);
            zip.start_file::<_, ()>(path, FileOptions::default())?;
            zip.write_all(worksheet_xml(sheet.table).as_bytes())?;
        }

        tracing::debug!("Workbook assembled with {} sheets", sheets.len());
        Ok(zip.finish()?)
    }

    /// 工作表名稱截斷後可能重複；寬鬆模式下後者覆蓋前者
    fn plan_sheets<'a>(&self, tables: &'a NamedTables) -> Result<Vec<Sheet<'a>>, ExportError> {
        let mut sheets: Vec<Sheet<'a>> = Vec::new();
        for (source, table) in tables.iter() {
            let name = sheet_name(source);
            // Excel compares sheet names case-insensitively
            let existing = sheets
                .iter_mut()
                .find(|s| s.name.to_lowercase() == name.to_lowercase());
            match existing {
                Some(slot) => {
                    if self.naming == NamingPolicy::Strict {
                        return Err(ExportError::SheetNameCollision {
                            sheet: name,
                            first: slot.source.to_string(),
                            second: source.to_string(),
                        });
                    }
                    tracing::warn!(
                        "⚠️ Sheet '{}' from table {} replaced by table {}",
                        name,
                        slot.source,
                        source
                    );
                    slot.source = source;
                    slot.table = table;
                }
                None => sheets.push(Sheet {
                    name,
                    source,
                    table,
                }),
            }
        }

        if sheets.is_empty() {
            static EMPTY: Table = Table::empty();
            sheets.push(Sheet {
                name: "Sheet1".to_string(),
                source: "",
                table: &EMPTY,
            });
        }
        Ok(sheets)
    }
}

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"</Relationships>"#
);

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = String::from(XML_HEADER);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            n
        ));
    }
    xml.push_str(r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#);
    xml.push_str("</Types>");
    xml
}

fn core_properties_xml() -> String {
    let created = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    format!(
        concat!(
            r#"{}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:creator>bfm-viewer</dc:creator>"#,
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#,
            r#"</cp:coreProperties>"#
        ),
        XML_HEADER, created
    )
}

fn workbook_xml(sheets: &[Sheet<'_>]) -> String {
    let mut xml = String::from(XML_HEADER);
    xml.push_str(concat!(
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#
    ));
    for (index, sheet) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(&sheet.name),
            index + 1,
            index + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = String::from(XML_HEADER);
    xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for n in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            n, n
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn worksheet_xml(table: &Table) -> String {
    let mut xml = String::from(XML_HEADER);
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);

    if !table.columns().is_empty() {
        xml.push_str(r#"<row r="1">"#);
        for (col, name) in table.columns().iter().enumerate() {
            push_string_cell(&mut xml, &cell_ref(col, 1), name);
        }
        xml.push_str("</row>");

        for row in 0..table.len() {
            let row_number = row + 2;
            xml.push_str(&format!(r#"<row r="{}">"#, row_number));
            for (col, name) in table.columns().iter().enumerate() {
                let reference = cell_ref(col, row_number);
                match table.cell(row, name) {
                    None | Some(Value::Null) => {}
                    Some(Value::Number(n)) => {
                        xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n));
                    }
                    Some(Value::Bool(b)) => {
                        xml.push_str(&format!(
                            r#"<c r="{}" t="b"><v>{}</v></c>"#,
                            reference,
                            u8::from(*b)
                        ));
                    }
                    Some(Value::String(s)) => push_string_cell(&mut xml, &reference, s),
                    Some(nested) => push_string_cell(&mut xml, &reference, &nested.to_string()),
                }
            }
            xml.push_str("</row>");
        }
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn cell_ref(col: usize, row: usize) -> String {
    format!("{}{}", column_name(col), row)
}

fn push_string_cell(xml: &mut String, reference: &str, text: &str) {
    let preserve = text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
    xml.push_str(&format!(r#"<c r="{}" t="inlineStr"><is>"#, reference));
    if preserve {
        xml.push_str(r#"<t xml:space="preserve">"#);
    } else {
        xml.push_str("<t>");
    }
    xml.push_str(&escape_xml(text));
    xml.push_str("</t></is></c>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projector::Table;
    use crate::domain::model::Record;
    use serde_json::json;
    use std::io::Read;

    fn table(rows: serde_json::Value) -> Table {
        Table::from_records(
            rows.as_array()
                .unwrap()
                .iter()
                .map(|r| Record::from(r.as_object().cloned().unwrap()))
                .collect(),
        )
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    fn sheet_names(bytes: &[u8]) -> Vec<String> {
        let workbook = read_part(bytes, "xl/workbook.xml");
        let re = regex::Regex::new(r#"<sheet name="([^"]*)""#).unwrap();
        re.captures_iter(&workbook).map(|c| c[1].to_string()).collect()
    }

    #[test]
    fn test_sheet_name_truncation_and_sanitizing() {
        assert_eq!(sheet_name("Taxes"), "Taxes");
        assert_eq!(
            sheet_name("Penalties_VERYLONGTYPE_Outbound"),
            "Penalties_VERYLONGTYPE_Outbound"
        );
        assert_eq!(
            sheet_name("Penalties_VERYLONGTYPES_Outbound"),
            "Penalties_VERYLONGTYPES_Outboun"
        );
        assert_eq!(sheet_name("Penalties_A/B_Inbound"), "Penalties_A_B_Inbound");
        assert_eq!(sheet_name(""), "Sheet");
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }

    #[test]
    fn test_workbook_structure() {
        let mut tables = NamedTables::new();
        tables.insert(
            "FareInfo",
            table(json!([{"type": "ADT", "amount": 450, "refundable": false, "note": null}])),
        );
        tables.insert("Taxes", Table::default());

        let bytes = WorkbookWriter::default().to_bytes(&tables).unwrap();
        assert_eq!(sheet_names(&bytes), vec!["FareInfo", "Taxes"]);

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t>type</t></is></c>"#));
        assert!(sheet.contains(r#"<c r="B2"><v>450</v></c>"#));
        assert!(sheet.contains(r#"<c r="C2" t="b"><v>0</v></c>"#));
        assert!(!sheet.contains(r#"r="D2""#));

        let empty = read_part(&bytes, "xl/worksheets/sheet2.xml");
        assert!(!empty.contains("<row"));
    }

    #[test]
    fn test_truncation_collision_lenient_and_strict() {
        let mut tables = NamedTables::new();
        tables.insert(
            "Penalties_LONGPASSENGERTYPE_Outbound",
            table(json!([{"fee": 1}])),
        );
        tables.insert(
            "Penalties_LONGPASSENGERTYPE_Outbound2",
            table(json!([{"fee": 2}, {"fee": 3}])),
        );

        let bytes = WorkbookWriter::new(NamingPolicy::Lenient)
            .to_bytes(&tables)
            .unwrap();
        assert_eq!(sheet_names(&bytes), vec!["Penalties_LONGPASSENGERTYPE_Out"]);
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.matches("<row ").count(), 3);

        let err = WorkbookWriter::new(NamingPolicy::Strict)
            .to_bytes(&tables)
            .unwrap_err();
        assert!(matches!(err, ExportError::SheetNameCollision { .. }));
    }

    #[test]
    fn test_empty_tables_still_produce_a_sheet() {
        let bytes = WorkbookWriter::default()
            .to_bytes(&NamedTables::new())
            .unwrap();
        assert_eq!(sheet_names(&bytes), vec!["Sheet1"]);
    }

    /// Accepts `limit` bytes, then fails every write.
    #[derive(Debug)]
    struct FailingWriter {
        inner: Cursor<Vec<u8>>,
        limit: usize,
    }

    impl FailingWriter {
        fn new(limit: usize) -> Self {
            Self {
                inner: Cursor::new(Vec::new()),
                limit,
            }
        }
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.inner.get_ref().len() + buf.len() > self.limit {
                return Err(std::io::Error::other("disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingWriter {
        fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_writer_failure_is_an_export_error() {
        let mut tables = NamedTables::new();
        tables.insert("Taxes", table(json!([{"code": "US", "amount": 25}])));

        let result = WorkbookWriter::default().write_to(FailingWriter::new(200), &tables);
        assert!(result.is_err());
    }

    #[test]
    fn test_clean_table_name_replaces_separators() {
        assert_eq!(clean_table_name("a/b\\c\0d"), "a_b_c_d");
        assert_eq!(sheet_name("/../x"), "_.._x");
    }
}
