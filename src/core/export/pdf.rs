use crate::utils::error::ExportError;
use std::io::{self, Write};

// A4 in points
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;

// 物件編號固定：1 catalog, 2 pages, 3-4 fonts, 5 info, 之後每頁兩個物件
const FIRST_PAGE_OBJECT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
}

impl TextStyle {
    fn font(&self) -> &'static str {
        match self {
            TextStyle::Title | TextStyle::Heading => "F1",
            TextStyle::Body => "F2",
        }
    }

    fn size(&self) -> f32 {
        match self {
            TextStyle::Title => 16.0,
            TextStyle::Heading => 12.0,
            TextStyle::Body => 8.0,
        }
    }

    fn leading(&self) -> f32 {
        self.size() * 1.4
    }

    /// Characters per line before wrapping. Body text is Courier, so this is exact there.
    fn max_chars(&self) -> usize {
        match self {
            TextStyle::Title => 55,
            TextStyle::Heading => 75,
            TextStyle::Body => ((PAGE_WIDTH - 2.0 * MARGIN) / (self.size() * 0.6)) as usize,
        }
    }
}

#[derive(Debug, Clone)]
struct PlacedLine {
    style: TextStyle,
    y: f32,
    text: String,
}

/// A paginated plain-text PDF built line by line with the standard fonts.
#[derive(Debug, Clone)]
pub struct TextDocument {
    title: String,
    pages: Vec<Vec<PlacedLine>>,
    cursor_y: f32,
}

impl TextDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pages: vec![Vec::new()],
            cursor_y: PAGE_HEIGHT - MARGIN,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Add text; embedded newlines start new lines and long lines wrap.
    pub fn push(&mut self, style: TextStyle, text: &str) {
        for line in text.lines() {
            let chars: Vec<char> = line.chars().collect();
            if chars.is_empty() {
                self.place(style, String::new());
                continue;
            }
            for chunk in chars.chunks(style.max_chars()) {
                self.place(style, chunk.iter().collect());
            }
        }
    }

    pub fn blank_line(&mut self) {
        self.place(TextStyle::Body, String::new());
    }

    fn place(&mut self, style: TextStyle, text: String) {
        let leading = style.leading();
        if self.cursor_y - leading < MARGIN {
            self.pages.push(Vec::new());
            self.cursor_y = PAGE_HEIGHT - MARGIN;
        }
        self.cursor_y -= leading;
        if let Some(page) = self.pages.last_mut() {
            page.push(PlacedLine {
                style,
                y: self.cursor_y,
                text,
            });
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        let out = self.write_to(Vec::new())?;
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> io::Result<W> {
        let mut out = CountingWriter {
            inner: writer,
            written: 0,
        };
        let mut offsets = Vec::new();

        out.write_all(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n")?;

        let kids = (0..self.pages.len())
            .map(|i| format!("{} 0 R", FIRST_PAGE_OBJECT + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");

        write_object(&mut out, &mut offsets, b"<< /Type /Catalog /Pages 2 0 R >>")?;
        write_object(
            &mut out,
            &mut offsets,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids,
                self.pages.len()
            )
            .as_bytes(),
        )?;
        write_object(
            &mut out,
            &mut offsets,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
        )?;
        write_object(
            &mut out,
            &mut offsets,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding >>",
        )?;

        let mut info = b"<< /Title (".to_vec();
        info.extend(encode_text(&self.title));
        info.extend(
            format!(
                ") /Producer (bfm-viewer) /CreationDate (D:{}) >>",
                chrono::Utc::now().format("%Y%m%d%H%M%SZ")
            )
            .as_bytes(),
        );
        write_object(&mut out, &mut offsets, &info)?;

        for (index, page) in self.pages.iter().enumerate() {
            let content_id = FIRST_PAGE_OBJECT + 2 * index + 1;
            write_object(
                &mut out,
                &mut offsets,
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    PAGE_WIDTH, PAGE_HEIGHT, content_id
                )
                .as_bytes(),
            )?;

            let stream = page_content(page);
            let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            body.extend(stream);
            body.extend(b"\nendstream");
            write_object(&mut out, &mut offsets, &body)?;
        }

        let xref_start = out.written;
        out.write_all(format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1).as_bytes())?;
        for offset in &offsets {
            out.write_all(format!("{:010} 00000 n \n", offset).as_bytes())?;
        }
        out.write_all(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
                offsets.len() + 1,
                xref_start
            )
            .as_bytes(),
        )?;
        out.flush()?;

        Ok(out.inner)
    }
}

struct CountingWriter<W> {
    inner: W,
    written: usize,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Objects are numbered by write order, starting at 1.
fn write_object<W: Write>(
    out: &mut CountingWriter<W>,
    offsets: &mut Vec<usize>,
    body: &[u8],
) -> io::Result<()> {
    offsets.push(out.written);
    out.write_all(format!("{} 0 obj\n", offsets.len()).as_bytes())?;
    out.write_all(body)?;
    out.write_all(b"\nendobj\n")
}

fn page_content(lines: &[PlacedLine]) -> Vec<u8> {
    let mut stream = Vec::new();
    for line in lines.iter().filter(|l| !l.text.is_empty()) {
        stream.extend(
            format!(
                "BT /{} {} Tf {} {:.2} Td (",
                line.style.font(),
                line.style.size(),
                MARGIN,
                line.y
            )
            .as_bytes(),
        );
        stream.extend(encode_text(&line.text));
        stream.extend(b") Tj ET\n");
    }
    stream
}

/// Encode for a WinAnsi literal string. Characters outside Latin-1 become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            '→' => out.extend(b"->"),
            '\t' => out.push(b' '),
            ' '..='~' => out.push(c as u8),
            '\u{A0}'..='\u{FF}' => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}
