// 📄 Document Extraction
// Uploaded bytes → page text (PDF) or cell grid (CSV)

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// What kind of document was uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Pdf,
    Csv,
}

/// Text of a statement, one entry per page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementText {
    pub pages: Vec<String>,
}

impl StatementText {
    /// Build from already-extracted text, splitting pages on form feeds
    pub fn from_text(text: &str) -> Self {
        let pages = text
            .split('\u{000C}')
            .filter(|p| !p.trim().is_empty())
            .map(|p| p.to_string())
            .collect();
        StatementText { pages }
    }

    pub fn full_text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.trim().is_empty())
    }

    /// Iterate lines with their 1-based page number
    pub fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(i, page)| page.lines().map(move |line| (i + 1, line)))
    }
}

/// Detect the input kind from magic bytes first, then the filename.
pub fn detect_input_kind(bytes: &[u8], filename: &str) -> Result<InputKind> {
    if bytes.is_empty() {
        bail!("Uploaded file is empty");
    }

    // Readers accept the PDF header anywhere in the first 1024 bytes
    let head = &bytes[..bytes.len().min(1024)];
    if head.windows(5).any(|w| w == b"%PDF-") {
        return Ok(InputKind::Pdf);
    }

    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") || lower.ends_with(".txt") {
        return Ok(InputKind::Csv);
    }

    if std::str::from_utf8(head).is_ok() && head.contains(&b',') {
        return Ok(InputKind::Csv);
    }

    bail!(
        "Unsupported file type for '{}': expected a PDF or CSV bank statement",
        filename
    )
}

/// Extract the text layer of a PDF statement held in memory.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<StatementText> {
    // pdf-extract panics on some malformed fonts instead of returning Err
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| anyhow::anyhow!("PDF text extraction aborted on a malformed document"))?
        .context("Failed to extract text from PDF")?;

    let doc = StatementText::from_text(&text);
    if doc.is_empty() {
        bail!("PDF has no text layer (scanned statement?); OCR is not supported");
    }

    tracing::debug!(pages = doc.pages.len(), chars = text.len(), "Extracted PDF text");
    Ok(doc)
}

/// Read a CSV statement into a grid of trimmed cells.
///
/// Rows may have different lengths; statement exports often carry a few
/// preamble lines (account holder, period) above the real header.
pub fn read_csv_table(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Failed to parse CSV line {}", line_num + 1))?;
        let row: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(row);
    }

    Ok(rows)
}

fn cell_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\t+|\s{2,}").expect("valid cell split regex"))
}

/// Split a text line into table cells on tabs or runs of 2+ spaces
pub fn split_cells(line: &str) -> Vec<String> {
    cell_split_re()
        .split(line.trim())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Build a one-page PDF whose text layer holds `lines`, top to bottom.
#[cfg(test)]
pub(crate) fn text_pdf(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 10 Tf\n50 750 Td\n");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str("0 -16 Td\n");
        }
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        content.push_str(&format!("({}) Tj\n", escaped));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        concat!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] ",
            "/Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
        )
        .to_string(),
        format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf_by_magic() {
        let bytes = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";
        assert_eq!(detect_input_kind(bytes, "upload.bin").unwrap(), InputKind::Pdf);
    }

    #[test]
    fn test_detect_csv_by_name_and_content() {
        assert_eq!(detect_input_kind(b"a;b", "stmt.CSV").unwrap(), InputKind::Csv);
        assert_eq!(
            detect_input_kind(b"Date,Narration,Debit", "export").unwrap(),
            InputKind::Csv
        );
    }

    #[test]
    fn test_detect_rejects_unknown_and_empty() {
        assert!(detect_input_kind(&[0x89, 0x50, 0x4e, 0x47, 0xff], "image.png").is_err());
        assert!(detect_input_kind(b"", "stmt.pdf").is_err());
    }

    #[test]
    fn test_extract_pdf_rejects_garbage() {
        assert!(extract_pdf_text(b"%PDF-1.4 not really a pdf").is_err());
    }

    #[test]
    fn test_extract_pdf_text_layer() {
        let pdf = text_pdf(&["STATE BANK OF INDIA", "01/04/2024 UPI/SWIGGY 250.00 9,750.00"]);
        assert_eq!(detect_input_kind(&pdf, "upload").unwrap(), InputKind::Pdf);

        let doc = extract_pdf_text(&pdf).unwrap();
        let text = doc.full_text();
        assert!(text.contains("STATE BANK OF INDIA"));
        assert!(text.contains("UPI/SWIGGY"));
        assert!(doc.lines().any(|(page, line)| page == 1 && line.contains("9,750.00")));
    }

    #[test]
    fn test_statement_text_pages() {
        let doc = StatementText::from_text("page one\nline 2\u{000C}page two\u{000C}  \n");
        assert_eq!(doc.pages.len(), 2);
        let lines: Vec<_> = doc.lines().collect();
        assert_eq!(lines[0], (1, "page one"));
        assert_eq!(lines[2], (2, "page two"));
    }

    #[test]
    fn test_read_csv_table_flexible() {
        let csv = "Account Statement\n\nDate,Narration,Debit,Credit\n01/04/2024, SWIGGY ,250.00,\n";
        let rows = read_csv_table(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["Account Statement"]);
        assert_eq!(rows[2][1], "SWIGGY");
        assert_eq!(rows[2][3], "");
    }

    #[test]
    fn test_split_cells() {
        let cells = split_cells("  01/04/2024   UPI SWIGGY 1234\t250.00     10,000.00 ");
        assert_eq!(cells, vec!["01/04/2024", "UPI SWIGGY 1234", "250.00", "10,000.00"]);
    }
}
