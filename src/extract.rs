//! Plain-text extraction for uploaded documents.
//!
//! The format is sniffed from the bytes themselves, since uploads arrive
//! without a trustworthy content type:
//!
//! | Leading bytes | Format | Extraction |
//! |---------------|--------|------------|
//! | `%PDF` | PDF | `pdf-extract` |
//! | `PK\x03\x04` with `word/document.xml` | DOCX | `<w:t>` runs, paragraphs separated by a blank line |
//! | anything else | text | strict UTF-8 (a leading BOM is dropped) |

use std::io::Read;

use contextual_retrieval_core::traits::Parser;
use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("unsupported archive: {0}")]
    UnsupportedArchive(String),
    #[error("document is not valid UTF-8 text: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

/// Document format detected from leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Zip,
    Text,
}

pub fn detect_format(bytes: &[u8]) -> Format {
    if bytes.starts_with(PDF_MAGIC) {
        Format::Pdf
    } else if bytes.starts_with(ZIP_MAGIC) {
        Format::Zip
    } else {
        Format::Text
    }
}

/// Extract plain text from document bytes.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractError> {
    match detect_format(bytes) {
        Format::Pdf => extract_pdf(bytes),
        Format::Zip => extract_docx(bytes),
        Format::Text => {
            let text = String::from_utf8(bytes.to_vec())?;
            Ok(match text.strip_prefix(UTF8_BOM) {
                Some(rest) => rest.to_string(),
                None => text,
            })
        }
    }
}

/// [`Parser`] over [`extract_text`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentParser;

impl Parser for DocumentParser {
    fn parse(&self, bytes: &[u8]) -> anyhow::Result<String> {
        Ok(extract_text(bytes)?)
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let entry = match archive.by_name("word/document.xml") {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ExtractError::UnsupportedArchive(
                "word/document.xml not found".to_string(),
            ))
        }
        Err(e) => return Err(ExtractError::Docx(e.to_string())),
    };

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_docx_paragraphs(&doc_xml)
}

/// Collect `<w:t>` text, one paragraph per `<w:p>`, blank-line separated.
fn extract_docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let trailing = current.trim();
    if !trailing.is_empty() {
        paragraphs.push(trailing.to_string());
    }
    Ok(paragraphs.join("\n\n"))
}
