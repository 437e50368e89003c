//! Multi-format ingestion: PDF and DOCX uploads go through the same
//! pipeline as plain text.

mod common;

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use contextual_retrieval::service::Services;
use contextual_retrieval::{db, migrate};
use contextual_retrieval_core::traits::LexicalIndex;
use contextual_retrieval_core::Error;
use tempfile::TempDir;

use common::{test_config, HashEmbedder, ScriptedChat};

/// Minimal valid PDF with a single line of text.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_text(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Minimal docx (ZIP) whose word/document.xml has one paragraph per entry.
fn minimal_docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

async fn setup() -> (TempDir, Services, Arc<ScriptedChat>) {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    migrate::run_migrations(&cfg).await.unwrap();
    let pool = db::connect(&cfg).await.unwrap();
    let chat = Arc::new(ScriptedChat::default());
    let services = Services::with_models(&cfg, pool, chat.clone(), Arc::new(HashEmbedder));
    (tmp, services, chat)
}

#[tokio::test]
async fn file_support_pdf_ingest_and_search() {
    let (_tmp, s, _chat) = setup().await;

    let ingested = s
        .ingestor
        .ingest(&minimal_pdf_with_text("lake fish census"), "survey.pdf")
        .await
        .unwrap();

    assert_eq!(ingested.chunks.len(), 1);
    assert!(ingested.chunks[0].content.contains("lake fish census"));

    let results = LexicalIndex::search(s.store.as_ref(), "census", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.items[0].id, ingested.chunks[0].embedding_id);
}

#[tokio::test]
async fn file_support_docx_paragraphs_become_chunks() {
    let (_tmp, s, chat) = setup().await;
    let first = "Office test phrase about the north warehouse and its loading docks in winter.";
    let second = "A second paragraph covering the south warehouse, its staff, and the night shift.";

    let ingested = s
        .ingestor
        .ingest(&minimal_docx_with_paragraphs(&[first, second]), "sites.docx")
        .await
        .unwrap();

    let contents: Vec<&str> = ingested.chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec![first, second]);
    assert_eq!(chat.calls.load(Ordering::SeqCst), 2);

    // The whole extracted text is what the model sees as the document.
    let prompts = chat.prompts.lock().unwrap();
    assert!(prompts[0].contains(&format!("<document>\n{}\n\n{}\n</document>", first, second)));
}

#[tokio::test]
async fn file_support_invalid_utf8_is_a_parse_error() {
    let (_tmp, s, chat) = setup().await;

    let err = s
        .ingestor
        .ingest(&[0x41, 0xff, 0xfe, 0x42], "binary.bin")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    assert!(s.store.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn file_support_corrupt_pdf_is_a_parse_error() {
    let (_tmp, s, _chat) = setup().await;

    let err = s
        .ingestor
        .ingest(b"%PDF-1.4\nnot a real pdf", "broken.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(_)));
    assert!(s.store.list_documents().await.unwrap().is_empty());
}
