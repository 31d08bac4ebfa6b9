//! Document upload and retrieval through the HTTP API.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Single-page PDF whose content stream draws `rust test phrase`.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    let content: &[u8] = b"BT /F1 12 Tf 100 700 Td (rust test phrase) Tj ET";
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");
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

/// DOCX (ZIP) with one paragraph per entry of `paragraphs`.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn query_before_upload_is_rejected() {
    let server = MockServer::start().await;
    let app = router(&server, all_credentials());

    let status = send(&app, get("/api/rag")).await;
    assert_eq!(status.json()["data"]["hasDocuments"], false);
    assert_eq!(status.json()["data"]["status"], "No documents uploaded");

    let reply = send(
        &app,
        post_json("/api/rag/query", json!({ "question": "What is in the file?" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn docx_upload_then_grounded_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("quarterly revenue grew by twelve percent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("Revenue grew by twelve percent.")),
        )
        .expect(1)
        .mount(&server)
        .await;
    let app = router(&server, all_credentials());

    let docx = minimal_docx(&[
        "Annual report.",
        "The quarterly revenue grew by twelve percent.",
    ]);
    let upload = send(
        &app,
        post_file("/api/rag/upload", "report.docx", MIME_DOCX, &docx, &[]),
    )
    .await;
    assert_eq!(upload.status, StatusCode::OK);
    let data = &upload.json()["data"];
    assert_eq!(data["filename"], "report.docx");
    assert_eq!(data["chunkCount"], 1);
    assert_eq!(data["totalDocuments"], 1);
    assert_eq!(data["message"], "Successfully processed report.docx into 1 chunks.");

    let reply = send(
        &app,
        post_json("/api/rag/query", json!({ "question": "How did revenue change?" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["data"]["answer"], "Revenue grew by twelve percent.");
    assert_eq!(reply.json()["data"]["totalDocuments"], 1);
}

#[tokio::test]
async fn pdf_and_text_uploads_count_documents() {
    let server = MockServer::start().await;
    let app = router(&server, all_credentials());

    let pdf = send(
        &app,
        post_file(
            "/api/rag/upload",
            "phrase.pdf",
            "application/pdf",
            &minimal_pdf_with_phrase(),
            &[],
        ),
    )
    .await;
    assert_eq!(pdf.status, StatusCode::OK, "{}", pdf.text());
    assert_eq!(pdf.json()["data"]["totalDocuments"], 1);

    // Declared octet-stream falls back to the file extension.
    let long = "Ownership rules apply to every value in Rust. ".repeat(50);
    let txt = send(
        &app,
        post_file(
            "/api/rag/upload",
            "notes.txt",
            "application/octet-stream",
            long.as_bytes(),
            &[],
        ),
    )
    .await;
    assert_eq!(txt.status, StatusCode::OK, "{}", txt.text());
    assert!(txt.json()["data"]["chunkCount"].as_u64().unwrap() > 1);
    assert_eq!(txt.json()["data"]["totalDocuments"], 2);

    let status = send(&app, get("/api/rag")).await.json();
    assert_eq!(status["data"]["totalDocuments"], 2);
    assert_eq!(status["data"]["status"], "Ready to answer questions");

    let cleared = send(&app, post_json("/api/rag/clear", json!({}))).await;
    assert_eq!(cleared.status, StatusCode::OK);
    let status = send(&app, get("/api/rag")).await.json();
    assert_eq!(status["data"]["totalDocuments"], 0);
    assert_eq!(status["data"]["totalChunks"], 0);
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    let server = MockServer::start().await;
    let app = router(&server, all_credentials());

    let reply = send(
        &app,
        post_file("/api/rag/upload", "photo.png", "image/png", &[1, 2, 3], &[]),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let message = reply.json()["error"]["message"].as_str().unwrap().to_string();
    assert!(message.contains("Unsupported file type"), "{}", message);
    assert_eq!(send(&app, get("/api/rag")).await.json()["data"]["totalDocuments"], 0);
}

#[tokio::test]
async fn missing_file_part_is_rejected() {
    let server = MockServer::start().await;
    let app = router(&server, all_credentials());

    let reply = send(&app, post_json("/api/rag/upload", json!({}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}
