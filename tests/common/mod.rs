//! Shared fixtures for the offline integration tests: a converter that
//! needs no PDFium, and a throw-away HTTP server that speaks just enough of
//! the Ollama API.

#![allow(dead_code)]

use figscribe::converter::{ConvertedDocument, VisualRegion, IMAGE_PLACEHOLDER};
use figscribe::{DocumentConverter, DocumentError, FigureKind};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ── Converter ────────────────────────────────────────────────────────────────

pub fn tiny_png(rgba: [u8; 4]) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba(rgba)));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Returns one figure and one table for every document, except documents
/// whose file name contains `broken`, which fail to convert.
pub struct StubConverter;

impl DocumentConverter for StubConverter {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn convert(&self, pdf_path: &Path) -> Result<ConvertedDocument, DocumentError> {
        let name = pdf_path.file_name().unwrap().to_string_lossy().into_owned();
        if name.contains("broken") {
            return Err(DocumentError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: "xref table missing".into(),
            });
        }
        Ok(ConvertedDocument {
            json: serde_json::json!({ "source": name }),
            markdown: format!("# {name}\n\n{IMAGE_PLACEHOLDER}\n"),
            regions: vec![
                VisualRegion {
                    kind: FigureKind::Figure,
                    page: Some(1),
                    png: tiny_png([255, 0, 0, 255]),
                },
                VisualRegion {
                    kind: FigureKind::Table,
                    page: Some(2),
                    png: tiny_png([0, 0, 255, 255]),
                },
            ],
        })
    }
}

pub fn write_pdf(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let p = dir.join(name);
    std::fs::create_dir_all(p.parent().unwrap()).unwrap();
    std::fs::write(&p, bytes).unwrap();
    p
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

// ── Canned Ollama server ─────────────────────────────────────────────────────

/// One request as seen by [`FakeOllama`].
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub body: serde_json::Value,
}

/// Answers `/api/chat`, `/api/generate` and `/api/tags`. Models in
/// `missing` get a 404 like an unpulled model on a real server.
pub struct FakeOllama {
    pub url: String,
    pub seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeOllama {
    pub async fn start(pulled: &[&str], missing: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pulled: Vec<String> = pulled.iter().map(|s| s.to_string()).collect();
        let missing: Vec<String> = missing.iter().map(|s| s.to_string()).collect();

        let seen_bg = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let seen = seen_bg.clone();
                let pulled = pulled.clone();
                let missing = missing.clone();
                tokio::spawn(async move {
                    handle(stream, &pulled, &missing, &seen).await;
                });
            }
        });

        Self { url, seen }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

/// A port nothing listens on.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

async fn handle(
    mut stream: TcpStream,
    pulled: &[String],
    missing: &[String],
    seen: &Mutex<Vec<SeenRequest>>,
) {
    let Some((method, path, body)) = read_request(&mut stream).await else {
        return;
    };
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    seen.lock().unwrap().push(SeenRequest {
        method: method.clone(),
        path: path.clone(),
        body: json.clone(),
    });

    let model = json["model"].as_str().unwrap_or_default().to_string();
    let (status, reply) = match path.as_str() {
        "/api/tags" => {
            let models: Vec<_> = pulled
                .iter()
                .map(|m| serde_json::json!({ "name": m }))
                .collect();
            ("200 OK", serde_json::json!({ "models": models }))
        }
        _ if missing.contains(&model) => (
            "404 Not Found",
            serde_json::json!({ "error": format!("model '{model}' not found") }),
        ),
        "/api/chat" => (
            "200 OK",
            serde_json::json!({
                "model": model,
                "message": { "role": "assistant", "content": format!("```\n{model} read: 87%\n```") },
                "done": true
            }),
        ),
        "/api/generate" => (
            "200 OK",
            serde_json::json!({ "model": model, "response": format!("{model} says hi"), "done": true }),
        ),
        _ => ("404 Not Found", serde_json::json!({ "error": "no route" })),
    };

    let body = reply.to_string();
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<(String, String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some((method, path, buf[header_end..].to_vec()))
}
