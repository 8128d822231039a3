//! Vision-model client for a local Ollama server.
//!
//! [`VisionClient`] is the seam the captioner and the demo are written
//! against; [`OllamaClient`] is the production implementation. Requests are
//! non-streaming: one POST, one JSON answer.
//!
//! | [`OllamaApi`] | Endpoint | Request | Answer field |
//! |---------------|----------|---------|--------------|
//! | `Chat` | `/api/chat` | one user message with `images` | `message.content` |
//! | `Generate` | `/api/generate` | `prompt` + `images` | `response` |

use crate::config::{OllamaApi, DEFAULT_OLLAMA_URL};
use crate::error::{CaptionError, FigscribeError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Sends one image plus an instruction to a vision model and returns the
/// raw text it produced.
pub trait VisionClient: Send + Sync {
    fn describe(
        &self,
        model: &str,
        prompt: &str,
        image_base64: &str,
    ) -> impl Future<Output = Result<String, CaptionError>> + Send;
}

/// HTTP client for the Ollama API.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    api: OllamaApi,
    timeout_secs: Option<u64>,
}

impl OllamaClient {
    /// Create a client for the server at `base_url`.
    ///
    /// `timeout_secs = None` never times out; a large model loading into
    /// memory on its first request can take several minutes.
    pub fn new(
        base_url: &str,
        api: OllamaApi,
        timeout_secs: Option<u64>,
    ) -> Result<Self, FigscribeError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FigscribeError::Internal(format!("Failed to create HTTP client: {e}")))?;

        // OLLAMA_HOST is often given as bare host:port.
        let base_url = base_url.trim_end_matches('/');
        let base_url = if base_url.contains("://") {
            base_url.to_string()
        } else {
            format!("http://{base_url}")
        };

        Ok(Self {
            base_url,
            client,
            api,
            timeout_secs,
        })
    }

    /// Default Ollama instance at localhost:11434, chat API, no timeout.
    pub fn default_local() -> Result<Self, FigscribeError> {
        Self::new(DEFAULT_OLLAMA_URL, OllamaApi::default(), None)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api(&self) -> OllamaApi {
        self.api
    }

    /// Names of the models pulled on the server (`GET /api/tags`).
    pub async fn list_models(&self) -> Result<Vec<String>, CaptionError> {
        let url = format!("{}/api/tags", self.base_url);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let parsed: TagsResponse = self.decode(response, None).await?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    /// The subset of `wanted` that is not pulled on the server.
    pub async fn missing_models(&self, wanted: &[String]) -> Result<Vec<String>, CaptionError> {
        let available = self.list_models().await?;
        Ok(wanted
            .iter()
            .filter(|m| !model_is_listed(m, &available))
            .cloned()
            .collect())
    }

    fn transport_error(&self, e: reqwest::Error) -> CaptionError {
        if e.is_connect() {
            CaptionError::Connection {
                url: self.base_url.clone(),
            }
        } else if e.is_timeout() {
            CaptionError::Timeout {
                secs: self.timeout_secs.unwrap_or_default(),
            }
        } else {
            CaptionError::HttpClient(e.to_string())
        }
    }

    /// Check the status and decode the JSON body. A 404 on an inference
    /// endpoint means the model is not pulled.
    async fn decode<R: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        model: Option<&str>,
    ) -> Result<R, CaptionError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match model {
                Some(model) if status == reqwest::StatusCode::NOT_FOUND => {
                    CaptionError::ModelNotFound {
                        model: model.to_string(),
                    }
                }
                _ => CaptionError::Api {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| CaptionError::ResponseParsing(e.to_string()))
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        model: &str,
    ) -> Result<R, CaptionError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {} (model {})", url, model);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response, Some(model)).await
    }
}

impl VisionClient for OllamaClient {
    async fn describe(
        &self,
        model: &str,
        prompt: &str,
        image_base64: &str,
    ) -> Result<String, CaptionError> {
        let images = vec![image_base64.to_string()];
        match self.api {
            OllamaApi::Chat => {
                let body = ChatRequest {
                    model,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                        images,
                    }],
                    stream: false,
                };
                let parsed: ChatResponse = self.post("/api/chat", &body, model).await?;
                Ok(parsed.message.content)
            }
            OllamaApi::Generate => {
                let body = GenerateRequest {
                    model,
                    prompt,
                    images,
                    stream: false,
                };
                let parsed: GenerateResponse = self.post("/api/generate", &body, model).await?;
                Ok(parsed.response)
            }
        }
    }
}

/// `wanted` without a tag matches `wanted:latest`; a tagged name must match
/// exactly.
fn model_is_listed(wanted: &str, available: &[String]) -> bool {
    available.iter().any(|name| {
        name == wanted || (!wanted.contains(':') && *name == format!("{wanted}:latest"))
    })
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_trimmed() {
        let c = OllamaClient::new("http://gpu-box:11434/", OllamaApi::Generate, Some(60)).unwrap();
        assert_eq!(c.base_url(), "http://gpu-box:11434");
        assert_eq!(c.api(), OllamaApi::Generate);

        let bare = OllamaClient::new("127.0.0.1:11434", OllamaApi::Chat, None).unwrap();
        assert_eq!(bare.base_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn chat_request_shape() {
        let body = ChatRequest {
            model: "granite3.2-vision",
            messages: vec![ChatMessage {
                role: "user",
                content: "Extract all text from this image.",
                images: vec!["aGVsbG8=".into()],
            }],
            stream: false,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["stream"], false);
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["images"][0], "aGVsbG8=");
    }

    #[test]
    fn generate_response_parses() {
        let r: GenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"Accuracy 87%","done":true}"#).unwrap();
        assert_eq!(r.response, "Accuracy 87%");
    }

    #[test]
    fn untagged_model_matches_latest() {
        let available = vec![
            "granite3.2-vision:latest".to_string(),
            "llava:13b".to_string(),
        ];
        assert!(model_is_listed("granite3.2-vision", &available));
        assert!(model_is_listed("llava:13b", &available));
        assert!(!model_is_listed("llava", &available));
        assert!(!model_is_listed("llama3.2-vision", &available));
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            OllamaClient::new(&format!("http://127.0.0.1:{port}"), OllamaApi::Chat, Some(5)).unwrap();
        let err = client.describe("m", "p", "aGVsbG8=").await.unwrap_err();
        assert!(matches!(err, CaptionError::Connection { .. }), "got {err:?}");
    }
}
