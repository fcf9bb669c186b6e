//! Chat model transport abstraction.
//!
//! Both pipelines talk to the provider through [`ChatModel`] so tests can
//! substitute scripted transports and count attempts without any network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;
use serde_json::json;

use super::schema::SchemaError;
use super::AiError;

/// One model request: prompt plus zero or more image references.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system: String,
    pub user_text: String,
    /// Attached as separate image content parts, in order.
    pub image_urls: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Black-box model capability: given a request, return the raw text
/// completion or a typed failure. One outbound call per invocation —
/// retry policy lives in the caller.
pub trait ChatModel: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a ModelRequest,
    ) -> BoxFuture<'a, Result<String, AiError>>;
}

/// Truncated preview of an upstream body, safe to surface in errors.
pub(crate) fn truncate_body(body: &str, max: usize) -> String {
    if body.len() <= max {
        body.to_string()
    } else {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &body[..cut])
    }
}

// ═══════════════════════════════════════════════════════════
// OpenAI-compatible HTTP client
// ═══════════════════════════════════════════════════════════

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl OpenAiChatClient {
    /// Build a client with a bounded per-attempt timeout.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn complete_inner(&self, request: &ModelRequest) -> Result<String, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::Configuration("API key not configured".into()))?;

        let mut content = vec![json!({"type": "text", "text": request.user_text})];
        for url in &request.image_urls {
            content.push(json!({"type": "image_url", "image_url": {"url": url}}));
        }

        let body = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": content},
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AiError::Network(format!("cannot reach {}: {e}", self.base_url))
                } else {
                    AiError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            let preview = truncate_body(&body, 300);

            return Err(match status.as_u16() {
                401 | 403 => AiError::Configuration(format!(
                    "provider rejected credential (status {status})"
                )),
                429 => AiError::RateLimited { retry_after },
                400 if body.to_ascii_lowercase().contains("image") => {
                    AiError::InvalidImage(preview)
                }
                code => AiError::Upstream { status: code, body: preview },
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| SchemaError::Json(format!("provider envelope: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| SchemaError::Json("provider returned no choices".into()).into())
    }
}

impl ChatModel for OpenAiChatClient {
    fn complete<'a>(
        &'a self,
        request: &'a ModelRequest,
    ) -> BoxFuture<'a, Result<String, AiError>> {
        self.complete_inner(request).boxed()
    }
}

// ═══════════════════════════════════════════════════════════
// Scripted transport for tests
// ═══════════════════════════════════════════════════════════

/// One scripted outcome for [`ScriptedChatModel`].
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Ok(String),
    Timeout,
    Network,
    RateLimited,
    Configuration,
    Status(u16),
}

impl ScriptedResponse {
    fn materialize(&self) -> Result<String, AiError> {
        match self {
            ScriptedResponse::Ok(text) => Ok(text.clone()),
            ScriptedResponse::Timeout => Err(AiError::Timeout(25)),
            ScriptedResponse::Network => Err(AiError::Network("scripted outage".into())),
            ScriptedResponse::RateLimited => {
                Err(AiError::RateLimited { retry_after: Some(60) })
            }
            ScriptedResponse::Configuration => {
                Err(AiError::Configuration("scripted credential failure".into()))
            }
            ScriptedResponse::Status(code) => Err(AiError::Upstream {
                status: *code,
                body: "scripted upstream error".into(),
            }),
        }
    }
}

/// Scripted model transport: plays a fixed sequence of outcomes and
/// records every request. The final script entry repeats once the
/// script is exhausted, so a one-entry script means "always".
pub struct ScriptedChatModel {
    script: Vec<ScriptedResponse>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedChatModel {
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always return the same successful completion.
    pub fn always_ok(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedResponse::Ok(text.into())])
    }

    /// Always fail with the given outcome.
    pub fn always(failure: ScriptedResponse) -> Self {
        Self::new(vec![failure])
    }

    /// Fail `n` times with `failure`, then succeed with `text`.
    pub fn fail_times_then(n: usize, failure: ScriptedResponse, text: impl Into<String>) -> Self {
        let mut script = vec![failure; n];
        script.push(ScriptedResponse::Ok(text.into()));
        Self::new(script)
    }

    /// How many outbound calls were attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request seen, in order.
    pub fn recorded_requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ChatModel for ScriptedChatModel {
    fn complete<'a>(
        &'a self,
        request: &'a ModelRequest,
    ) -> BoxFuture<'a, Result<String, AiError>> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let outcome = match self.script.get(index).or_else(|| self.script.last()) {
            Some(entry) => entry.materialize(),
            None => Err(AiError::Network("empty script".into())),
        };
        async move { outcome }.boxed()
    }
}
