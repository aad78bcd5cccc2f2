use super::CapabilityBackend;
use crate::config::CapabilityConfig;
use crate::llm::{GenerationRequest, GenerationResponse, Turn};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use swarm_core::{GroundingSource, SwarmError, SwarmResult, ToolCall};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Gemini (Generative Language API) backend.
pub struct GeminiBackend {
    config: CapabilityConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: CapabilityConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.config.base_url())
    }

    async fn post(&self, url: &str, body: &Value) -> SwarmResult<reqwest::Response> {
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(SwarmError::Http(format!(
                "Gemini API error {status}: {error_body}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl CapabilityBackend for GeminiBackend {
    async fn generate(&self, request: &GenerationRequest) -> SwarmResult<GenerationResponse> {
        let url = self.endpoint(&request.model, "generateContent");
        let body = build_request_body(request);
        debug!(model = %request.model, grounding = request.grounding, tools = request.tools.len(), "Gemini generateContent");

        let resp = self.post(&url, &body).await?;
        let resp_body: Value = resp
            .json()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;

        parse_gemini_response(&resp_body)
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> SwarmResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<SwarmResult<GenerationResponse>>,
    )> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&request.model, "streamGenerateContent")
        );
        let body = build_request_body(request);
        debug!(model = %request.model, "Gemini streamGenerateContent");

        let resp = self.post(&url, &body).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(256);
        let byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut stream = byte_stream;
            let mut lines = SseLines::default();
            let mut full_text = String::new();
            let mut sources: Vec<GroundingSource> = Vec::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: format!("Stream read error: {e}"),
                            })
                            .await;
                        return Err(SwarmError::Http(format!("Stream read error: {e}")));
                    }
                };

                for line in lines.push(&chunk) {
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let event: Value = match serde_json::from_str(data.trim()) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    if let Some(error) = event.get("error") {
                        let message = format!("Gemini stream error: {error}");
                        let _ = tx
                            .send(StreamEvent::Error {
                                message: message.clone(),
                            })
                            .await;
                        return Err(SwarmError::Http(message));
                    }

                    let Some(candidate) = event["candidates"].get(0) else {
                        continue;
                    };
                    let (text, calls) = parse_parts(candidate, tool_calls.len());
                    tool_calls.extend(calls);
                    if let Some(chunk_sources) = parse_sources(candidate) {
                        sources = chunk_sources;
                    }
                    if !text.is_empty() {
                        full_text.push_str(&text);
                        let _ = tx.send(StreamEvent::TextDelta { text }).await;
                    }
                }
            }

            let _ = tx.send(StreamEvent::Done).await;
            Ok(GenerationResponse {
                text: full_text,
                sources,
                tool_calls,
            })
        });

        Ok((rx, handle))
    }
}

/// Splits an SSE byte stream into lines. Bytes are buffered until a newline
/// arrives, so a multi-byte character split across network chunks decodes
/// intact.
#[derive(Default)]
struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            lines.push(String::from_utf8_lossy(&raw).trim().to_string());
        }
        lines
    }
}

// -- Gemini wire format --

fn turn_to_content(turn: &Turn) -> Value {
    match turn {
        Turn::User(text) => json!({"role": "user", "parts": [{"text": text}]}),
        Turn::Model { text, tool_calls } => {
            let mut parts: Vec<Value> = Vec::new();
            if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                parts.push(json!({"text": text}));
            }
            parts.extend(tool_calls.iter().map(|call| {
                json!({"functionCall": {"name": call.name, "args": call.arguments}})
            }));
            json!({"role": "model", "parts": parts})
        }
        Turn::ToolResults(results) => {
            let parts: Vec<Value> = results
                .iter()
                .map(|r| {
                    json!({"functionResponse": {
                        "name": r.name,
                        "response": {"result": r.content},
                    }})
                })
                .collect();
            json!({"role": "user", "parts": parts})
        }
    }
}

/// Builds the `generateContent` request body for a generation request.
pub fn build_request_body(request: &GenerationRequest) -> Value {
    let contents: Vec<Value> = request.turns.iter().map(turn_to_content).collect();
    let mut body = json!({ "contents": contents });

    let mut tools: Vec<Value> = Vec::new();
    if request.grounding {
        tools.push(json!({"google_search": {}}));
    }
    if !request.tools.is_empty() {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters_schema,
                })
            })
            .collect();
        tools.push(json!({ "functionDeclarations": declarations }));
    }
    if !tools.is_empty() {
        body["tools"] = Value::Array(tools);
    }

    if let Some(schema) = &request.response_schema {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        });
    }
    body
}

/// Text and function calls of a candidate. Thought parts are skipped.
fn parse_parts(candidate: &Value, id_offset: usize) -> (String, Vec<ToolCall>) {
    let mut text = String::new();
    let mut calls = Vec::new();
    let Some(parts) = candidate["content"]["parts"].as_array() else {
        return (text, calls);
    };
    for part in parts {
        if part["thought"].as_bool() == Some(true) {
            continue;
        }
        if let Some(t) = part["text"].as_str() {
            text.push_str(t);
        }
        if let Some(fc) = part.get("functionCall") {
            let id = fc["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", id_offset + calls.len()));
            let arguments = match &fc["args"] {
                Value::Null => json!({}),
                args => args.clone(),
            };
            calls.push(ToolCall {
                id,
                name: fc["name"].as_str().unwrap_or_default().to_string(),
                arguments,
            });
        }
    }
    (text, calls)
}

/// Web citations from a candidate's grounding metadata, if it carries any.
fn parse_sources(candidate: &Value) -> Option<Vec<GroundingSource>> {
    let chunks = candidate["groundingMetadata"]["groundingChunks"].as_array()?;
    Some(
        chunks
            .iter()
            .filter_map(|chunk| {
                let web = chunk.get("web")?;
                Some(GroundingSource::new(
                    web["uri"].as_str()?,
                    web["title"].as_str().unwrap_or_default(),
                ))
            })
            .collect(),
    )
}

pub fn parse_gemini_response(body: &Value) -> SwarmResult<GenerationResponse> {
    let Some(candidate) = body["candidates"].get(0) else {
        if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
            return Err(SwarmError::Capability(format!(
                "Gemini blocked the prompt: {reason}"
            )));
        }
        return Err(SwarmError::Capability(
            "Missing candidates in Gemini response".into(),
        ));
    };

    let (text, tool_calls) = parse_parts(candidate, 0);
    Ok(GenerationResponse {
        text,
        sources: parse_sources(candidate).unwrap_or_default(),
        tool_calls,
    })
}
