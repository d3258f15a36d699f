/// Generation client: the single point of entry for calls to the external
/// generation service.
///
/// ARCHITECTURAL RULE: no other module talks to the service directly. Handlers
/// and the refinement session go through `GenerationService`, which is also the
/// seam tests replace with a scripted implementation.
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::context::models::{GenerationMode, Segment};

pub mod prompts;
pub mod schema;

use schema::ExtractionSchema;

/// Low-latency model for form-driven drafting.
pub const FAST_MODEL: &str = "gemini-3-flash-preview";
/// Model used where the draft must reason over long exemplars.
pub const REASONING_MODEL: &str = "gemini-3-pro-preview";
const REASONING_THINKING_BUDGET: u32 = 2048;
const JSON_MIME_TYPE: &str = "application/json";

/// Finish reasons that mean the service refused to answer.
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Fast,
    Reasoning,
}

impl ModelTier {
    pub fn model(self) -> &'static str {
        match self {
            ModelTier::Fast => FAST_MODEL,
            ModelTier::Reasoning => REASONING_MODEL,
        }
    }

    fn thinking_budget(self) -> Option<u32> {
        match self {
            ModelTier::Fast => None,
            ModelTier::Reasoning => Some(REASONING_THINKING_BUDGET),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("could not reach the generation service: {0}")]
    Network(String),

    #[error("generation service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("structured output did not match the schema: {0}")]
    MalformedStructuredOutput(String),

    #[error("generation service returned no content")]
    EmptyResult,

    #[error("generation was cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Stable machine code shown to the UI.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Network(_) => "NETWORK_ERROR",
            GenerationError::Service { .. } => "SERVICE_ERROR",
            GenerationError::MalformedStructuredOutput(_) => "MALFORMED_STRUCTURED_OUTPUT",
            GenerationError::EmptyResult => "EMPTY_RESULT",
            GenerationError::Cancelled => "CANCELLED",
        }
    }
}

/// Everything one call needs. The segment list is always complete: the
/// service keeps no memory between calls.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub segments: Vec<Segment>,
    pub mode: GenerationMode,
    pub schema: Option<ExtractionSchema>,
    pub system_prompt: Option<String>,
    pub model: ModelTier,
}

impl GenerationRequest {
    pub fn generation(segments: Vec<Segment>, model: ModelTier) -> Self {
        Self {
            segments,
            mode: GenerationMode::Generation,
            schema: None,
            system_prompt: None,
            model,
        }
    }

    pub fn extraction(segments: Vec<Segment>, schema: ExtractionSchema, model: ModelTier) -> Self {
        Self {
            segments,
            mode: GenerationMode::Extraction,
            schema: Some(schema),
            system_prompt: None,
            model,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    Text(String),
    Structured(Map<String, Value>),
}

impl GenerationOutput {
    #[cfg(test)]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            GenerationOutput::Text(text) => Some(text),
            GenerationOutput::Structured(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Ok,
    Failed,
}

/// UI-facing outcome of a call. Exactly one of `text`/`structured` is set on OK.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl From<&Result<GenerationOutput, GenerationError>> for GenerationResult {
    fn from(result: &Result<GenerationOutput, GenerationError>) -> Self {
        match result {
            Ok(GenerationOutput::Text(text)) => Self {
                status: ResultStatus::Ok,
                text: Some(text.clone()),
                structured: None,
                error_kind: None,
            },
            Ok(GenerationOutput::Structured(fields)) => Self {
                status: ResultStatus::Ok,
                text: None,
                structured: Some(fields.clone()),
                error_kind: None,
            },
            Err(e) => Self {
                status: ResultStatus::Failed,
                text: None,
                structured: None,
                error_kind: Some(e.kind()),
            },
        }
    }
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationOutput, GenerationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: Vec<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: WireBlob<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<WireThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
    usage_metadata: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireCandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WireCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct WireCandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    /// One round trip. No automatic retries: every failure goes back to the
    /// operator, who decides whether to try again.
    async fn call(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = build_wire_request(request);

        let response = self
            .client
            .post(self.endpoint(request.model.model()))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Generation request failed before a response: {}", e);
                GenerationError::Network(e.to_string())
            })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<WireErrorEnvelope>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            error!("Generation service returned {}: {}", status, message);
            return Err(GenerationError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: WireResponse =
            serde_json::from_str(&raw).map_err(|e| GenerationError::Service {
                status: status.as_u16(),
                message: format!("unreadable response body: {e}"),
            })?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Generation call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0)
            );
        }

        response_text(parsed, status.as_u16())
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let raw = self.call(request).await?;
        interpret(request, &raw)
    }
}

fn build_wire_request(request: &GenerationRequest) -> WireRequest<'_> {
    let parts = request
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Text { body, .. } | Segment::Separator { body, .. } => {
                WirePart::Text { text: body }
            }
            Segment::Attachment(source) => WirePart::InlineData {
                inline_data: WireBlob {
                    mime_type: &source.media_type,
                    data: &source.payload,
                },
            },
        })
        .collect();

    let extraction = request.mode == GenerationMode::Extraction;
    let thinking_config = request
        .model
        .thinking_budget()
        .map(|thinking_budget| WireThinkingConfig { thinking_budget });

    let generation_config = if extraction || thinking_config.is_some() {
        Some(WireGenerationConfig {
            response_mime_type: extraction.then_some(JSON_MIME_TYPE),
            response_schema: request
                .schema
                .as_ref()
                .filter(|_| extraction)
                .map(ExtractionSchema::to_response_schema),
            thinking_config,
        })
    } else {
        None
    };

    WireRequest {
        contents: vec![WireContent {
            role: Some("user"),
            parts,
        }],
        system_instruction: request.system_prompt.as_deref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart::Text { text }],
        }),
        generation_config,
    }
}

/// Joins the visible text of the first candidate, refusing blocked answers.
fn response_text(response: WireResponse, status: u16) -> Result<String, GenerationError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        warn!("Generation request was blocked: {}", reason);
        return Err(GenerationError::Service {
            status,
            message: format!("request blocked by the service ({reason})"),
        });
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GenerationError::EmptyResult)?;

    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|r| BLOCKED_FINISH_REASONS.contains(r))
    {
        warn!("Generation answer was withheld: {}", reason);
        return Err(GenerationError::Service {
            status,
            message: format!("answer withheld by the service ({reason})"),
        });
    }

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResult);
    }
    Ok(text)
}

/// Mode-specific post-processing of the raw answer text.
pub fn interpret(
    request: &GenerationRequest,
    raw: &str,
) -> Result<GenerationOutput, GenerationError> {
    match request.mode {
        GenerationMode::Generation => {
            let text = strip_wrapping_quotes(raw);
            if text.trim().is_empty() {
                return Err(GenerationError::EmptyResult);
            }
            Ok(GenerationOutput::Text(text.to_string()))
        }
        GenerationMode::Extraction => {
            let body = strip_json_fences(raw);
            let fields = match &request.schema {
                Some(schema) => schema.parse_strict(body).map_err(|e| {
                    warn!("Structured output rejected: {}", e);
                    GenerationError::MalformedStructuredOutput(e.to_string())
                })?,
                None => serde_json::from_str::<Map<String, Value>>(body)
                    .map_err(|e| GenerationError::MalformedStructuredOutput(e.to_string()))?,
            };
            Ok(GenerationOutput::Structured(fields))
        }
    }
}

/// Removes one matching pair of wrapping quotes, straight or typographic.
pub fn strip_wrapping_quotes(text: &str) -> &str {
    let text = text.trim();
    for (open, close) in [('"', '"'), ('“', '”')] {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner;
        }
    }
    text
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::models::{AttachmentSource, ProvenanceRole};
    use schema::{FieldType, SchemaField};
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key".to_string(), &server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn text_response(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5 }
        })
    }

    fn simple_request() -> GenerationRequest {
        GenerationRequest::generation(
            vec![Segment::text(ProvenanceRole::Instruction, "Redija a certidão.")],
            ModelTier::Fast,
        )
    }

    fn party_schema() -> ExtractionSchema {
        ExtractionSchema::new(vec![
            SchemaField::required("nome", FieldType::String),
            SchemaField::optional("cep", FieldType::String),
        ])
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_wrapping_quotes_removes_one_pair() {
        assert_eq!(strip_wrapping_quotes("\"Certifico que...\""), "Certifico que...");
        assert_eq!(strip_wrapping_quotes("  “Certifico”  "), "Certifico");
        assert_eq!(strip_wrapping_quotes("\"\"duplo\"\""), "\"duplo\"");
    }

    #[test]
    fn test_strip_wrapping_quotes_leaves_unmatched_text() {
        assert_eq!(strip_wrapping_quotes("\"aberto"), "\"aberto");
        assert_eq!(strip_wrapping_quotes("Disse \"sim\""), "Disse \"sim\"");
        assert_eq!(strip_wrapping_quotes("\""), "\"");
    }

    #[test]
    fn test_interpret_extraction_unwraps_fences() {
        let request = GenerationRequest::extraction(vec![], party_schema(), ModelTier::Fast);
        let output = interpret(&request, "```json\n{\"nome\": \"MARIA\"}\n```").unwrap();
        match output {
            GenerationOutput::Structured(fields) => assert_eq!(fields["nome"], "MARIA"),
            other => panic!("expected structured output, got {other:?}"),
        }
    }

    #[test]
    fn test_interpret_extraction_rejects_partial_data() {
        let request = GenerationRequest::extraction(vec![], party_schema(), ModelTier::Fast);
        let err = interpret(&request, "{\"cep\": \"01000000\"}").unwrap_err();
        assert_eq!(err.kind(), "MALFORMED_STRUCTURED_OUTPUT");
    }

    #[test]
    fn test_generation_result_view() {
        let ok: Result<GenerationOutput, GenerationError> =
            Ok(GenerationOutput::Text("texto".to_string()));
        let view = GenerationResult::from(&ok);
        assert_eq!(view.status, ResultStatus::Ok);
        assert_eq!(view.text.as_deref(), Some("texto"));
        assert!(view.structured.is_none());

        let failed: Result<GenerationOutput, GenerationError> = Err(GenerationError::EmptyResult);
        let view = GenerationResult::from(&failed);
        assert_eq!(view.status, ResultStatus::Failed);
        assert_eq!(view.error_kind, Some("EMPTY_RESULT"));
    }

    #[test]
    fn test_wire_request_shape_for_extraction() {
        let source = Arc::new(AttachmentSource {
            id: Uuid::new_v4(),
            provenance_role: ProvenanceRole::DataContent,
            ordinal: 0,
            file_name: "bo.pdf".to_string(),
            media_type: "application/pdf".to_string(),
            payload: "JVBERi0=".to_string(),
            size_bytes: 5,
        });
        let request = GenerationRequest::extraction(
            vec![
                Segment::Attachment(source),
                Segment::text(ProvenanceRole::Instruction, "Extraia."),
            ],
            party_schema(),
            ModelTier::Reasoning,
        )
        .with_system_prompt("Você é um assistente.");

        let wire = serde_json::to_value(build_wire_request(&request)).unwrap();
        let parts = &wire["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERi0=");
        assert_eq!(parts[1]["text"], "Extraia.");
        assert_eq!(wire["systemInstruction"]["parts"][0]["text"], "Você é um assistente.");
        let config = &wire["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["required"], json!(["nome"]));
        assert_eq!(config["thinkingConfig"]["thinkingBudget"], 2048);
    }

    #[test]
    fn test_wire_request_omits_config_for_fast_generation() {
        let wire = serde_json::to_value(build_wire_request(&simple_request())).unwrap();
        assert!(wire.get("generationConfig").is_none());
        assert!(wire.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn test_generate_returns_stripped_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-3-flash-preview:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Redija a certidão." }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("\"CERTIDÃO\"")))
            .expect(1)
            .mount(&server)
            .await;

        let output = client_for(&server).generate(&simple_request()).await.unwrap();
        assert_eq!(output, GenerationOutput::Text("CERTIDÃO".to_string()));
    }

    #[tokio::test]
    async fn test_generate_skips_thought_parts() {
        let server = MockServer::start().await;
        let body = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "pensando...", "thought": true },
                    { "text": "Resposta final" }
                ]},
                "finishReason": "STOP"
            }]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let output = client_for(&server).generate(&simple_request()).await.unwrap();
        assert_eq!(output.as_text(), Some("Resposta final"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&simple_request()).await.unwrap_err();
        assert_eq!(
            err,
            GenerationError::Service {
                status: 429,
                message: "Resource has been exhausted".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_safety_rejection_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&simple_request()).await.unwrap_err();
        assert_eq!(err.kind(), "SERVICE_ERROR");
    }

    #[tokio::test]
    async fn test_prompt_block_is_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&simple_request()).await.unwrap_err();
        assert_eq!(err.kind(), "SERVICE_ERROR");
    }

    #[tokio::test]
    async fn test_blank_answer_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("   \n")))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&simple_request()).await.unwrap_err();
        assert_eq!(err, GenerationError::EmptyResult);
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&simple_request()).await.unwrap_err();
        assert_eq!(err, GenerationError::EmptyResult);
    }

    #[tokio::test]
    async fn test_extraction_parses_structured_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response("{\"nome\": \"JOSÉ\", \"cep\": \"01310100\"}")),
            )
            .mount(&server)
            .await;

        let request = GenerationRequest::extraction(
            vec![Segment::text(ProvenanceRole::Instruction, "Extraia.")],
            party_schema(),
            ModelTier::Fast,
        );
        let output = client_for(&server).generate(&request).await.unwrap();
        match output {
            GenerationOutput::Structured(fields) => {
                assert_eq!(fields["nome"], "JOSÉ");
                assert_eq!(fields["cep"], "01310100");
            }
            other => panic!("expected structured output, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let client =
            GeminiClient::new("k".to_string(), "http://127.0.0.1:1", Duration::from_secs(2))
                .unwrap();
        let err = client.generate(&simple_request()).await.unwrap_err();
        assert_eq!(err.kind(), "NETWORK_ERROR");
    }
}
