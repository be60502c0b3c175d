use crate::ai::mock::MockBackend;
use crate::ai::AnalysisOutcome;
use crate::ai::Remediation;
use crate::config::AIBackendConfig;
use crate::error::AnalysisError;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
/// Default Gemini API base URL
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default OpenAI API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Per-request limit of the HTTP client itself
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_INSTRUCTION: &str = "You are an expert Site Reliability Engineer named Aegis. \
Your task is to analyze system log errors, identify the root cause, predict potential impacts, \
and suggest a concrete, actionable solution. Present your analysis in the specified JSON format. \
For suggestions, if a database connection fails, suggest retrying with backup credentials or \
checking firewall rules. If a parameter is null, suggest checking the calling service's payload. \
If a timeout occurs, suggest increasing the timeout configuration or checking the downstream \
service's health.";

const JSON_FORMAT_HINT: &str = "Respond only with a JSON object with fields: \
errorType (string), rootCause (string), impact (string), \
suggestion (object with description (string), actionLabel (string) and optional command (string)).";

/// Trait for external analyzer implementations
///
/// An analyzer consumes the message text of one fault candidate and resolves
/// to a structured outcome, or fails with a transport or format error.
pub trait AnalyzerBackend: Send + Sync {
    fn analyze<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisOutcome, AnalysisError>> + Send + 'a>>;

    /// Short name used in log output
    fn name(&self) -> &str;
}

/// Build the analyzer backend described by the configuration
///
/// API keys missing from the configuration are looked up in the environment
/// (`GEMINI_API_KEY` / `OPENAI_API_KEY`, then `API_KEY`).
pub fn from_config(config: &AIBackendConfig) -> Result<Arc<dyn AnalyzerBackend>, AnalysisError> {
    let backend: Arc<dyn AnalyzerBackend> = match config {
        AIBackendConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            let api_key = resolve_api_key(api_key.as_deref(), "GEMINI_API_KEY", "gemini")?;
            Arc::new(GeminiBackend::with_base_url(
                api_key,
                model.clone(),
                base_url.clone(),
            )?)
        }
        AIBackendConfig::OpenAI {
            api_key,
            model,
            base_url,
        } => {
            let api_key = resolve_api_key(api_key.as_deref(), "OPENAI_API_KEY", "openai")?;
            Arc::new(OpenAIBackend::with_base_url(
                api_key,
                model.clone(),
                base_url.clone(),
            )?)
        }
        AIBackendConfig::Ollama { endpoint, model } => {
            Arc::new(OllamaBackend::new(endpoint.clone(), model.clone())?)
        }
        AIBackendConfig::Mock => Arc::new(MockBackend::success()),
    };

    info!("Using {} analyzer backend", backend.name());
    Ok(backend)
}

fn resolve_api_key(
    configured: Option<&str>,
    env_var: &str,
    backend: &str,
) -> Result<String, AnalysisError> {
    configured
        .filter(|key| !key.trim().is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .or_else(|| std::env::var("API_KEY").ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| AnalysisError::MissingApiKey(backend.to_string()))
}

fn http_client() -> Result<Client, AnalysisError> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| AnalysisError::HttpError(format!("Failed to create HTTP client: {}", e)))
}

/// User prompt for one error message
pub fn analysis_prompt(message: &str) -> String {
    format!(
        "Analyze the following system log error and provide a root cause analysis and a concrete, actionable solution: \"{}\"",
        message
    )
}

/// Expected JSON structure from the analyzer
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisResponse {
    error_type: String,
    root_cause: String,
    impact: String,
    suggestion: SuggestionResponse,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionResponse {
    description: String,
    action_label: String,
    #[serde(default)]
    command: Option<String>,
}

impl AnalysisResponse {
    /// Validate required fields and convert to an outcome
    fn into_outcome(self) -> Result<AnalysisOutcome, AnalysisError> {
        let required = [
            ("errorType", &self.error_type),
            ("rootCause", &self.root_cause),
            ("impact", &self.impact),
            ("suggestion.description", &self.suggestion.description),
            ("suggestion.actionLabel", &self.suggestion.action_label),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AnalysisError::InvalidResponse(format!(
                "Required field '{}' is empty",
                field
            )));
        }

        // Analyzers sometimes send "" instead of omitting the command
        let command = self
            .suggestion
            .command
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(AnalysisOutcome::new(
            self.error_type,
            self.root_cause,
            self.impact,
            Remediation {
                description: self.suggestion.description,
                action_label: self.suggestion.action_label,
                command,
            },
        ))
    }
}

/// Extract JSON from analyzer response text
///
/// Models sometimes wrap JSON in markdown code blocks or add extra text.
/// This attempts to extract the JSON portion.
fn extract_json_from_response(response_text: &str) -> &str {
    let text = response_text.trim();

    if let Some(start) = text.find("```json") {
        let json_start = start + "```json".len();
        if let Some(len) = text[json_start..].find("```") {
            return text[json_start..json_start + len].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let json_start = start + 3;
        if let Some(len) = text[json_start..].find("```") {
            let candidate = text[json_start..json_start + len].trim();
            if candidate.starts_with('{') && candidate.ends_with('}') {
                return candidate;
            }
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }

    // No JSON structure found; parsing reports the error
    text
}

/// Parse raw analyzer text into an outcome
pub fn parse_analysis(response_text: &str) -> Result<AnalysisOutcome, AnalysisError> {
    let json_text = extract_json_from_response(response_text);
    let response: AnalysisResponse = serde_json::from_str(json_text).map_err(|e| {
        AnalysisError::InvalidResponse(format!(
            "Failed to parse analysis JSON: {}. Response was: {}",
            e, json_text
        ))
    })?;
    response.into_outcome()
}

/// Turn a non-success HTTP response into a backend error
async fn error_for_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AnalysisError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AnalysisError::BackendError(format!(
        "{} API returned error {}: {}",
        backend, status, error_text
    )))
}

/// Gemini backend for the Google Generative Language API
///
/// Requests structured JSON output through a response schema, so the model
/// reply maps directly onto an analysis outcome.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiContent,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend against the public endpoint
    ///
    /// # Arguments
    /// * `api_key` - Generative Language API key
    /// * `model` - Model name (e.g., "gemini-2.5-flash")
    pub fn new(api_key: String, model: String) -> Result<Self, AnalysisError> {
        Self::with_base_url(api_key, model, DEFAULT_GEMINI_BASE_URL.to_string())
    }

    /// Create a new Gemini backend with custom base URL
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url,
        })
    }

    /// Format the generateContent endpoint URL (without the key)
    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Schema the model reply must follow
    fn response_schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "errorType": {
                    "type": "STRING",
                    "description": "A concise classification of the error category (e.g., 'Database Connectivity', 'Invalid Parameter', 'Service Timeout')."
                },
                "rootCause": {
                    "type": "STRING",
                    "description": "A detailed but clear explanation of the most likely root cause of the error."
                },
                "impact": {
                    "type": "STRING",
                    "description": "A brief analysis of the potential impact on the system or users."
                },
                "suggestion": {
                    "type": "OBJECT",
                    "properties": {
                        "description": {
                            "type": "STRING",
                            "description": "A clear, actionable step-by-step fix suggestion."
                        },
                        "actionLabel": {
                            "type": "STRING",
                            "description": "A short label for the action button (e.g., 'Retry with Backup Credentials', 'Clear Cache')."
                        },
                        "command": {
                            "type": "STRING",
                            "description": "An optional example shell command to execute the fix."
                        }
                    },
                    "required": ["description", "actionLabel"]
                }
            },
            "required": ["errorType", "rootCause", "impact", "suggestion"]
        })
    }

    fn build_request(message: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: analysis_prompt(message),
                }],
            }],
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Self::response_schema(),
                temperature: 0.1,
            },
        }
    }

    /// Pull the reply text out of a generateContent response
    fn response_text(response: GeminiResponse) -> Result<String, AnalysisError> {
        if let Some(error) = response.error {
            return Err(AnalysisError::BackendError(format!(
                "Gemini error ({}): {}",
                error.status, error.message
            )));
        }

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| AnalysisError::InvalidResponse("No candidates in Gemini response".to_string()))?
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            return Err(AnalysisError::InvalidResponse(
                "Gemini response contained no text".to_string(),
            ));
        }
        Ok(text)
    }
}

impl AnalyzerBackend for GeminiBackend {
    fn analyze<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisOutcome, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = Self::build_request(message);

            let response = self
                .client
                .post(self.api_url())
                .query(&[("key", self.api_key.as_str())])
                .json(&request)
                .send()
                .await
                .map_err(|e| AnalysisError::HttpError(format!("HTTP request failed: {}", e)))?;
            let response = error_for_status("Gemini", response).await?;

            let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
            })?;

            let text = Self::response_text(gemini_response)?;
            debug!("Gemini reply: {}", text);
            parse_analysis(&text)
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// OpenAI backend for chat-completions compatible APIs
pub struct OpenAIBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    response_format: OpenAIResponseFormat,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

impl OpenAIBackend {
    pub fn new(api_key: String, model: String) -> Result<Self, AnalysisError> {
        Self::with_base_url(api_key, model, DEFAULT_OPENAI_BASE_URL.to_string())
    }

    /// Create a new OpenAI backend with custom base URL
    ///
    /// This allows using OpenAI-compatible APIs or custom endpoints.
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn system_prompt() -> String {
        format!("{} {}", SYSTEM_INSTRUCTION, JSON_FORMAT_HINT)
    }
}

impl AnalyzerBackend for OpenAIBackend {
    fn analyze<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisOutcome, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = OpenAIRequest {
                model: self.model.clone(),
                messages: vec![
                    OpenAIMessage {
                        role: "system".to_string(),
                        content: Self::system_prompt(),
                    },
                    OpenAIMessage {
                        role: "user".to_string(),
                        content: analysis_prompt(message),
                    },
                ],
                temperature: 0.1,
                response_format: OpenAIResponseFormat {
                    format_type: "json_object".to_string(),
                },
            };

            let response = self
                .client
                .post(self.api_url())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| AnalysisError::HttpError(format!("HTTP request failed: {}", e)))?;
            let response = error_for_status("OpenAI", response).await?;

            let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse OpenAI response: {}", e))
            })?;

            if let Some(error) = openai_response.error {
                return Err(AnalysisError::BackendError(format!(
                    "OpenAI API error ({}): {}",
                    error.error_type, error.message
                )));
            }

            let content = openai_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| {
                    AnalysisError::InvalidResponse("No choices in OpenAI response".to_string())
                })?;

            parse_analysis(&content)
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Ollama backend for local inference
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    system: String,
    prompt: String,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Arguments
    /// * `endpoint` - Ollama server URL (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "llama3")
    pub fn new(endpoint: String, model: String) -> Result<Self, AnalysisError> {
        Ok(Self {
            client: http_client()?,
            endpoint,
            model,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/api/generate", self.endpoint.trim_end_matches('/'))
    }
}

impl AnalyzerBackend for OllamaBackend {
    fn analyze<'a>(
        &'a self,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisOutcome, AnalysisError>> + Send + 'a>> {
        Box::pin(async move {
            let request = OllamaRequest {
                model: self.model.clone(),
                system: format!("{} {}", SYSTEM_INSTRUCTION, JSON_FORMAT_HINT),
                prompt: analysis_prompt(message),
                stream: false, // We want the complete response, not streaming
                format: "json".to_string(),
                options: OllamaOptions { temperature: 0.1 },
            };

            let response = self
                .client
                .post(self.api_url())
                .json(&request)
                .send()
                .await
                .map_err(|e| AnalysisError::HttpError(format!("HTTP request failed: {}", e)))?;
            let response = error_for_status("Ollama", response).await?;

            let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
                AnalysisError::InvalidResponse(format!("Failed to parse Ollama response: {}", e))
            })?;

            if let Some(error) = ollama_response.error {
                return Err(AnalysisError::BackendError(format!("Ollama error: {}", error)));
            }

            parse_analysis(&ollama_response.response)
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_REPLY: &str = r#"{
        "errorType": "Database Connectivity",
        "rootCause": "The configured credentials for 'prod_user' were rejected",
        "impact": "Requests that need the database fail",
        "suggestion": {
            "description": "Retry with backup credentials",
            "actionLabel": "Retry with Backup Credentials",
            "command": "kubectl rollout restart deploy/db-connector"
        }
    }"#;

    #[test]
    fn test_analysis_prompt_quotes_message() {
        let prompt = analysis_prompt("Database connection failed: invalid credentials");
        assert!(prompt.starts_with("Analyze the following system log error"));
        assert!(prompt.ends_with("\"Database connection failed: invalid credentials\""));
    }

    #[test]
    fn test_parse_analysis_valid() {
        let outcome = parse_analysis(VALID_REPLY).unwrap();
        assert_eq!(outcome.classification, "Database Connectivity");
        assert_eq!(outcome.impact, "Requests that need the database fail");
        assert_eq!(outcome.remediation.action_label, "Retry with Backup Credentials");
        assert_eq!(
            outcome.remediation.command.as_deref(),
            Some("kubectl rollout restart deploy/db-connector")
        );
    }

    #[test]
    fn test_parse_analysis_from_markdown() {
        let reply = format!("Here's the analysis:\n\n```json\n{}\n```\n\nDone.", VALID_REPLY);
        let outcome = parse_analysis(&reply).unwrap();
        assert_eq!(outcome.classification, "Database Connectivity");
    }

    #[test]
    fn test_parse_analysis_from_plain_code_block() {
        let reply = format!("Result:\n```\n{}\n```", VALID_REPLY);
        assert!(parse_analysis(&reply).is_ok());
    }

    #[test]
    fn test_parse_analysis_with_surrounding_text() {
        let reply = format!("The analysis shows: {} - end of analysis", VALID_REPLY);
        assert!(parse_analysis(&reply).is_ok());
    }

    #[test]
    fn test_missing_command_is_none() {
        let reply = r#"{"errorType":"Invalid Parameter","rootCause":"userId is null","impact":"Profile lookups fail",
            "suggestion":{"description":"Check the calling service's payload","actionLabel":"Inspect Payload"}}"#;
        let outcome = parse_analysis(reply).unwrap();
        assert!(outcome.remediation.command.is_none());
    }

    #[test]
    fn test_empty_command_is_none() {
        let reply = r#"{"errorType":"Service Timeout","rootCause":"payment-gateway slow","impact":"Checkouts fail",
            "suggestion":{"description":"Increase the timeout","actionLabel":"Raise Timeout","command":"  "}}"#;
        let outcome = parse_analysis(reply).unwrap();
        assert!(outcome.remediation.command.is_none());
    }

    #[test]
    fn test_missing_required_field_is_invalid() {
        let reply = r#"{"errorType":"Service Timeout","rootCause":"slow",
            "suggestion":{"description":"Increase the timeout","actionLabel":"Raise Timeout"}}"#;
        match parse_analysis(reply) {
            Err(AnalysisError::InvalidResponse(msg)) => assert!(msg.contains("impact")),
            other => panic!("Expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_required_field_is_invalid() {
        let reply = r#"{"errorType":"","rootCause":"slow","impact":"bad",
            "suggestion":{"description":"Increase the timeout","actionLabel":"Raise Timeout"}}"#;
        match parse_analysis(reply) {
            Err(AnalysisError::InvalidResponse(msg)) => assert!(msg.contains("errorType")),
            other => panic!("Expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_not_json_is_invalid() {
        assert!(matches!(
            parse_analysis("I could not analyze that."),
            Err(AnalysisError::InvalidResponse(_))
        ));
        assert!(matches!(parse_analysis(""), Err(AnalysisError::InvalidResponse(_))));
    }

    #[test]
    fn test_gemini_api_url_formatting() {
        let backend = GeminiBackend::with_base_url(
            "key".to_string(),
            "gemini-2.5-flash".to_string(),
            "https://generativelanguage.googleapis.com/v1beta/".to_string(),
        )
        .unwrap();
        assert_eq!(
            backend.api_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_gemini_request_serialization() {
        let request = GeminiBackend::build_request("Timeout connecting to service");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert!(value["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Timeout connecting to service"));
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            value["generationConfig"]["responseSchema"]["required"],
            json!(["errorType", "rootCause", "impact", "suggestion"])
        );
    }

    #[test]
    fn test_gemini_response_text_extraction() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": VALID_REPLY}]},
                "finishReason": "STOP"
            }]
        });
        let response: GeminiResponse = serde_json::from_value(body).unwrap();
        let text = GeminiBackend::response_text(response).unwrap();
        assert!(parse_analysis(&text).is_ok());
    }

    #[test]
    fn test_gemini_response_without_candidates() {
        let response: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(
            GeminiBackend::response_text(response),
            Err(AnalysisError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_gemini_error_body() {
        let body = json!({"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}});
        let response: GeminiResponse = serde_json::from_value(body).unwrap();
        match GeminiBackend::response_text(response) {
            Err(AnalysisError::BackendError(msg)) => {
                assert!(msg.contains("INVALID_ARGUMENT"));
                assert!(msg.contains("API key not valid"));
            }
            other => panic!("Expected BackendError, got {:?}", other),
        }
    }

    #[test]
    fn test_openai_backend_urls() {
        let backend = OpenAIBackend::new("sk-test".to_string(), "gpt-4o-mini".to_string()).unwrap();
        assert_eq!(backend.api_url(), "https://api.openai.com/v1/chat/completions");

        let custom = OpenAIBackend::with_base_url(
            "sk-test".to_string(),
            "gpt-4o-mini".to_string(),
            "https://custom-api.example.com/v1/".to_string(),
        )
        .unwrap();
        assert_eq!(
            custom.api_url(),
            "https://custom-api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_openai_system_prompt_describes_format() {
        let prompt = OpenAIBackend::system_prompt();
        assert!(prompt.contains("Site Reliability Engineer"));
        assert!(prompt.contains("errorType"));
        assert!(prompt.contains("actionLabel"));
    }

    #[test]
    fn test_ollama_api_url_formatting() {
        let with_slash =
            OllamaBackend::new("http://localhost:11434/".to_string(), "llama3".to_string()).unwrap();
        assert_eq!(with_slash.api_url(), "http://localhost:11434/api/generate");
        assert_eq!(with_slash.name(), "ollama");
    }

    #[test]
    fn test_resolve_api_key_prefers_configured() {
        let key = resolve_api_key(Some("configured-key"), "AEGIS_TEST_UNSET_VAR", "gemini").unwrap();
        assert_eq!(key, "configured-key");
    }

    #[test]
    fn test_resolve_api_key_falls_back_to_env() {
        std::env::set_var("AEGIS_TEST_GEMINI_KEY_FALLBACK", "env-key");

        let missing = resolve_api_key(None, "AEGIS_TEST_GEMINI_KEY_FALLBACK", "gemini").unwrap();
        assert_eq!(missing, "env-key");

        // Blank configured keys count as absent
        let blank =
            resolve_api_key(Some("  "), "AEGIS_TEST_GEMINI_KEY_FALLBACK", "gemini").unwrap();
        assert_eq!(blank, "env-key");

        std::env::remove_var("AEGIS_TEST_GEMINI_KEY_FALLBACK");
    }

    #[test]
    fn test_from_config_mock() {
        let backend = from_config(&AIBackendConfig::Mock).unwrap();
        assert_eq!(backend.name(), "mock");
    }

    #[test]
    fn test_from_config_ollama() {
        let backend = from_config(&AIBackendConfig::Ollama {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
        })
        .unwrap();
        assert_eq!(backend.name(), "ollama");
    }

    #[tokio::test]
    #[ignore = "Requires a valid GEMINI_API_KEY and network access"]
    async fn test_gemini_backend_integration() {
        let backend = from_config(&AIBackendConfig::Gemini {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        })
        .unwrap();

        match backend
            .analyze("Database connection failed: invalid credentials for user 'prod_user'")
            .await
        {
            Ok(outcome) => assert!(!outcome.classification.is_empty()),
            Err(e) => println!("Expected error without credentials: {:?}", e),
        }
    }
}

// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// Helper to generate well-formed analyzer replies
    #[derive(Debug, Clone)]
    struct ValidReply {
        error_type: String,
        root_cause: String,
        impact: String,
        description: String,
        action_label: String,
        command: Option<String>,
    }

    impl Arbitrary for ValidReply {
        fn arbitrary(g: &mut Gen) -> Self {
            let categories = ["Database Connectivity", "Invalid Parameter", "Service Timeout"];
            Self {
                error_type: g.choose(&categories).unwrap().to_string(),
                root_cause: format!("Root cause {}", u32::arbitrary(g)),
                impact: format!("Impact {}", u32::arbitrary(g)),
                description: format!("Fix step {}", u16::arbitrary(g)),
                action_label: format!("Action {}", u8::arbitrary(g)),
                command: if bool::arbitrary(g) {
                    Some(format!("restart-service --id {}", u16::arbitrary(g)))
                } else {
                    None
                },
            }
        }
    }

    impl ValidReply {
        fn to_json(&self) -> String {
            serde_json::to_string(&AnalysisResponse {
                error_type: self.error_type.clone(),
                root_cause: self.root_cause.clone(),
                impact: self.impact.clone(),
                suggestion: SuggestionResponse {
                    description: self.description.clone(),
                    action_label: self.action_label.clone(),
                    command: self.command.clone(),
                },
            })
            .unwrap()
        }

        fn matches(&self, outcome: &AnalysisOutcome) -> bool {
            outcome.classification == self.error_type
                && outcome.root_cause == self.root_cause
                && outcome.impact == self.impact
                && outcome.remediation.description == self.description
                && outcome.remediation.action_label == self.action_label
                && outcome.remediation.command == self.command
        }
    }

    #[quickcheck]
    fn prop_reply_fields_preserved(reply: ValidReply) -> bool {
        parse_analysis(&reply.to_json())
            .map(|outcome| reply.matches(&outcome))
            .unwrap_or(false)
    }

    #[quickcheck]
    fn prop_reply_extracted_from_markdown(reply: ValidReply) -> bool {
        let wrapped = format!(
            "Here's the analysis:\n\n```json\n{}\n```\n\nThat's my assessment.",
            reply.to_json()
        );
        parse_analysis(&wrapped)
            .map(|outcome| reply.matches(&outcome))
            .unwrap_or(false)
    }

    #[quickcheck]
    fn prop_arbitrary_text_never_panics(text: String) -> bool {
        // Either parses or reports InvalidResponse; never another variant
        match parse_analysis(&text) {
            Ok(_) => true,
            Err(AnalysisError::InvalidResponse(_)) => true,
            Err(_) => false,
        }
    }
}
