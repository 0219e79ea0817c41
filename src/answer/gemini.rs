// src/answer/gemini.rs — Google Generative AI (Gemini) answer generator

use async_trait::async_trait;
use std::time::Duration;

use super::AnswerGenerator;
use crate::infra::errors::SurveyorError;

pub struct GeminiGenerator {
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            api_key,
            model,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn base_url(&self) -> &str {
        "https://generativelanguage.googleapis.com/v1beta"
    }

    /// Build the generateContent request body. The assembled context goes in
    /// as the system instruction; the question is the single user turn.
    fn build_request_body(&self, question: &str, context: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": question }],
            }],
            "system_instruction": {
                "parts": [{ "text": context }],
            },
        })
    }
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn synthesize(&self, question: &str, context: &str) -> Result<String, SurveyorError> {
        let body = self.build_request_body(question, context);

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url(),
            self.model,
            self.api_key,
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SurveyorError::Generation {
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SurveyorError::RateLimited {
                provider: "gemini".into(),
                retry_after_ms: 5000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SurveyorError::Generation {
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| SurveyorError::Generation {
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        extract_text(&resp)
    }
}

/// Extract text content from candidates[0].content.parts.
fn extract_text(resp: &serde_json::Value) -> Result<String, SurveyorError> {
    let parts = resp["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut content = String::new();
    for part in &parts {
        if let Some(text) = part["text"].as_str() {
            content.push_str(text);
        }
    }

    if content.is_empty() {
        return Err(SurveyorError::Generation {
            message: "Response contained no text parts".into(),
            retriable: false,
        });
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_body() {
        let generator = GeminiGenerator::new(
            "key".into(),
            "gemini-2.0-flash".into(),
            Duration::from_secs(30),
        );
        let body = generator.build_request_body("What changed?", "CONTEXT");

        assert_eq!(body["contents"][0]["parts"][0]["text"], "What changed?");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "CONTEXT");
    }

    #[test]
    fn test_extract_text_concatenates_parts() {
        let resp = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
            }]
        });
        assert_eq!(extract_text(&resp).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_text_empty_response_fails() {
        let resp = serde_json::json!({ "candidates": [] });
        assert!(extract_text(&resp).is_err());
    }
}
