use std::time::Duration;

use serde_json::{json, Value};
use sidekick_core::{SidekickConfig, Verdict};

use crate::request::AdviceRequest;
use crate::verdict::extract_verdict;
use crate::AdviseError;

/// The reasoning service, seen as an opaque oracle.
///
/// Implementations block; async callers run them on a blocking thread.
pub trait Advisor: Send + Sync {
    fn advise(&self, request: &AdviceRequest) -> Result<Verdict, AdviseError>;
}

/// Chat-completions client over HTTP.
pub struct OpenAiAdvisor {
    url: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl OpenAiAdvisor {
    pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(cfg: &SidekickConfig) -> Self {
        Self {
            url: cfg.api_url.clone(),
            model: cfg.model.clone(),
            api_key_env: cfg.api_key_env.clone(),
            api_key: cfg.api_key(),
            timeout: Duration::from_secs(cfg.request_timeout_secs),
        }
    }

    /// Request body. Reasoning models take a completion budget and effort
    /// level instead of a sampling temperature.
    pub fn request_body(&self, request: &AdviceRequest) -> Value {
        let messages = json!([
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.user_payload()},
        ]);
        if self.model.contains("gpt-5") {
            json!({
                "model": self.model,
                "messages": messages,
                "max_completion_tokens": 10000,
                "reasoning_effort": "high",
            })
        } else {
            json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0.2,
            })
        }
    }
}

impl Advisor for OpenAiAdvisor {
    fn advise(&self, request: &AdviceRequest) -> Result<Verdict, AdviseError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdviseError::MissingCredential(self.api_key_env.clone()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .new_agent();
        let body = self.request_body(request).to_string();

        let started = std::time::Instant::now();
        let mut response = agent
            .post(&self.url)
            .header("Authorization", &format!("Bearer {key}"))
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(classify_transport)?;
        let raw = response
            .body_mut()
            .read_to_string()
            .map_err(classify_transport)?;
        tracing::debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = raw.len(),
            "advisor replied"
        );

        let content = reply_content(&raw)?;
        extract_verdict(&content)
    }
}

fn classify_transport(e: ureq::Error) -> AdviseError {
    match e {
        ureq::Error::StatusCode(code) => AdviseError::Status(code),
        ureq::Error::Timeout(_) => AdviseError::Timeout,
        other => AdviseError::Transport(other.to_string()),
    }
}

/// The assistant message text of a chat-completions response.
pub fn reply_content(raw: &str) -> Result<String, AdviseError> {
    let v: Value = serde_json::from_str(raw)
        .map_err(|e| AdviseError::Malformed(format!("response is not JSON: {e}")))?;
    let content = v
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or("");
    if content.trim().is_empty() {
        return Err(AdviseError::EmptyReply);
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AdviceRequest {
        AdviceRequest::new("policy".into(), "{}".into(), "ctx".into())
    }

    #[test]
    fn missing_key_fails_without_network() {
        let advisor = OpenAiAdvisor::new("http://127.0.0.1:9", "gpt-5", None, Duration::from_secs(1));
        let err = advisor.advise(&request()).unwrap_err();
        assert!(matches!(err, AdviseError::MissingCredential(ref v) if v == "OPENAI_API_KEY"));
    }

    #[test]
    fn reasoning_model_body() {
        let advisor = OpenAiAdvisor::new("u", "gpt-5-mini", None, Duration::from_secs(1));
        let body = advisor.request_body(&request());
        assert_eq!(body["max_completion_tokens"], 10000);
        assert_eq!(body["reasoning_effort"], "high");
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], request().user_payload());
    }

    #[test]
    fn sampling_model_body() {
        let advisor = OpenAiAdvisor::new("u", "gpt-4o", None, Duration::from_secs(1));
        let body = advisor.request_body(&request());
        assert_eq!(body["temperature"], 0.2);
        assert!(body.get("reasoning_effort").is_none());
    }

    #[test]
    fn reply_content_extraction() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"score\":0}"}}]}"#;
        assert_eq!(reply_content(raw).unwrap(), "{\"score\":0}");
        assert!(matches!(
            reply_content(r#"{"choices":[{"message":{"content":""}}]}"#),
            Err(AdviseError::EmptyReply)
        ));
        assert!(matches!(reply_content(r#"{"choices":[]}"#), Err(AdviseError::EmptyReply)));
        assert!(matches!(reply_content("<html>"), Err(AdviseError::Malformed(_))));
    }

    #[test]
    fn unreachable_service_is_transport_error() {
        // Port 9 (discard) is closed on test machines; connection is refused.
        let advisor = OpenAiAdvisor::new(
            "http://127.0.0.1:9/v1/chat/completions",
            "gpt-4o",
            Some("k".into()),
            Duration::from_secs(2),
        );
        let err = advisor.advise(&request()).unwrap_err();
        assert!(matches!(err, AdviseError::Transport(_) | AdviseError::Timeout));
    }
}
