use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{JobError, JobResult};
use crate::translate::Translator;

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Client for the public Google translate web endpoint. No retry/backoff:
/// a failed call fails the chunk, and the job runner decides what that
/// means for the file.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(endpoint: String) -> Self {
        let mut translator = Self::new();
        translator.endpoint = endpoint;
        translator
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source: Option<&str>, target: &str) -> JobResult<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source.unwrap_or("auto")),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(JobError::Provider(format!(
                "translation endpoint returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let segments = body
            .get(0)
            .and_then(Value::as_array)
            .ok_or_else(|| JobError::Provider("unexpected response shape".to_string()))?;

        // The endpoint returns one [translated, original, ...] entry per
        // source sentence; concatenating them yields the full text.
        let mut translated = String::new();
        for segment in segments {
            if let Some(part) = segment.get(0).and_then(Value::as_str) {
                translated.push_str(part);
            }
        }

        if translated.is_empty() && !text.trim().is_empty() {
            return Err(JobError::Provider("empty translation result".to_string()));
        }
        Ok(translated)
    }

    fn name(&self) -> &str {
        "google-web"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_concatenation_shape() {
        // Shape check against a captured response body.
        let body: Value = serde_json::from_str(
            r#"[[["안녕하세요 ","hello ",null,null,10],["세계","world",null,null,10]],null,"en"]"#,
        )
        .unwrap();
        let segments = body.get(0).and_then(Value::as_array).unwrap();
        let mut translated = String::new();
        for segment in segments {
            if let Some(part) = segment.get(0).and_then(Value::as_str) {
                translated.push_str(part);
            }
        }
        assert_eq!(translated, "안녕하세요 세계");
    }
}
