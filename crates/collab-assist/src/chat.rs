//! OpenAI-compatible chat-completions backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AssistError, DiagramGenerator};

const SYSTEM_PROMPT: &str = "You are an assistant that outputs only valid PlantUML code.";

/// Configuration for the chat-completions backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// API key; the assistant runs fallback-only without one.
    pub api_key: Option<String>,
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "chatgpt-4o-latest".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by a chat-completions endpoint.
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
}

impl ChatCompletionsGenerator {
    /// Build a generator, or `None` if no API key is configured.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &DiagramConfig) -> Result<Option<Self>, AssistError> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            api_key,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        }))
    }
}

fn build_prompt(selected_text: &str) -> String {
    format!(
        "Given the following text, create a valid PlantUML diagram snippet \
         (with @startuml and @enduml) that best represents it:\n\n-----\n{selected_text}\n-----\n\n\
         Output only PlantUML code."
    )
}

#[async_trait]
impl DiagramGenerator for ChatCompletionsGenerator {
    async fn generate(&self, selected_text: &str) -> Result<String, AssistError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(selected_text)},
            ],
        });

        tracing::debug!(model = %self.model, chars = selected_text.len(), "Requesting diagram");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssistError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AssistError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    use super::*;

    fn config(server: &MockServer) -> DiagramConfig {
        DiagramConfig {
            api_key: Some("test-key".into()),
            base_url: server.uri(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_key_means_no_backend() {
        assert!(ChatCompletionsGenerator::from_config(&DiagramConfig::default())
            .unwrap()
            .is_none());

        let empty = DiagramConfig {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(ChatCompletionsGenerator::from_config(&empty).unwrap().is_none());
    }

    #[test]
    fn test_prompt_embeds_selection() {
        let prompt = build_prompt("Users place orders");
        assert!(prompt.contains("-----\nUsers place orders\n-----"));
        assert!(prompt.contains("@startuml"));
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "@startuml\nA -> B\n@enduml"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = ChatCompletionsGenerator::from_config(&config(&server))
            .unwrap()
            .unwrap();
        let code = generator.generate("A talks to B").await.unwrap();
        assert_eq!(code, "@startuml\nA -> B\n@enduml");
    }

    #[tokio::test]
    async fn test_generate_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let generator = ChatCompletionsGenerator::from_config(&config(&server))
            .unwrap()
            .unwrap();
        let err = generator.generate("A talks to B").await.unwrap_err();
        assert!(matches!(err, AssistError::Api { status: 401, .. }));
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn test_generate_without_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let generator = ChatCompletionsGenerator::from_config(&config(&server))
            .unwrap()
            .unwrap();
        let err = generator.generate("A talks to B").await.unwrap_err();
        assert!(matches!(err, AssistError::EmptyResponse));
    }
}
