//! OpenAI-compatible `/chat/completions` adapter with streamed deltas.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Agent, AgentReply, TurnContext};
use crate::error::AgentError;
use crate::prompts::DebatePrompts;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChatChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChunkChoice {
    delta: ChatDelta,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct ChatCompletionAgent {
    name: String,
    client: reqwest::Client,
    config: ChatCompletionConfig,
}

impl ChatCompletionAgent {
    pub fn new(name: impl Into<String>, config: ChatCompletionConfig) -> Self {
        Self::with_client(name, config, reqwest::Client::new())
    }

    pub fn with_client(
        name: impl Into<String>,
        config: ChatCompletionConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            config: ChatCompletionConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        }
    }

    fn request(&self, ctx: &TurnContext) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: DebatePrompts::system(ctx),
                },
                ChatMessage {
                    role: "user",
                    content: DebatePrompts::user(ctx),
                },
            ],
            temperature: ctx.settings.temperature,
            max_tokens: DebatePrompts::max_tokens(ctx.settings.brevity),
            stream: true,
        }
    }
}

#[async_trait]
impl Agent for ChatCompletionAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        ctx: &TurnContext,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, AgentError> {
        debug!(
            agent = %self.name,
            model = %self.config.model,
            phase = %ctx.phase,
            speaker = %ctx.speaker,
            "Requesting streaming chat completion"
        );

        let send = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&self.request(ctx))
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AgentError::request(message, Some(status.as_u16())));
        }

        let tokens = response
            .bytes_stream()
            .map(|chunk: Result<bytes::Bytes, reqwest::Error>| chunk.map_err(std::io::Error::other))
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) if event.data == "[DONE]" => None,
                    Ok(event) => match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                        Ok(chunk) => chunk
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.delta.content)
                            .filter(|content| !content.is_empty())
                            .map(Ok),
                        Err(e) => {
                            warn!("Failed to parse completion chunk: {}", e);
                            None
                        }
                    },
                    Err(e) => Some(Err(AgentError::Stream(e.to_string()))),
                }
            });

        Ok(AgentReply::Stream(Box::pin(tokens)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Turn;
    use debate_core::{DebatePhase, Session, SessionConfig, SessionOption, SpeakerRole, TurnKind};

    #[test]
    fn test_request_shape() {
        let agent = ChatCompletionAgent::new(
            "pro",
            ChatCompletionConfig {
                base_url: "https://api.example.com/v1/".to_string(),
                model: "debate-model".to_string(),
                api_key: "secret".to_string(),
            },
        );
        let session = Session::new(
            SessionConfig::new("Tax sugar").with_option(SessionOption::Temperature(0.2)),
        );
        let ctx = TurnContext::build(
            &session,
            &Turn {
                phase: DebatePhase::Opening,
                speaker: SpeakerRole::PRO,
                kind: TurnKind::Statement,
                focus: None,
            },
            &[],
        );

        let request = serde_json::to_value(agent.request(&ctx)).unwrap();
        assert_eq!(agent.config.base_url, "https://api.example.com/v1");
        assert_eq!(request["model"], "debate-model");
        assert_eq!(request["stream"], true);
        assert_eq!(request["messages"][0]["role"], "system");
        assert!(request["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("Tax sugar"));
        assert!((request["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = ChatCompletionConfig {
            base_url: "http://localhost".to_string(),
            model: "m".to_string(),
            api_key: "secret".to_string(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_parse_chunk() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hi"));
    }
}
