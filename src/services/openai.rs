//! Клиент OpenAI Chat Completions для генерации текста истории.

use std::time::Duration;

use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::services::{TextGenerator, TextRequest};

// Chat message structure for OpenAI API
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenAiChatClient {
    async fn generate(&self, request: &TextRequest) -> AppResult<String> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "OpenAI API key is required for text generation".to_string(),
            ));
        }

        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: Some(request.persona_text.clone()),
                },
                Message {
                    role: "user".to_string(),
                    content: Some(request.prompt.clone()),
                },
            ],
            max_tokens: request.max_tokens,
        };

        info!("Запрос текста у модели {}", request.model);
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!("OpenAI API response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI API error: HTTP {}, body: {}", status, error_text);
            return Err(AppError::Service(format!("OpenAI API error {}: {}", status, error_text)));
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        info!("Получено {} символов текста", content.chars().count());
        Ok(content)
    }
}
