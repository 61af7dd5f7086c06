use crate::llm::client::{LLMClient, TokenStream};
use crate::types::{AppError, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    models::ModelOptions,
};

pub struct OllamaClient {
    client: Ollama,
    model: String,
    temperature: Option<f32>,
}

impl OllamaClient {
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let (host, port) = split_base_url(&base_url)?;
        let client = Ollama::new(host, port);

        Ok(Self {
            client,
            model,
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatMessageRequest {
        let request = ChatMessageRequest::new(self.model.clone(), messages);
        match self.temperature {
            Some(temperature) => request.options(ModelOptions::default().temperature(temperature)),
            None => request,
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = self.request(messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    async fn chat_stream(&self, messages: Vec<ChatMessage>) -> Result<TokenStream> {
        let request = self.request(messages);

        let mut stream_response = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama stream error: {}", e)))?;

        let output_stream = stream! {
            while let Some(chunk_result) = stream_response.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let content = chunk.message.content;
                        if !content.is_empty() {
                            yield Ok(content);
                        }
                    }
                    Err(_) => {
                        yield Err(AppError::LLM("Stream chunk error".to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(output_stream)))
    }
}

/// Split `scheme://host:port` into the `(scheme://host, port)` pair Ollama expects.
fn split_base_url(base_url: &str) -> Result<(String, u16)> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| AppError::Config(format!("Invalid Ollama URL '{}': {}", base_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Config(format!("Ollama URL '{}' has no host", base_url)))?;
    let port = url.port().unwrap_or(11434);

    Ok((format!("{}://{}", url.scheme(), host), port))
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ])
        .await
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TokenStream> {
        self.chat_stream(vec![
            ChatMessage::system(system.to_string()),
            ChatMessage::user(prompt.to_string()),
        ])
        .await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
