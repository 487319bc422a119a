use anyhow::Result;
use async_trait::async_trait;
use genai::Content;

/// Port over the generative model: one-shot generation and chat seeded with
/// prior history. Both may fail on network, quota, or an unusable reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
    async fn chat_with_history(&self, history: &[Content], message: &str) -> Result<String>;
}

/// Production implementation backed by the Gemini REST client.
pub struct GeminiModel {
    client: genai::Client,
}

impl GeminiModel {
    pub fn new(client: genai::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(prompt).await
    }

    async fn chat_with_history(&self, history: &[Content], message: &str) -> Result<String> {
        self.client.chat(history, message).await
    }
}
