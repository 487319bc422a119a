use anyhow::{Context as _, Result, anyhow};
use reqwest::Client as Http;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Conversation role in the Gemini content format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One entry of a conversation, as the Gemini API (and our history log)
/// represents it: a role plus a list of text parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![Part { text: text.into() }] }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, parts: vec![Part { text: text.into() }] }
    }

    /// Text of the first part, empty if the entry has no parts.
    pub fn text(&self) -> &str {
        self.parts.first().map(|p| p.text.as_str()).unwrap_or("")
    }
}

/// Constructor-injected configuration; the client never reads the process
/// environment itself.
#[derive(Clone, Debug)]
pub struct GenAiConfig {
    pub api_key: String,
    pub model: String,
    /// Override for tests or proxies; defaults to the public endpoint.
    pub base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Client {
    http: Http,
    api_key: String,
    model: String,
    base_url: String,
}

impl Client {
    pub fn new(config: GenAiConfig) -> Result<Self> {
        Ok(Self {
            http: Http::builder().pool_max_idle_per_host(8).build()?,
            api_key: config.api_key,
            model: config.model,
            base_url: config.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One-shot completion with no conversational context.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.request(&[Content::user(prompt)]).await
    }

    /// Completion seeded with prior history; `message` becomes the final
    /// user turn.
    pub async fn chat(&self, history: &[Content], message: &str) -> Result<String> {
        let mut contents = history.to_vec();
        contents.push(Content::user(message));
        self.request(&contents).await
    }

    async fn request(&self, contents: &[Content]) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({ "contents": contents });

        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("request failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!(
                "gemini {}: {}",
                resp.status(),
                resp.text().await.unwrap_or_default()
            ));
        }

        let v: Value = resp.json().await.context("invalid json")?;
        let text = v
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|x| x.as_str())
            .ok_or_else(|| anyhow!("missing candidates[0].content.parts[0].text"))?;
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let entry = Content::model("hi");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["role"], "model");
        assert_eq!(json["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_content_round_trip() {
        let entry = Content::user("what is rust?");
        let encoded = serde_json::to_string(&entry).unwrap();
        let decoded: Content = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_text_of_empty_parts() {
        let entry = Content { role: Role::User, parts: vec![] };
        assert_eq!(entry.text(), "");
    }
}
