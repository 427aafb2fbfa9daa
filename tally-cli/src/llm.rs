use anyhow::{anyhow, bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use tally_classify::{ClassifyError, TextGenerator};

use crate::auth;
use crate::config::LlmSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Groq, OpenAI and anything else speaking /v1/chat/completions
    OpenAiCompatible,
    Anthropic,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "groq" | "openai" | "openai-compatible" => Ok(Provider::OpenAiCompatible),
            "anthropic" => Ok(Provider::Anthropic),
            other => bail!("unknown llm provider {other:?} (expected groq, openai or anthropic)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub api_key: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_section(section: &LlmSection) -> Result<Self> {
        let api_key = auth::resolve_api_key(&section.api_key_env)?.ok_or_else(|| {
            anyhow!(
                "nenhuma chave de API: defina {} ou rode: tally auth paste-api-key",
                section.api_key_env
            )
        })?;
        Ok(Self {
            provider: Provider::parse(&section.provider)?,
            model: section.model.clone(),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            temperature: section.temperature,
            api_key,
            timeout: Duration::from_secs(section.timeout_secs),
        })
    }
}

/// Single-prompt completion used as the classification capability.
pub struct ChatGenerator {
    config: LlmConfig,
    client: reqwest::Client,
}

impl ChatGenerator {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { config, client })
    }
}

impl TextGenerator for ChatGenerator {
    fn generate(&mut self, prompt: &str) -> Result<String, ClassifyError> {
        complete(&self.client, &self.config, prompt)
            .map_err(|e| ClassifyError::Request(format!("{e:#}")))
    }
}

/// Blocking wrapper: one request at a time, waits for the reply.
pub fn complete(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    // `main` runs under #[tokio::main], so there is usually a runtime already;
    // a nested block_on would panic.
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        tokio::task::block_in_place(|| handle.block_on(complete_async(client, config, prompt)))
    } else {
        let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
        rt.block_on(complete_async(client, config, prompt))
    }
}

async fn complete_async(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    match config.provider {
        Provider::OpenAiCompatible => openai_complete(client, config, prompt).await,
        Provider::Anthropic => anthropic_complete(client, config, prompt).await,
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

async fn openai_complete(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    #[derive(Serialize)]
    struct Req<'a> {
        model: &'a str,
        messages: Vec<Msg<'a>>,
        temperature: f32,
    }

    #[derive(Deserialize)]
    struct Resp {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: MsgOut,
    }

    #[derive(Deserialize)]
    struct MsgOut {
        content: Option<String>,
    }

    let body = Req {
        model: &config.model,
        messages: vec![Msg {
            role: "user",
            content: prompt,
        }],
        temperature: config.temperature,
    };

    let resp = client
        .post(format!("{}/v1/chat/completions", config.base_url))
        .header(AUTHORIZATION, format!("Bearer {}", config.api_key))
        .json(&body)
        .send()
        .await
        .context("chat completion request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("chat completion error: {status} {txt}");
    }

    let out: Resp = resp.json().await.context("parse chat completion response")?;
    let content = out
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default();

    Ok(content.trim().to_string())
}

async fn anthropic_complete(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    #[derive(Serialize)]
    struct Req<'a> {
        model: &'a str,
        max_tokens: i32,
        temperature: f32,
        messages: Vec<Msg<'a>>,
    }

    #[derive(Deserialize)]
    struct Resp {
        content: Vec<ContentBlock>,
    }

    #[derive(Deserialize)]
    struct ContentBlock {
        #[serde(rename = "type")]
        t: String,
        text: Option<String>,
    }

    let body = Req {
        model: &config.model,
        max_tokens: 20,
        temperature: config.temperature,
        messages: vec![Msg {
            role: "user",
            content: prompt,
        }],
    };

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_str(&config.api_key)?);
    headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let resp = client
        .post(format!("{}/v1/messages", config.base_url))
        .headers(headers)
        .json(&body)
        .send()
        .await
        .context("anthropic request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("anthropic error: {status} {txt}");
    }

    let out: Resp = resp.json().await.context("parse anthropic response")?;
    let mut s = String::new();
    for b in out.content {
        if b.t == "text" {
            if let Some(t) = b.text {
                s.push_str(&t);
            }
        }
    }
    Ok(s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!(Provider::parse("groq").unwrap(), Provider::OpenAiCompatible);
        assert_eq!(Provider::parse("OpenAI").unwrap(), Provider::OpenAiCompatible);
        assert_eq!(Provider::parse("anthropic").unwrap(), Provider::Anthropic);
        assert!(Provider::parse("ollama").is_err());
    }

    #[test]
    fn test_config_from_section_uses_env_key() {
        let section = LlmSection {
            api_key_env: "TALLY_TEST_LLM_KEY".to_string(),
            base_url: "https://api.groq.com/openai/".to_string(),
            ..LlmSection::default()
        };
        // SAFETY: only this test touches this variable.
        unsafe { std::env::set_var("TALLY_TEST_LLM_KEY", "gsk_test") };
        let cfg = LlmConfig::from_section(&section).unwrap();
        unsafe { std::env::remove_var("TALLY_TEST_LLM_KEY") };

        assert_eq!(cfg.api_key, "gsk_test");
        assert_eq!(cfg.base_url, "https://api.groq.com/openai");
        assert_eq!(cfg.provider, Provider::OpenAiCompatible);
        assert_eq!(cfg.timeout, Duration::from_secs(60));
    }
}
