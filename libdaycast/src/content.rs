//! Content generation via an OpenAI-compatible chat-completion API
//!
//! A fixed set of topic templates steers the model toward brand-relevant
//! posts. Generated text is normalized and cut to the platform length limit
//! before it reaches the publisher.

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{ContentConfig, LlmConfig};
use crate::error::{BotError, GenerationError, Result};
use crate::types::{GeneratedPost, PostTemplate};

const SYSTEM_PROMPT: &str = "You are writing article-style social media content \
for a confidential-computing brand. Write short articles with a clear opening, \
body, and conclusion, separated by double line breaks. Mention the brand handle \
exactly once per article. Be educational and engaging; no titles or headings.";

/// Sentence boundaries closer to the start than this are ignored when
/// truncating, to avoid degenerate one-line posts.
const MIN_SENTENCE_CUT: usize = 50;

/// Seam between the scheduler and whatever produces post text
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Generate post text, randomly picking a template when no topic is given
    async fn generate(&self, topic: Option<&str>) -> Result<GeneratedPost>;

    /// Normalize whitespace and apply the platform length cut
    fn normalize(&self, text: &str) -> String;

    /// Topic tags available for targeted generation
    fn topics(&self) -> Vec<String>;
}

/// Chat-completion backed content generator
pub struct ContentGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
    max_chars: usize,
    high_limit: bool,
    templates: Vec<PostTemplate>,
}

impl ContentGenerator {
    pub fn new(
        llm: &LlmConfig,
        content: &ContentConfig,
        high_limit: bool,
        api_key: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: llm.model.clone(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            max_chars: content.max_post_chars,
            high_limit,
            templates: default_templates(&content.brand_handle),
        }
    }

    fn completion_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Request body for one generation call: one system instruction plus the
    /// template prompt
    fn build_payload(&self, template: &PostTemplate) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": template.prompt },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }

    fn pick_template(&self, topic: Option<&str>) -> Result<&PostTemplate> {
        match topic {
            Some(tag) => self
                .templates
                .iter()
                .find(|t| t.topic == tag)
                .ok_or_else(|| BotError::UnknownTopic(tag.to_string())),
            None => {
                let idx = rand::thread_rng().gen_range(0..self.templates.len());
                Ok(&self.templates[idx])
            }
        }
    }

    /// Reject content the platform would refuse
    pub fn validate(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(BotError::InvalidInput("content cannot be empty".to_string()));
        }
        let chars = text.chars().count();
        if !self.high_limit && chars > self.max_chars {
            return Err(BotError::InvalidInput(format!(
                "content exceeds {} characters (current: {})",
                self.max_chars, chars
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentSource for ContentGenerator {
    async fn generate(&self, topic: Option<&str>) -> Result<GeneratedPost> {
        let template = self.pick_template(topic)?;
        debug!("Generating {} content with {}", template.topic, self.model);

        let response = self
            .client
            .post(self.completion_url())
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(template))
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let text = body
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::trim)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::EmptyCompletion.into());
        }

        info!(
            "Generated {} content ({} chars)",
            template.topic,
            text.chars().count()
        );

        Ok(GeneratedPost {
            text: text.to_string(),
            topic: template.topic.clone(),
            model: self.model.clone(),
        })
    }

    fn normalize(&self, text: &str) -> String {
        let unified = text.replace("\r\n", "\n");
        let newline_runs = Regex::new(r"\n{3,}").unwrap();
        let space_runs = Regex::new(r"[ \t]{2,}").unwrap();

        let collapsed = newline_runs.replace_all(&unified, "\n\n");
        let collapsed = space_runs.replace_all(&collapsed, " ");
        let normalized = collapsed.trim().to_string();

        if self.high_limit || normalized.chars().count() <= self.max_chars {
            return normalized;
        }

        let cut: String = normalized.chars().take(self.max_chars).collect();
        if let Some(idx) = cut.rfind(". ") {
            if cut[..idx].chars().count() > MIN_SENTENCE_CUT {
                return cut[..=idx].trim_end().to_string();
            }
        }
        cut.trim_end().to_string()
    }

    fn topics(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.topic.clone()).collect()
    }
}

/// The built-in topic templates, with the brand handle woven in
fn default_templates(handle: &str) -> Vec<PostTemplate> {
    vec![
        PostTemplate {
            topic: "innovation".to_string(),
            prompt: format!(
                "Write a short article about the breakthrough {handle} represents for \
blockchain privacy. Open with the problem of public-by-default chains, introduce the \
fully homomorphic encryption approach that processes data without ever decrypting it, \
cover the main benefits, and close with a look ahead. Mention the handle exactly once. \
Separate paragraphs with double line breaks; no headings."
            ),
        },
        PostTemplate {
            topic: "privacy".to_string(),
            prompt: format!(
                "Write a short article about why transparency in current blockchains is a \
security risk and how {handle} solves it. Explain confidential transactions that stay \
verifiable, and why privacy matters for real adoption. Mention the handle exactly once. \
Separate paragraphs with double line breaks; no headings."
            ),
        },
        PostTemplate {
            topic: "defi".to_string(),
            prompt: format!(
                "Write a short article about how {handle} changes DeFi with privacy \
technology. Start from the privacy gaps holding DeFi back, then describe confidential \
trading, private lending, and what institutional adoption needs. Mention the handle \
exactly once. Separate paragraphs with double line breaks; no headings."
            ),
        },
        PostTemplate {
            topic: "developer".to_string(),
            prompt: format!(
                "Write a short article for developers about building privacy-first \
applications with the encryption libraries {handle} publishes. Describe what \
confidential smart contracts make possible and end with a call to the developer \
community. Mention the handle exactly once. Separate paragraphs with double line \
breaks; no headings."
            ),
        },
        PostTemplate {
            topic: "vision".to_string(),
            prompt: format!(
                "Write a short article about the future of blockchain where \
confidentiality is the default, and the role {handle} plays in getting there. Ground \
the vision in what encrypted computation already enables today. Mention the handle \
exactly once. Separate paragraphs with double line breaks; no headings."
            ),
        },
    ]
}
