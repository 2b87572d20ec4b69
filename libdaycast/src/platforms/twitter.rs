//! Twitter platform implementation
//!
//! Talks to the v2 API for posting and credential checks and to the v1.1
//! media endpoint for uploads. Requests are signed with OAuth 1.0a
//! (HMAC-SHA1); multipart and JSON bodies are excluded from the signature
//! base string per RFC 5849.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Value};
use sha1::Sha1;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Secrets;
use crate::error::{PlatformError, Result};
use crate::platforms::Platform;

const TWEET_URL: &str = "https://api.twitter.com/2/tweets";
const ME_URL: &str = "https://api.twitter.com/2/users/me";
const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

/// Character ceiling for accounts in high-limit mode
const HIGH_LIMIT_CHARS: usize = 10_000;

/// RFC 5849 percent-encoding: everything but unreserved characters
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn pct(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE).to_string()
}

/// Four-part OAuth 1.0a credential set
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl From<&Secrets> for TwitterCredentials {
    fn from(secrets: &Secrets) -> Self {
        Self {
            app_key: secrets.twitter_app_key.clone(),
            app_secret: secrets.twitter_app_secret.clone(),
            access_token: secrets.twitter_access_token.clone(),
            access_secret: secrets.twitter_access_secret.clone(),
        }
    }
}

/// Build the `Authorization: OAuth ...` header value for one request
///
/// Only the oauth_* protocol parameters enter the signature base string;
/// neither endpoint used here takes query parameters.
fn build_authorization(
    method: &str,
    url: &str,
    creds: &TwitterCredentials,
    nonce: &str,
    timestamp: &str,
) -> String {
    let mut params: Vec<(String, String)> = [
        ("oauth_consumer_key", creds.app_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", creds.access_token.as_str()),
        ("oauth_version", "1.0"),
    ]
    .iter()
    .map(|(k, v)| (pct(k), pct(v)))
    .collect();
    params.sort();

    let param_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        pct(url),
        pct(&param_string)
    );
    let signing_key = format!("{}&{}", pct(&creds.app_secret), pct(&creds.access_secret));

    let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(base.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    params.push((pct("oauth_signature"), pct(&signature)));
    params.sort();

    let fields = params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", fields)
}

/// Pull a human-readable detail out of an API error body
fn response_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/detail")
        .or_else(|| value.pointer("/errors/0/message"))
        .or_else(|| value.pointer("/title"))
        .and_then(|d| d.as_str())
        .map(str::to_string)
}

/// Twitter client over OAuth 1.0a user context
pub struct TwitterClient {
    client: reqwest::Client,
    credentials: TwitterCredentials,
    high_limit: bool,
    max_chars: usize,
}

impl TwitterClient {
    pub fn new(credentials: TwitterCredentials, high_limit: bool, max_chars: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            high_limit,
            max_chars,
        }
    }

    fn authorization(&self, method: &str, url: &str) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        build_authorization(method, url, &self.credentials, &nonce, &timestamp)
    }

    fn effective_limit(&self) -> usize {
        if self.high_limit {
            HIGH_LIMIT_CHARS
        } else {
            self.max_chars
        }
    }

    fn tweet_payload(text: &str, media_id: Option<&str>) -> Value {
        let mut payload = json!({ "text": text });
        if let Some(id) = media_id {
            payload["media"] = json!({ "media_ids": [id] });
        }
        payload
    }
}

#[async_trait]
impl Platform for TwitterClient {
    async fn verify_credentials(&self) -> Result<()> {
        let response = self
            .client
            .get(ME_URL)
            .header(reqwest::header::AUTHORIZATION, self.authorization("GET", ME_URL))
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Twitter credentials verified");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = response_detail(&body).unwrap_or_else(|| status.to_string());
        match status.as_u16() {
            401 | 403 => Err(PlatformError::Authentication(format!(
                "Twitter rejected credentials: {}",
                detail
            ))
            .into()),
            _ => Err(PlatformError::Network(format!(
                "credential check failed ({}): {}",
                status, detail
            ))
            .into()),
        }
    }

    async fn upload_media(&self, image: &Path) -> Result<String> {
        let bytes = std::fs::read(image).map_err(|e| {
            PlatformError::MediaUpload(format!("cannot read {}: {}", image.display(), e))
        })?;

        debug!("Uploading {} bytes of media", bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes).file_name("media");
        let form = reqwest::multipart::Form::new()
            .part("media", part)
            .text("media_category", "tweet_image");

        let response = self
            .client
            .post(MEDIA_UPLOAD_URL)
            .header(
                reqwest::header::AUTHORIZATION,
                self.authorization("POST", MEDIA_UPLOAD_URL),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !status.is_success() {
            let detail = response_detail(&body).unwrap_or_else(|| status.to_string());
            return match status.as_u16() {
                401 | 403 => Err(PlatformError::Authentication(format!(
                    "Twitter rejected credentials during upload: {}",
                    detail
                ))
                .into()),
                _ => Err(PlatformError::MediaUpload(detail).into()),
            };
        }

        let media_id = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("media_id_string")
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                PlatformError::MediaUpload("response missing media_id_string".to_string())
            })?;

        info!("Media uploaded: {}", media_id);
        Ok(media_id)
    }

    async fn publish(&self, text: &str, media_id: Option<&str>) -> Result<String> {
        self.validate_text(text)?;

        let response = self
            .client
            .post(TWEET_URL)
            .header(
                reqwest::header::AUTHORIZATION,
                self.authorization("POST", TWEET_URL),
            )
            .json(&Self::tweet_payload(text, media_id))
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !status.is_success() {
            let detail = response_detail(&body).unwrap_or_else(|| status.to_string());
            return match status.as_u16() {
                401 | 403 => Err(PlatformError::Authentication(format!(
                    "Twitter rejected credentials: {}",
                    detail
                ))
                .into()),
                _ => Err(PlatformError::Posting(detail).into()),
            };
        }

        let post_id = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/data/id")
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
            })
            .ok_or_else(|| PlatformError::Posting("response missing post id".to_string()))?;

        info!("Posted tweet {}", post_id);
        Ok(post_id)
    }

    fn validate_text(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(PlatformError::Validation("tweet text cannot be empty".to_string()).into());
        }

        let chars = text.chars().count();
        let limit = self.effective_limit();
        if chars > limit {
            return Err(PlatformError::Validation(format!(
                "tweet text exceeds {} characters (current: {})",
                limit, chars
            ))
            .into());
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "twitter"
    }

    fn character_limit(&self) -> Option<usize> {
        Some(self.effective_limit())
    }
}
