//! HTTP Synthesis Client - 调用外部语音合成 HTTP 服务
//!
//! 外部合成 API:
//! POST {base_url}/api/tts
//! Request: {"text": "...", "type": "word|sentence", "speed": "normal|slow"}  (JSON)
//! Response:
//! - application/json: {"audioContent": base64, "timings"?: [...], "provider"?, "durationMs"?}
//! - 其他: 音频二进制，元数据在 headers 中

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{
    SpeechSynthesisPort, SynthesisError, SynthesisRequest, SynthesisResponse,
};
use crate::domain::{SpeechKind, SpeechSpeed, WordTiming};

const PROVIDER_HEADER: &str = "x-tts-provider";
const DURATION_HEADER: &str = "x-tts-duration-ms";
const DEFAULT_JSON_MIME: &str = "audio/mpeg";

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct TtsHttpRequest<'a> {
    text: &'a str,
    #[serde(rename = "type")]
    kind: SpeechKind,
    speed: SpeechSpeed,
}

/// JSON 响应体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtsJsonResponse {
    audio_content: String,
    #[serde(default)]
    timings: Option<Vec<WordTiming>>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    mime_type: Option<String>,
}

/// HTTP 合成客户端配置
#[derive(Debug, Clone)]
pub struct HttpSynthesisClientConfig {
    /// 合成服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 失败后的重试次数
    pub max_retries: u32,
    /// 重试退避基数（毫秒），第 n 次重试等待 n 倍
    pub retry_backoff_ms: u64,
}

impl Default for HttpSynthesisClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            max_retries: 1,
            retry_backoff_ms: 250,
        }
    }
}

impl HttpSynthesisClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }
}

/// HTTP 合成客户端
pub struct HttpSynthesisClient {
    client: Client,
    config: HttpSynthesisClientConfig,
}

impl HttpSynthesisClient {
    pub fn new(config: HttpSynthesisClientConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::NetworkError(e.to_string()))?;

        tracing::info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            max_retries = config.max_retries,
            "HttpSynthesisClient initialized"
        );

        Ok(Self { client, config })
    }

    pub fn with_default_config() -> Result<Self, SynthesisError> {
        Self::new(HttpSynthesisClientConfig::default())
    }

    fn synthesize_url(&self) -> String {
        format!("{}/api/tts", self.config.base_url.trim_end_matches('/'))
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url.trim_end_matches('/'))
    }

    /// 单次请求，不重试
    async fn send_once(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, SynthesisError> {
        let body = TtsHttpRequest {
            text: &request.text,
            kind: request.kind,
            speed: request.speed,
        };

        let response = self
            .client
            .post(self.synthesize_url())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SynthesisError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::InvalidResponse(format!("Failed to read body: {}", e)))?;

        if is_json(&headers) {
            decode_json_body(&bytes)
        } else {
            Ok(decode_binary_body(&headers, bytes.to_vec()))
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() {
        SynthesisError::Timeout
    } else if e.is_connect() {
        SynthesisError::NetworkError(format!("Cannot connect to synthesis service: {}", e))
    } else {
        SynthesisError::NetworkError(e.to_string())
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn decode_json_body(bytes: &[u8]) -> Result<SynthesisResponse, SynthesisError> {
    let body: TtsJsonResponse = serde_json::from_slice(bytes)
        .map_err(|e| SynthesisError::InvalidResponse(format!("Malformed JSON: {}", e)))?;

    let audio_data = general_purpose::STANDARD
        .decode(body.audio_content.as_bytes())
        .map_err(|e| SynthesisError::InvalidResponse(format!("Invalid base64 audio: {}", e)))?;

    if audio_data.is_empty() {
        return Err(SynthesisError::InvalidResponse("Empty audio content".to_string()));
    }

    Ok(SynthesisResponse {
        audio_data,
        mime_type: body.mime_type.unwrap_or_else(|| DEFAULT_JSON_MIME.to_string()),
        provider: body.provider.unwrap_or_else(|| "unknown".to_string()),
        timings: body.timings,
        duration_ms: body.duration_ms,
    })
}

fn decode_binary_body(headers: &HeaderMap, audio_data: Vec<u8>) -> SynthesisResponse {
    let mime_type = header_str(headers, CONTENT_TYPE.as_str())
        .unwrap_or("application/octet-stream")
        .to_string();
    let provider = header_str(headers, PROVIDER_HEADER)
        .unwrap_or("unknown")
        .to_string();
    let duration_ms = header_str(headers, DURATION_HEADER).and_then(|v| v.parse().ok());

    SynthesisResponse {
        audio_data,
        mime_type,
        provider,
        timings: None,
        duration_ms,
    }
}

#[async_trait]
impl SpeechSynthesisPort for HttpSynthesisClient {
    async fn synthesize(
        &self,
        request: SynthesisRequest,
    ) -> Result<SynthesisResponse, SynthesisError> {
        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = request.text.len(),
            kind = %request.kind,
            speed = %request.speed,
            "Sending synthesis request"
        );

        let mut attempt: u32 = 0;
        loop {
            match self.send_once(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        provider = %response.provider,
                        duration_ms = ?response.duration_ms,
                        audio_size = response.audio_data.len(),
                        has_timings = response.timings.is_some(),
                        "Synthesis completed"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff =
                        Duration::from_millis(self.config.retry_backoff_ms * u64::from(attempt));
                    tracing::warn!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Synthesis request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
