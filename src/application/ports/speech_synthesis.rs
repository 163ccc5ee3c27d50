//! Speech Synthesis Port - 语音合成服务抽象
//!
//! 定义语音合成的抽象接口，具体实现在 infrastructure/adapters 层。
//! 重试与超时策略属于此边界，会话层不做重试

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PlayRequest, SpeechKind, SpeechSpeed, WordTiming};

/// 合成错误
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: HTTP {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SynthesisError {
    /// 传输错误与 5xx 可重试，4xx 与响应格式错误不可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            SynthesisError::NetworkError(_) | SynthesisError::Timeout => true,
            SynthesisError::ServiceError { status, .. } => *status >= 500,
            SynthesisError::InvalidResponse(_) => false,
        }
    }
}

/// 合成请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub kind: SpeechKind,
    pub speed: SpeechSpeed,
}

impl From<&PlayRequest> for SynthesisRequest {
    fn from(request: &PlayRequest) -> Self {
        Self {
            text: request.text.clone(),
            kind: request.kind,
            speed: request.speed,
        }
    }
}

/// 合成响应
#[derive(Debug, Clone)]
pub struct SynthesisResponse {
    /// 解码后的音频数据
    pub audio_data: Vec<u8>,
    /// 音频 MIME 类型
    pub mime_type: String,
    /// 服务提供方标识
    pub provider: String,
    /// 逐词时间戳（按服务方分词，使用前需校验数量）
    pub timings: Option<Vec<WordTiming>>,
    /// 音频时长（毫秒）
    pub duration_ms: Option<u64>,
}

impl SynthesisResponse {
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_ms.map(|ms| ms as f64 / 1000.0)
    }
}

/// Speech Synthesis Port
#[async_trait]
pub trait SpeechSynthesisPort: Send + Sync {
    /// 合成一段文本
    async fn synthesize(&self, request: SynthesisRequest)
        -> Result<SynthesisResponse, SynthesisError>;

    /// 检查合成服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SynthesisError::Timeout.is_retryable());
        assert!(SynthesisError::NetworkError("reset".into()).is_retryable());
        assert!(SynthesisError::ServiceError { status: 503, message: String::new() }.is_retryable());
        assert!(!SynthesisError::ServiceError { status: 404, message: String::new() }.is_retryable());
        assert!(!SynthesisError::InvalidResponse("bad json".into()).is_retryable());
    }

    #[test]
    fn test_duration_secs() {
        let response = SynthesisResponse {
            audio_data: vec![],
            mime_type: "audio/wav".into(),
            provider: "test".into(),
            timings: None,
            duration_ms: Some(1500),
        };
        assert_eq!(response.duration_secs(), Some(1.5));
    }
}
