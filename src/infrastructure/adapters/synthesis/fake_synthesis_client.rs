//! Fake Synthesis Client - 用于测试与演示的合成客户端
//!
//! 不调用外部服务，按单词数生成静音 WAV

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{
    SpeechSynthesisPort, SynthesisError, SynthesisRequest, SynthesisResponse,
};
use crate::domain::{tokenize, SpeechSpeed, WordTiming};

/// Fake Synthesis Client 配置
#[derive(Debug, Clone)]
pub struct FakeSynthesisClientConfig {
    /// 每个单词的音频时长（毫秒），慢速时加倍
    pub word_ms: u64,
    /// 是否返回逐词时间戳
    pub with_timings: bool,
    /// 模拟合成延迟
    pub latency: Duration,
    /// 生成 WAV 的采样率
    pub sample_rate: u32,
}

impl Default for FakeSynthesisClientConfig {
    fn default() -> Self {
        Self {
            word_ms: 400,
            with_timings: false,
            latency: Duration::from_millis(50),
            sample_rate: 8000,
        }
    }
}

/// Fake Synthesis Client
pub struct FakeSynthesisClient {
    config: FakeSynthesisClientConfig,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeSynthesisClient {
    pub fn new(config: FakeSynthesisClientConfig) -> Self {
        tracing::info!(
            word_ms = config.word_ms,
            with_timings = config.with_timings,
            "FakeSynthesisClient initialized"
        );
        Self {
            config,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeSynthesisClientConfig::default())
    }

    /// 之后的请求全部返回服务错误
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// 已收到的合成请求数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn word_ms(&self, speed: SpeechSpeed) -> u64 {
        match speed {
            SpeechSpeed::Normal => self.config.word_ms,
            SpeechSpeed::Slow => self.config.word_ms * 2,
        }
    }
}

impl Default for FakeSynthesisClient {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// 生成 16-bit 单声道静音 WAV
pub fn silent_wav(duration_ms: u64, sample_rate: u32) -> Vec<u8> {
    let samples = (u64::from(sample_rate) * duration_ms / 1000) as u32;
    let data_len = samples * 2;
    let byte_rate = sample_rate * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

#[async_trait]
impl SpeechSynthesisPort for FakeSynthesisClient {
    async fn synthesize(
        &self,
        request: SynthesisRequest,
    ) -> Result<SynthesisResponse, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            text_len = request.text.len(),
            kind = %request.kind,
            "FakeSynthesisClient: generating silent audio"
        );

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(SynthesisError::ServiceError {
                status: 503,
                message: "fake synthesizer set to fail".to_string(),
            });
        }

        let words = tokenize(&request.text);
        let word_ms = self.word_ms(request.speed);
        let duration_ms = word_ms * words.len().max(1) as u64;

        let timings = self.config.with_timings.then(|| {
            words
                .iter()
                .enumerate()
                .map(|(i, word)| WordTiming {
                    word: (*word).to_string(),
                    start_ms: i as u64 * word_ms,
                    end_ms: (i as u64 + 1) * word_ms,
                })
                .collect()
        });

        Ok(SynthesisResponse {
            audio_data: silent_wav(duration_ms, self.config.sample_rate),
            mime_type: "audio/wav".to_string(),
            provider: "fake".to_string(),
            timings,
            duration_ms: Some(duration_ms),
        })
    }
}
