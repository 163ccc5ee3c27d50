//! Synthesis Adapter - 语音合成客户端实现

mod fake_synthesis_client;
mod http_synthesis_client;

pub use fake_synthesis_client::{silent_wav, FakeSynthesisClient, FakeSynthesisClientConfig};
pub use http_synthesis_client::{HttpSynthesisClient, HttpSynthesisClientConfig};
