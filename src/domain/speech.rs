//! 朗读请求的值对象

use serde::{Deserialize, Serialize};

/// 朗读类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechKind {
    /// 单个词汇
    #[default]
    Word,
    /// 句子（多词文本块，支持逐词高亮）
    Sentence,
}

impl SpeechKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechKind::Word => "word",
            SpeechKind::Sentence => "sentence",
        }
    }
}

impl std::fmt::Display for SpeechKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 语速
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechSpeed {
    #[default]
    Normal,
    Slow,
}

impl SpeechSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechSpeed::Normal => "normal",
            SpeechSpeed::Slow => "slow",
        }
    }
}

impl std::fmt::Display for SpeechSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次播放请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub text: String,
    pub kind: SpeechKind,
    pub speed: SpeechSpeed,
}

impl PlayRequest {
    pub fn word(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: SpeechKind::Word,
            speed: SpeechSpeed::Normal,
        }
    }

    pub fn sentence(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: SpeechKind::Sentence,
            speed: SpeechSpeed::Normal,
        }
    }

    pub fn with_speed(mut self, speed: SpeechSpeed) -> Self {
        self.speed = speed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&SpeechKind::Sentence).unwrap(), "\"sentence\"");
        assert_eq!(serde_json::to_string(&SpeechSpeed::Slow).unwrap(), "\"slow\"");
    }

    #[test]
    fn test_request_builders() {
        let request = PlayRequest::sentence("The cat sat.").with_speed(SpeechSpeed::Slow);
        assert_eq!(request.kind, SpeechKind::Sentence);
        assert_eq!(request.speed, SpeechSpeed::Slow);
        assert_eq!(PlayRequest::word("cat").kind, SpeechKind::Word);
    }
}
