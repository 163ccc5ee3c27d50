//! ReadAlong - 朗读与逐词高亮演示
//!
//! 用法: readalong [--fake] [--word] [--slow] <text...>

use std::sync::Arc;

use readalong::application::{EngineConfig, HighlightSink, ReadAlongEngine};
use readalong::config::{load_config, print_config, AppConfig};
use readalong::domain::{tokenize, PlayRequest, SpeechSpeed};
use readalong::infrastructure::{
    FakeSynthesisClient, HttpSynthesisClient, HttpSynthesisClientConfig, InMemoryAudioCache,
    TimelinePlayer,
};
use readalong::{AudioCachePort, SpeechSynthesisPort};

/// 命令行参数
struct Args {
    fake: bool,
    word: bool,
    slow: bool,
    text: String,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        fake: false,
        word: false,
        slow: false,
        text: String::new(),
    };
    let mut words = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--fake" => args.fake = true,
            "--word" => args.word = true,
            "--slow" => args.slow = true,
            flag if flag.starts_with("--") => anyhow::bail!("Unknown flag: {}", flag),
            _ => words.push(arg),
        }
    }
    if words.is_empty() {
        anyhow::bail!("Usage: readalong [--fake] [--word] [--slow] <text...>");
    }
    args.text = words.join(" ");
    Ok(args)
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},readalong={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    init_tracing(&config);
    print_config(&config);

    let synthesizer: Arc<dyn SpeechSynthesisPort> = if args.fake {
        Arc::new(FakeSynthesisClient::with_defaults())
    } else {
        let client_config: HttpSynthesisClientConfig = (&config.tts).into();
        Arc::new(HttpSynthesisClient::new(client_config)?)
    };
    let cache: Arc<dyn AudioCachePort> = InMemoryAudioCache::new(&(&config.cache).into()).arc();
    let engine = ReadAlongEngine::new(
        EngineConfig::from(&config.sync),
        cache,
        synthesizer,
        Arc::new(TimelinePlayer::new()),
    );

    let mut request = if args.word {
        PlayRequest::word(args.text.clone())
    } else {
        PlayRequest::sentence(args.text.clone())
    };
    if args.slow {
        request = request.with_speed(SpeechSpeed::Slow);
    }

    let words: Vec<String> = tokenize(&args.text).into_iter().map(str::to_string).collect();
    let highlight: HighlightSink = Box::new(move |index| match index {
        Some(i) => tracing::info!(
            index = i,
            word = words.get(i).map(String::as_str).unwrap_or_default(),
            "Highlight"
        ),
        None => tracing::info!("Highlight cleared"),
    });

    let session = engine.session();
    let outcome = session.play(request, Some(highlight)).await?;
    tracing::info!(outcome = ?outcome, "Play requested");

    let state = session.wait_finished().await?;
    tracing::info!(state = %state, "Session finished");

    let stats = engine.cache().stats();
    tracing::info!(
        entries = stats.total_entries,
        hits = stats.hit_count,
        misses = stats.miss_count,
        "Cache stats"
    );

    Ok(())
}
