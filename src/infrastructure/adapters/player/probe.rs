//! 基于 symphonia 的音频时长探测

use std::io::Cursor;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::PlayerError;

fn extension_for(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        _ => None,
    }
}

/// 探测音频时长（秒）
///
/// 优先使用容器声明的帧数；没有时遍历数据包累加时长
pub fn probe_duration(data: &[u8], mime_type: &str) -> Result<f64, PlayerError> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.mime_type(mime_type);
    if let Some(ext) = extension_for(mime_type) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PlayerError::DecodingError(format!("Probe failed: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PlayerError::DecodingError("No audio track found".to_string()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            return Ok(frames as f64 / f64::from(rate));
        }
    }

    let mut total_ts: u64 = 0;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => total_ts += packet.dur,
            Ok(_) => {}
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => {
                return Err(PlayerError::DecodingError(format!("Packet read error: {}", e)));
            }
        }
    }

    match (params.time_base, params.sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(total_ts);
            Ok(time.seconds as f64 + time.frac)
        }
        (None, Some(rate)) if rate > 0 => Ok(total_ts as f64 / f64::from(rate)),
        _ => Err(PlayerError::DecodingError("Unknown sample rate".to_string())),
    }
}
