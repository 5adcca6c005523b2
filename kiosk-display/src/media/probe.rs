//! Audio duration probing using symphonia
//!
//! Only container/packet headers are read; nothing is decoded to PCM. Formats
//! whose headers carry a frame count (WAV, FLAC, MP3 with a Xing/Info frame)
//! are answered from the header; otherwise packet durations are summed.

use crate::error::{Error, Result};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::debug;

/// Probe the playable duration of a fully buffered audio resource
///
/// `location` is only used for the format hint (its file extension).
pub fn probe_duration(bytes: Vec<u8>, location: &str) -> Result<Duration> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(location).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Audio(format!("Unrecognized audio in {}: {}", location, e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Audio(format!("No audio track in {}", location)))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(n_frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            let duration = Duration::from_secs_f64(n_frames as f64 / f64::from(rate));
            debug!("Probed {} from header: {:?}", location, duration);
            return Ok(duration);
        }
    }

    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))
        .ok_or_else(|| Error::Audio(format!("No time base for {}", location)))?;

    let mut total_ts: u64 = 0;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    total_ts += packet.dur;
                }
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(Error::Audio(format!("Corrupt audio in {}: {}", location, e)));
            }
        }
    }

    let time = time_base.calc_time(total_ts);
    let duration = Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac);
    debug!("Probed {} from packets: {:?}", location, duration);
    Ok(duration)
}
