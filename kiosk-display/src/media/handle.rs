//! Renderable image and playable audio handles
//!
//! Both handles are cheap to clone (`Arc` inside). An [`AudioHandle`] exists
//! before its bytes do: the fetcher creates it, hands it out immediately and
//! keeps filling it in the background. Readers observe buffering progress
//! through [`AudioHandle::ready`] and [`AudioHandle::status`].

use crate::error::{Error, Result};
use crate::media::probe::probe_duration;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Decoded-header view of a fetched image
#[derive(Debug, Clone)]
pub struct ImageHandle {
    location: Arc<str>,
    bytes: Arc<Vec<u8>>,
    width: u32,
    height: u32,
}

impl ImageHandle {
    /// Validate image bytes and wrap them
    ///
    /// Bytes whose format cannot be recognized, or whose header cannot be
    /// read, are an image failure.
    pub fn decode(location: &str, bytes: Vec<u8>) -> Result<Self> {
        let image_err = |reason: String| Error::Image {
            location: location.to_string(),
            reason,
        };

        let reader = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| image_err(e.to_string()))?;
        if reader.format().is_none() {
            return Err(image_err("unrecognized image format".to_string()));
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| image_err(e.to_string()))?;

        Ok(Self {
            location: Arc::from(location),
            bytes: Arc::new(bytes),
            width,
            height,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Buffering state of an audio resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferStatus {
    /// Bytes still arriving
    Buffering,
    /// All bytes present and the duration is known
    Complete,
    /// Transport or decode failure
    Failed(String),
}

#[derive(Debug, Default)]
struct AudioBuffer {
    bytes: Vec<u8>,
    duration: Option<Duration>,
}

#[derive(Debug)]
struct AudioInner {
    location: String,
    buffer: Mutex<AudioBuffer>,
    status: watch::Sender<BufferStatus>,
    /// Playback cursor in milliseconds
    position_ms: AtomicU64,
}

/// Shared, seekable audio resource
#[derive(Debug, Clone)]
pub struct AudioHandle {
    inner: Arc<AudioInner>,
}

impl AudioHandle {
    /// Create an empty handle in `Buffering` state
    pub fn new(location: &str) -> Self {
        let (status, _) = watch::channel(BufferStatus::Buffering);
        Self {
            inner: Arc::new(AudioInner {
                location: location.to_string(),
                buffer: Mutex::new(AudioBuffer::default()),
                status,
                position_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Create a handle from bytes that are already fully present
    pub fn from_bytes(location: &str, bytes: Vec<u8>) -> Self {
        let handle = Self::new(location);
        handle.append(&bytes);
        handle.finish();
        handle
    }

    pub fn location(&self) -> &str {
        &self.inner.location
    }

    /// Append a received chunk
    ///
    /// Ignored once the handle has completed or failed.
    pub fn append(&self, chunk: &[u8]) {
        if *self.inner.status.borrow() != BufferStatus::Buffering {
            return;
        }
        self.lock_buffer().bytes.extend_from_slice(chunk);
    }

    /// Mark the transfer finished and probe the duration
    ///
    /// Bytes that cannot be probed turn the handle into `Failed`.
    pub fn finish(&self) {
        if *self.inner.status.borrow() != BufferStatus::Buffering {
            return;
        }
        let bytes = self.lock_buffer().bytes.clone();
        match probe_duration(bytes, &self.inner.location) {
            Ok(duration) => {
                self.lock_buffer().duration = Some(duration);
                debug!("Audio buffered: {} ({:?})", self.inner.location, duration);
                self.inner.status.send_replace(BufferStatus::Complete);
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Mark the transfer failed
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if *self.inner.status.borrow() != BufferStatus::Buffering {
            return;
        }
        warn!("Audio failed: {}: {}", self.inner.location, reason);
        self.inner.status.send_replace(BufferStatus::Failed(reason));
    }

    pub fn status(&self) -> BufferStatus {
        self.inner.status.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        *self.inner.status.borrow() == BufferStatus::Complete
    }

    /// Wait until buffering has completed or failed
    pub async fn ready(&self) -> Result<()> {
        let mut rx = self.inner.status.subscribe();
        loop {
            let status = rx.borrow_and_update().clone();
            match status {
                BufferStatus::Complete => return Ok(()),
                BufferStatus::Failed(reason) => {
                    return Err(Error::Audio(format!("{}: {}", self.inner.location, reason)))
                }
                BufferStatus::Buffering => {}
            }
            if rx.changed().await.is_err() {
                return Err(Error::Internal("audio status channel closed".to_string()));
            }
        }
    }

    pub fn buffered_bytes(&self) -> usize {
        self.lock_buffer().bytes.len()
    }

    /// Total playable duration, unknown until buffering completes
    pub fn duration(&self) -> Option<Duration> {
        self.lock_buffer().duration
    }

    /// Current playback cursor
    pub fn position(&self) -> Duration {
        Duration::from_millis(self.inner.position_ms.load(Ordering::Acquire))
    }

    pub fn set_position(&self, position: Duration) {
        let ms = u64::try_from(position.as_millis()).unwrap_or(u64::MAX);
        self.inner.position_ms.store(ms, Ordering::Release);
    }

    /// Rewind the cursor to the start
    pub fn reset(&self) {
        self.inner.position_ms.store(0, Ordering::Release);
    }

    /// Whether two handles refer to the same underlying resource
    pub fn same_resource(&self, other: &AudioHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock_buffer(&self) -> std::sync::MutexGuard<'_, AudioBuffer> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Generated media for unit tests

    use std::io::Cursor;

    /// Silent mono 16-bit WAV of the given length
    pub fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    /// Tiny PNG image
    pub fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::new(4, 3);
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{png_bytes, wav_bytes};
    use super::*;

    #[test]
    fn test_image_decode() {
        let image = ImageHandle::decode("001.jpg", png_bytes()).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.location(), "001.jpg");
    }

    #[test]
    fn test_image_garbage_fails() {
        let result = ImageHandle::decode("001.jpg", b"<html>404</html>".to_vec());
        assert!(matches!(result, Err(Error::Image { .. })));
    }

    #[tokio::test]
    async fn test_audio_fills_then_completes() {
        let bytes = wav_bytes(8000, 8000);
        let audio = AudioHandle::new("001.mp3");
        assert_eq!(audio.status(), BufferStatus::Buffering);
        assert!(audio.duration().is_none());

        let (head, tail) = bytes.split_at(bytes.len() / 2);
        audio.append(head);
        assert_eq!(audio.buffered_bytes(), head.len());
        audio.append(tail);
        audio.finish();

        audio.ready().await.unwrap();
        assert!(audio.is_complete());
        assert_eq!(audio.duration(), Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_ready_waits_for_background_fill() {
        let audio = AudioHandle::new("002.mp3");
        let filler = audio.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            filler.append(&wav_bytes(8000, 4000));
            filler.finish();
        });
        audio.ready().await.unwrap();
        assert_eq!(audio.duration(), Some(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_failure_is_sticky() {
        let audio = AudioHandle::new("003.mp3");
        audio.fail("connection reset");
        audio.append(&wav_bytes(8000, 10));
        audio.finish();
        assert!(matches!(audio.status(), BufferStatus::Failed(_)));
        assert_eq!(audio.buffered_bytes(), 0);
        assert!(audio.ready().await.is_err());
    }

    #[test]
    fn test_unprobeable_bytes_fail() {
        let audio = AudioHandle::from_bytes("004.mp3", b"nope".to_vec());
        assert!(matches!(audio.status(), BufferStatus::Failed(_)));
    }

    #[test]
    fn test_cursor_is_shared_between_clones() {
        let audio = AudioHandle::from_bytes("005.mp3", wav_bytes(8000, 8000));
        let other = audio.clone();
        audio.set_position(Duration::from_millis(750));
        assert_eq!(other.position(), Duration::from_millis(750));
        other.reset();
        assert_eq!(audio.position(), Duration::ZERO);
        assert!(audio.same_resource(&other));
        assert!(!audio.same_resource(&AudioHandle::new("005.mp3")));
    }
}
