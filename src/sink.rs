//! Threshold-triggered stream sinks
//!
//! Each channel accumulates payload bytes in memory and appends the whole
//! buffer to its target file once the accumulated size crosses a fixed
//! threshold, amortizing disk I/O over many small frames. Writes happen
//! inline with frame processing; a slow disk stalls receipt of subsequent
//! frames, which is accepted for this tool.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use chrono::Utc;
use tracing::debug;

use crate::demux::ChannelId;
use crate::error::{AppError, Result};

/// Flush once the buffer strictly exceeds this many bytes (1 MiB).
/// Inherited from the vendor player's capture behavior.
pub const FLUSH_THRESHOLD: usize = 1024 * 1024;

/// Fixed target file for the video channel.
const VIDEO_FILE_NAME: &str = "video.flv";

/// Extension for the timestamp-named voice targets.
const VOICE_FILE_EXT: &str = "flv";

/// In-memory accumulator for one channel, flushed to an append-only file.
pub struct ChannelBuffer {
    channel: ChannelId,
    out_dir: PathBuf,
    buf: BytesMut,
}

impl ChannelBuffer {
    fn new(channel: ChannelId, out_dir: &Path) -> Self {
        Self {
            channel,
            out_dir: out_dir.to_path_buf(),
            buf: BytesMut::new(),
        }
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Flush the entire buffer to the channel target if it strictly exceeds
    /// [`FLUSH_THRESHOLD`], then reset it. Returns the path written to, or
    /// `None` when no flush happened.
    fn maybe_flush(&mut self) -> Result<Option<PathBuf>> {
        if self.buf.len() <= FLUSH_THRESHOLD {
            return Ok(None);
        }

        let path = self.target_path();
        let flush = |path: &Path, data: &[u8]| -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(data)
        };
        flush(&path, &self.buf).map_err(|source| AppError::Flush {
            path: path.display().to_string(),
            source,
        })?;

        self.buf.clear();
        Ok(Some(path))
    }

    /// Target file for the next flush. The video target is fixed; the voice
    /// target is named after the wall clock at flush time, so a long session
    /// produces one voice file per flush.
    fn target_path(&self) -> PathBuf {
        match self.channel {
            ChannelId::Video => self.out_dir.join(VIDEO_FILE_NAME),
            ChannelId::Voice => self
                .out_dir
                .join(format!("{}.{}", Utc::now().timestamp(), VOICE_FILE_EXT)),
        }
    }
}

/// Owns the per-channel buffers; `append` is the only mutator.
pub struct StreamSink {
    video: ChannelBuffer,
    voice: ChannelBuffer,
}

impl StreamSink {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        let out_dir = out_dir.as_ref();
        Self {
            video: ChannelBuffer::new(ChannelId::Video, out_dir),
            voice: ChannelBuffer::new(ChannelId::Voice, out_dir),
        }
    }

    /// Append payload bytes to a channel and flush if the threshold was
    /// crossed. Returns the path written to when a flush happened.
    pub fn append(&mut self, channel: ChannelId, bytes: &[u8]) -> Result<Option<PathBuf>> {
        let buffer = self.buffer_mut(channel);
        buffer.append(bytes);
        debug!(channel = %channel, buffered = buffer.len(), "payload appended");
        buffer.maybe_flush()
    }

    /// Bytes currently buffered for a channel.
    pub fn buffered(&self, channel: ChannelId) -> usize {
        match channel {
            ChannelId::Video => self.video.len(),
            ChannelId::Voice => self.voice.len(),
        }
    }

    fn buffer_mut(&mut self, channel: ChannelId) -> &mut ChannelBuffer {
        match channel {
            ChannelId::Video => &mut self.video,
            ChannelId::Voice => &mut self.voice,
        }
    }
}
