//! Frame demultiplexing
//!
//! Every message from the endpoint is an opaque binary frame carrying a
//! channel discriminator byte and, for recognized channels, a payload at a
//! fixed offset. Routing is a pure function over the frame bytes; all
//! buffer state lives in [`crate::sink`].

use std::fmt;

/// Byte index of the channel discriminator. Protocol-derived: the vendor
/// player inspects `frame[1]` only.
pub const DISCRIMINATOR_OFFSET: usize = 1;

/// Byte index where payload begins for recognized frames. Protocol-derived:
/// the 78 bytes before it are an opaque per-frame header.
pub const PAYLOAD_OFFSET: usize = 0x4e;

/// Discriminator value marking a video frame (ASCII 'c').
pub const VIDEO_MARKER: u8 = 0x63;

/// A logical stream multiplexed over the single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    Video,
    Voice,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Voice => write!(f, "voice"),
        }
    }
}

/// Discriminator-to-channel routing table.
///
/// The endpoint multiplexes a voice stream as well, but its marker value has
/// not been observed on the wire; bind it here once confirmed instead of
/// touching the receive loop.
const ROUTES: &[(u8, ChannelId)] = &[(VIDEO_MARKER, ChannelId::Video)];

/// Routing decision for one received frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Routed<'a> {
    /// Frame belongs to a known channel; payload may be empty for frames
    /// shorter than [`PAYLOAD_OFFSET`].
    Channel(ChannelId, &'a [u8]),
    /// Unrecognized discriminator or frame too short to carry one.
    Ignored,
}

/// Classify a frame by its discriminator byte and slice out the payload.
///
/// Short frames are never an error: a frame without a discriminator is
/// ignored, and a recognized frame shorter than the payload offset routes
/// with an empty payload.
pub fn route(frame: &[u8]) -> Routed<'_> {
    let Some(&discriminator) = frame.get(DISCRIMINATOR_OFFSET) else {
        return Routed::Ignored;
    };
    match ROUTES.iter().find(|(marker, _)| *marker == discriminator) {
        Some(&(_, channel)) => {
            let payload = frame.get(PAYLOAD_OFFSET..).unwrap_or(&[]);
            Routed::Channel(channel, payload)
        }
        None => Routed::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_frame(len: usize) -> Vec<u8> {
        let mut frame = vec![0u8; len];
        if len > DISCRIMINATOR_OFFSET {
            frame[DISCRIMINATOR_OFFSET] = VIDEO_MARKER;
        }
        frame
    }

    #[test]
    fn test_video_frame_with_payload() {
        let mut frame = video_frame(100);
        frame[PAYLOAD_OFFSET..].fill(0xAB);
        match route(&frame) {
            Routed::Channel(ChannelId::Video, payload) => {
                assert_eq!(payload.len(), 100 - PAYLOAD_OFFSET);
                assert!(payload.iter().all(|&b| b == 0xAB));
            }
            other => panic!("expected video route, got {:?}", other),
        }
    }

    #[test]
    fn test_video_frame_exactly_at_payload_offset() {
        let frame = video_frame(PAYLOAD_OFFSET);
        assert_eq!(route(&frame), Routed::Channel(ChannelId::Video, &[]));
    }

    #[test]
    fn test_short_video_frame_has_empty_payload() {
        // 5 bytes: discriminator present, payload offset past the end
        let frame = video_frame(5);
        assert_eq!(route(&frame), Routed::Channel(ChannelId::Video, &[]));
    }

    #[test]
    fn test_unknown_discriminator_is_ignored() {
        let mut frame = vec![0u8; 100];
        frame[DISCRIMINATOR_OFFSET] = 0x64;
        assert_eq!(route(&frame), Routed::Ignored);
    }

    #[test]
    fn test_frame_too_short_for_discriminator() {
        assert_eq!(route(&[]), Routed::Ignored);
        assert_eq!(route(&[VIDEO_MARKER]), Routed::Ignored);
    }
}
