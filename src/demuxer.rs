//! Container demultiplexing.
//!
//! Container parsing itself is done by a [`Demuxer`] implementation; this
//! module defines the packet and stream metadata types and the iterator
//! sessions use.

use bytes::Bytes;
use nvvc_codec::config::EncoderOptions;
use nvvc_codec::{Codec, CodecError};
use tracing::debug;

/// One compressed access unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub data: Bytes,
    pub pts: i64,
    pub dts: i64,
    /// Byte position in the container, -1 if unknown.
    pub pos: i64,
    pub duration: i64,
    pub key: bool,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>, pts: i64) -> Self {
        Self {
            data: data.into(),
            pts,
            dts: pts,
            pos: -1,
            duration: 0,
            key: false,
        }
    }

    /// Empty packet that tells a decoder to drain.
    pub fn end_of_stream() -> Self {
        Self::new(Bytes::new(), 0)
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Bt601,
    Bt709,
    Unspecified,
}

impl ColorSpace {
    /// Map ISO/IEC 23091-4 matrix coefficients. BT.470BG and SMPTE 170M are
    /// both reported as BT.601.
    pub fn from_matrix_coefficients(code: u32) -> Self {
        match code {
            1 => Self::Bt709,
            5 | 6 => Self::Bt601,
            _ => Self::Unspecified,
        }
    }

    /// Value of the encoder's `colorspace` option.
    pub fn option_value(&self) -> Option<&'static str> {
        match self {
            Self::Bt601 => Some("bt601"),
            Self::Bt709 => Some("bt709"),
            Self::Unspecified => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorRange {
    /// Narrow range.
    Mpeg,
    /// Full range.
    Jpeg,
    Undefined,
}

impl ColorRange {
    /// Map a container range code: 1 is narrow, 2 is full.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Mpeg,
            2 => Self::Jpeg,
            _ => Self::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetadata {
    /// `None` when the stream uses a codec the encoder cannot produce.
    pub codec: Option<Codec>,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    pub frame_rate: f64,
    /// Bytes of one decoded frame.
    pub frame_size: usize,
    pub color_space: ColorSpace,
    pub color_range: ColorRange,
}

impl StreamMetadata {
    /// Encoder options reproducing this stream's codec, size, rate and colour.
    pub fn encoder_options(&self) -> EncoderOptions {
        let mut options = EncoderOptions::new()
            .set("s", format!("{}x{}", self.width, self.height))
            .set("fps", format!("{:.2}", self.frame_rate));
        if let Some(codec) = self.codec {
            options.insert("codec", codec.name());
        }
        if let Some(colorspace) = self.color_space.option_value() {
            options.insert("colorspace", colorspace);
        }
        options
    }
}

/// A container parser.
pub trait Demuxer {
    /// Next packet, or `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<Packet>, CodecError>;

    /// Reposition to `timestamp_ms` and return the packet found there.
    fn seek_to_timestamp(&mut self, timestamp_ms: u64) -> Result<Option<Packet>, CodecError>;

    fn metadata(&self) -> StreamMetadata;
}

/// Packet iterator over a [`Demuxer`].
///
/// Iteration stops at end of stream; a failed read is yielded once as an
/// error and iteration may continue.
pub struct DemuxStream<D: Demuxer> {
    demuxer: D,
    finished: bool,
}

impl<D: Demuxer> DemuxStream<D> {
    pub fn new(demuxer: D) -> Self {
        Self {
            demuxer,
            finished: false,
        }
    }

    pub fn metadata(&self) -> StreamMetadata {
        self.demuxer.metadata()
    }

    /// Seek to `seconds` from the start of the stream.
    ///
    /// Resumes iteration if the stream had ended.
    pub fn seek(&mut self, seconds: f64) -> Result<Option<Packet>, CodecError> {
        let timestamp_ms = (seconds.max(0.0) * 1000.0) as u64;
        debug!(timestamp_ms, "seeking");
        self.finished = false;
        self.demuxer.seek_to_timestamp(timestamp_ms)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_inner(self) -> D {
        self.demuxer
    }
}

impl<D: Demuxer> Iterator for DemuxStream<D> {
    type Item = Result<Packet, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.demuxer.next_packet() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}
