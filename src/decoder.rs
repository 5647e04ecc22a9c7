//! Decoder session.

use nvvc_codec::frame::{assemble, FrameDescriptor};
use nvvc_codec::layout;
use nvvc_codec::provider::{DecodeProvider, DecodedSurface};
use nvvc_codec::{CodecError, PixelFormat, StreamHandle};
use tracing::debug;

use crate::demuxer::Packet;

/// A hardware decoder session producing multi-plane frame views.
///
/// The returned descriptors point into the decoder's output pool and are
/// only valid until the pool cycles back to the same surface. Copy or
/// consume them before decoding much further.
pub struct Decoder<P: DecodeProvider> {
    provider: P,
    consumer_stream: Option<StreamHandle>,
}

impl<P: DecodeProvider> Decoder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            consumer_stream: None,
        }
    }

    /// Order decoded output before work on `stream`.
    ///
    /// Without a consumer stream the decoder's own stream is exported with
    /// every plane, or the decoder is synchronized when it has none.
    #[must_use]
    pub fn with_consumer_stream(mut self, stream: StreamHandle) -> Self {
        self.consumer_stream = Some(stream);
        self
    }

    /// Decode one packet.
    pub fn decode(&mut self, packet: &Packet) -> Result<Vec<FrameDescriptor>, CodecError> {
        let surfaces = self.provider.decode(&packet.data, packet.pts)?;
        if surfaces.is_empty() {
            return Ok(Vec::new());
        }
        self.sync_output()?;
        debug!(count = surfaces.len(), pts = packet.pts, "decoded frames");
        surfaces.into_iter().map(|s| self.describe(s)).collect()
    }

    /// Drain frames still held by the decoder.
    pub fn flush(&mut self) -> Result<Vec<FrameDescriptor>, CodecError> {
        self.decode(&Packet::end_of_stream())
    }

    /// Take the next decoded frame out of the output rotation.
    ///
    /// The frame stays valid until passed to [`Decoder::unlock_frame`].
    pub fn locked_frame(&mut self) -> Result<Option<FrameDescriptor>, CodecError> {
        match self.provider.lock_frame()? {
            Some(surface) => {
                self.sync_output()?;
                self.describe(surface).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Return a frame taken with [`Decoder::locked_frame`].
    pub fn unlock_frame(&mut self, frame: &FrameDescriptor) -> Result<(), CodecError> {
        self.provider.unlock_frame(frame.data())
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.provider.surface_format().pixel_format()
    }

    pub fn width(&self) -> u32 {
        self.provider.width()
    }

    pub fn height(&self) -> u32 {
        self.provider.height()
    }

    pub fn bit_depth(&self) -> u32 {
        self.provider.bit_depth()
    }

    /// Bytes of one contiguous output frame.
    pub fn frame_size(&self) -> Result<usize, CodecError> {
        layout::frame_size(self.pixel_format(), self.width(), self.height())
    }

    /// Make `stream` wait for the decoder's output work.
    pub fn wait_on_stream(&mut self, stream: StreamHandle) -> Result<(), CodecError> {
        self.provider.wait_on_stream(stream)
    }

    /// Block until the decoder's output work is done.
    pub fn synchronize(&mut self) -> Result<(), CodecError> {
        self.provider.synchronize()
    }

    /// The underlying hardware session.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    fn sync_output(&mut self) -> Result<(), CodecError> {
        match (self.consumer_stream, self.provider.stream()) {
            (Some(stream), _) => self.provider.wait_on_stream(stream),
            (None, Some(_)) => Ok(()),
            (None, None) => self.provider.synchronize(),
        }
    }

    fn describe(&self, surface: DecodedSurface) -> Result<FrameDescriptor, CodecError> {
        assemble(
            surface.ptr,
            self.pixel_format(),
            self.width(),
            self.height(),
            surface.timestamp,
            self.provider.stream(),
            self.provider.device(),
        )
    }
}
