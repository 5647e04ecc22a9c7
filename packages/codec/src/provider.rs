//! Interfaces of the driver-side collaborators.
//!
//! Hardware encode/decode and CUDA pointer queries are opaque to this crate.
//! Sessions are generic over these traits; the `nvidia` feature supplies the
//! CUDA-backed pointer query and [`crate::testing`] supplies in-memory fakes.

use crate::config::{EncodeConfig, InitializeParams};
use crate::view::StreamHandle;
use crate::{Codec, CodecError, PixelFormat, Preset, SurfaceFormat, TuningInfo};

/// Pointer attribute queries.
pub trait PointerAttributes {
    /// CUDA device ordinal of the allocation `ptr` points into.
    fn device_ordinal(&self, ptr: u64) -> Result<i32, CodecError>;
}

/// Encoder capabilities the resolver may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeCapability {
    /// Whether the encoder can signal completion through events.
    AsyncEncodeSupport,
    /// Whether 4:4:4 input is supported.
    Yuv444Encode,
    /// Whether 10-bit input is supported.
    TenBitEncode,
}

/// Read-only queries answered by the encoder driver.
pub trait CapabilityProvider {
    /// Value of a capability for `codec`.
    fn capability(&self, codec: Codec, capability: EncodeCapability) -> Result<i32, CodecError>;

    /// Base configuration of a preset.
    ///
    /// `tuning` is [`TuningInfo::Undefined`] when the preset is fetched
    /// without tuning info.
    fn preset_config(
        &self,
        codec: Codec,
        preset: Preset,
        tuning: TuningInfo,
    ) -> Result<EncodeConfig, CodecError>;
}

/// Where the source of a frame copy lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySource<'a> {
    /// Device pointer to the luma plane.
    Device(u64),
    /// Row-major host buffer.
    Host(&'a [u8]),
}

/// A writable input buffer owned by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot {
    pub ptr: u64,
    pub pitch: usize,
}

/// Arguments of one frame copy into an input slot.
///
/// `chroma_offsets` are byte offsets of the chroma planes relative to the
/// source luma pointer; their count is the number of chroma planes copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCopy<'a> {
    pub source: CopySource<'a>,
    pub src_pitch: usize,
    pub chroma_offsets: Vec<usize>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Bitstream produced for one submitted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Sequence number the frame was submitted with.
    pub sequence: u64,
    pub data: Vec<u8>,
}

/// Handle returned when registering an external device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(pub u64);

/// Hardware encoder session.
///
/// Implemented for `&mut E` as well, so a session can borrow its provider.
pub trait EncodeProvider: CapabilityProvider {
    /// Create the session with fully resolved parameters.
    fn initialize(&mut self, params: &InitializeParams) -> Result<(), CodecError>;

    /// Parameters the live session is running with.
    fn initialize_params(&self) -> Result<InitializeParams, CodecError>;

    /// Next free input buffer.
    fn next_input_slot(&mut self) -> Result<InputSlot, CodecError>;

    /// Copy a frame into `slot`.
    fn copy_into_input_slot(
        &mut self,
        slot: &InputSlot,
        copy: &FrameCopy<'_>,
    ) -> Result<(), CodecError>;

    /// Encode the most recently filled slot, tagged with `sequence`.
    fn submit(&mut self, sequence: u64) -> Result<(), CodecError>;

    /// Packets completed so far, in output order.
    fn drain(&mut self) -> Result<Vec<EncodedPacket>, CodecError>;

    /// Signal end of stream and return every remaining packet.
    fn flush(&mut self) -> Result<Vec<EncodedPacket>, CodecError>;

    /// Apply new parameters to the live session. Returns the driver's verdict.
    fn reconfigure(&mut self, params: &InitializeParams) -> Result<bool, CodecError>;

    /// Register an external device buffer as an input resource.
    fn register_resource(
        &mut self,
        ptr: u64,
        pitch: usize,
        format: PixelFormat,
    ) -> Result<RegistrationHandle, CodecError>;

    /// Release a registration made with [`EncodeProvider::register_resource`].
    fn unregister_resource(&mut self, handle: RegistrationHandle) -> Result<(), CodecError>;
}

/// A decoded surface in the decoder's output pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedSurface {
    pub ptr: u64,
    pub timestamp: i64,
}

/// Hardware decoder session.
pub trait DecodeProvider {
    /// Decode one bitstream packet, returning the frames ready for display.
    fn decode(&mut self, data: &[u8], pts: i64) -> Result<Vec<DecodedSurface>, CodecError>;

    /// Output surface format.
    fn surface_format(&self) -> SurfaceFormat;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Number of chroma planes of the output surface.
    fn chroma_planes(&self) -> usize;

    fn bit_depth(&self) -> u32;

    /// Row pitch of the output surface in bytes.
    fn pitch(&self) -> usize;

    /// Stream the decoder posts its output work on.
    fn stream(&self) -> Option<StreamHandle>;

    /// Device ordinal of the output pool.
    fn device(&self) -> i32;

    /// Take the next decoded frame and keep it out of the rotation until unlocked.
    fn lock_frame(&mut self) -> Result<Option<DecodedSurface>, CodecError>;

    /// Return a locked frame to the rotation.
    fn unlock_frame(&mut self, ptr: u64) -> Result<(), CodecError>;

    /// Make `stream` wait until the decoder's output work is done.
    fn wait_on_stream(&mut self, stream: StreamHandle) -> Result<(), CodecError>;

    /// Block until the decoder's output work is done.
    fn synchronize(&mut self) -> Result<(), CodecError>;
}

impl<C: CapabilityProvider + ?Sized> CapabilityProvider for &mut C {
    fn capability(&self, codec: Codec, capability: EncodeCapability) -> Result<i32, CodecError> {
        (**self).capability(codec, capability)
    }

    fn preset_config(
        &self,
        codec: Codec,
        preset: Preset,
        tuning: TuningInfo,
    ) -> Result<EncodeConfig, CodecError> {
        (**self).preset_config(codec, preset, tuning)
    }
}

impl<E: EncodeProvider + ?Sized> EncodeProvider for &mut E {
    fn initialize(&mut self, params: &InitializeParams) -> Result<(), CodecError> {
        (**self).initialize(params)
    }

    fn initialize_params(&self) -> Result<InitializeParams, CodecError> {
        (**self).initialize_params()
    }

    fn next_input_slot(&mut self) -> Result<InputSlot, CodecError> {
        (**self).next_input_slot()
    }

    fn copy_into_input_slot(
        &mut self,
        slot: &InputSlot,
        copy: &FrameCopy<'_>,
    ) -> Result<(), CodecError> {
        (**self).copy_into_input_slot(slot, copy)
    }

    fn submit(&mut self, sequence: u64) -> Result<(), CodecError> {
        (**self).submit(sequence)
    }

    fn drain(&mut self) -> Result<Vec<EncodedPacket>, CodecError> {
        (**self).drain()
    }

    fn flush(&mut self) -> Result<Vec<EncodedPacket>, CodecError> {
        (**self).flush()
    }

    fn reconfigure(&mut self, params: &InitializeParams) -> Result<bool, CodecError> {
        (**self).reconfigure(params)
    }

    fn register_resource(
        &mut self,
        ptr: u64,
        pitch: usize,
        format: PixelFormat,
    ) -> Result<RegistrationHandle, CodecError> {
        (**self).register_resource(ptr, pitch, format)
    }

    fn unregister_resource(&mut self, handle: RegistrationHandle) -> Result<(), CodecError> {
        (**self).unregister_resource(handle)
    }
}
