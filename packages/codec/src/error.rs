//! Error types for video codec operations.

use thiserror::Error;

use crate::types::PixelFormat;

/// Broad category of a [`CodecError`].
///
/// Callers that only need to decide whether a failure is their fault (bad
/// options, bad buffers) or a bug/driver problem can match on this instead of
/// on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad codec/preset/resolution/bitrate or other option strings.
    Configuration,
    /// Shape, stride, dtype or device disagreement.
    LayoutMismatch,
    /// Interchange protocol misuse: stream 0, missing protocols, plane ordering.
    ProtocolViolation,
    /// An opaque driver collaborator reported failure.
    CapabilityProvider,
    /// Broken internal bookkeeping. Never expected in correct operation.
    InternalConsistency,
}

/// Errors that can occur during video encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Codec name not in {h264, hevc, av1}.
    #[error("invalid codec given: {0}. Choose between av1, h264 and hevc")]
    InvalidCodec(String),

    /// Resolution string is not `WxH` or `W,H`.
    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    /// Frame rate string is not a decimal number.
    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(String),

    /// Bitrate string could not be parsed.
    #[error("can't parse bitrate string: {0}")]
    InvalidBitrate(String),

    /// Numeric option that failed to parse.
    #[error("invalid value {value:?} for option {key}")]
    InvalidOption { key: String, value: String },

    /// Rate control mode not in {constqp, vbr, cbr}.
    #[error("invalid rate control mode: {0}")]
    InvalidRateControlMode(String),

    /// Pixel format name not accepted by the encoder.
    #[error(
        "unsupported format {0}. Supported formats: NV12, ARGB, ABGR, P010, YUV444, YUV444_10BIT, YUV420"
    )]
    UnknownPixelFormat(String),

    /// Invalid frame dimensions.
    #[error("invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Plane index outside the format's plane count.
    #[error("{format:?} cannot have more than {planes} planes, got plane index {plane}")]
    InvalidPlaneIndex {
        format: PixelFormat,
        plane: usize,
        planes: usize,
    },

    /// Format has no layout, or the operation does not support it.
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    /// Declared element type string disagrees with the format.
    #[error("invalid type string: {found}, expected: {expected}")]
    FormatMismatch { expected: &'static str, found: String },

    /// Declared shape disagrees with the format.
    #[error("invalid shape: {found:?}, expected: {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Declared strides disagree with the format.
    #[error("invalid strides: {found:?}, expected: {expected:?}")]
    StrideMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A size that must follow from the frame dimensions does not.
    #[error("{what}: expected {expected}, got {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A plane address computed from a base pointer does not fit in 64 bits.
    #[error("plane offset {offset} overflows base address {base:#x}")]
    AddressOverflow { base: u64, offset: usize },

    /// Buffer was allocated on another device.
    #[error("buffer lives on device {found} but the session uses device {expected}")]
    DeviceMismatch { expected: i32, found: i32 },

    /// Stream 0 is disallowed by the CUDA array interface.
    #[error("stream 0 is disallowed by the CUDA array interface, use 1 or 2 for the default stream")]
    InvalidStream,

    /// Plane base addresses are not strictly increasing.
    #[error("plane {plane} at {found:#x} must start after the previous plane at {previous:#x}")]
    InvalidPlaneOrder { plane: usize, previous: u64, found: u64 },

    /// The frame object exposes no buffer protocol this format can use.
    #[error("frame object exposes no supported buffer protocol")]
    UnsupportedInputType,

    /// Plane list has the wrong length.
    #[error("expected {expected} planes, got {found}")]
    MissingPlanes { expected: usize, found: usize },

    /// Host buffer submitted to an encoder created without host input.
    #[error("host input buffers are not enabled for this encoder")]
    HostInputDisabled,

    /// DLPack device is not reachable from CUDA.
    #[error("tensor device type {0} is not CUDA accessible")]
    InaccessibleDevice(i32),

    /// Opaque collaborator failure, with its status code.
    #[error("{operation} failed with status {status}")]
    Provider { operation: &'static str, status: i32 },

    /// CUDA error.
    #[error("CUDA error: {0}")]
    CudaError(String),

    /// Sequence number already pending in the timestamp ledger.
    #[error("[BUG] frame sequence {0} submitted twice")]
    DuplicateSequence(u64),

    /// Sequence number missing from the timestamp ledger.
    #[error("[BUG] frame sequence {0} not found in timestamp ledger")]
    UnknownSequence(u64),
}

impl CodecError {
    /// Create an InvalidOption error.
    pub fn invalid_option(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Provider error carrying the collaborator's status code.
    pub fn provider(operation: &'static str, status: i32) -> Self {
        Self::Provider { operation, status }
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCodec(_)
            | Self::InvalidResolution(_)
            | Self::InvalidFrameRate(_)
            | Self::InvalidBitrate(_)
            | Self::InvalidOption { .. }
            | Self::InvalidRateControlMode(_)
            | Self::UnknownPixelFormat(_) => ErrorKind::Configuration,
            Self::InvalidDimensions { .. }
            | Self::InvalidPlaneIndex { .. }
            | Self::UnsupportedFormat(_)
            | Self::FormatMismatch { .. }
            | Self::ShapeMismatch { .. }
            | Self::StrideMismatch { .. }
            | Self::DimensionMismatch { .. }
            | Self::AddressOverflow { .. }
            | Self::DeviceMismatch { .. } => ErrorKind::LayoutMismatch,
            Self::InvalidStream
            | Self::InvalidPlaneOrder { .. }
            | Self::UnsupportedInputType
            | Self::MissingPlanes { .. }
            | Self::HostInputDisabled
            | Self::InaccessibleDevice(_) => ErrorKind::ProtocolViolation,
            Self::Provider { .. } | Self::CudaError(_) => ErrorKind::CapabilityProvider,
            Self::DuplicateSequence(_) | Self::UnknownSequence(_) => {
                ErrorKind::InternalConsistency
            }
        }
    }
}
