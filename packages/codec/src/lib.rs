//! Frame layout, buffer coercion and encoder parameter resolution for
//! NVIDIA hardware video codecs.
//!
//! This crate holds the host-side logic around NVENC/NVDEC sessions. The
//! hardware itself is reached through the traits in [`provider`], so
//! everything here can be exercised without a GPU:
//!
//! - [`layout`]: per-plane shape and strides of every pixel format
//! - [`coerce`]: validation of CUDA array interface descriptors
//! - [`frame`]: multi-plane descriptors over decoder output
//! - [`input`]: locating caller planes and staging them into encoder slots
//! - [`config`]: string options to encoder initialization parameters
//! - [`ledger`]: timestamps across encoder reordering
//! - [`registry`]: registered external input buffers
//!
//! # Quick Start
//!
//! ```
//! use nvvc_codec::{frame, PixelFormat};
//!
//! let frame = frame::assemble(0x1000, PixelFormat::Nv12, 1920, 1080, 0, None, 0).unwrap();
//! let chroma = &frame.planes[1];
//! assert_eq!(chroma.shape, [540, 960, 2]);
//! assert_eq!(chroma.data, 0x1000 + 1920 * 1080);
//! ```
//!
//! # Feature Flags
//!
//! - `nvidia` - CUDA-backed pointer queries (requires the NVIDIA driver)
//! - `test-util` - in-memory providers in [`testing`]

pub mod coerce;
pub mod config;
mod error;
pub mod frame;
pub mod input;
pub mod layout;
pub mod ledger;
pub mod provider;
pub mod registry;
mod types;
pub mod view;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{CodecError, ErrorKind};
pub use frame::FrameDescriptor;
pub use input::{FrameSource, InputAssembler};
pub use ledger::{TimestampLedger, TimestampedPacket};
pub use types::{
    Codec, ElementType, MultiPass, PixelFormat, Preset, PresetProperties, Profile,
    RateControlMode, SurfaceFormat, TuningInfo,
};
pub use view::{ArrayInterface, PlaneView, StreamHandle, TensorView};

// NVIDIA backend
#[cfg(feature = "nvidia")]
pub mod nvidia;

#[cfg(feature = "nvidia")]
pub use nvidia::CudaPointerAttributes;
