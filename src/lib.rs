//! GPU video encode, decode and demux sessions.
//!
//! The sessions here wire the primitives of [`nvvc_codec`] to a hardware
//! provider: [`Encoder`] stages caller frames and keeps timestamps across
//! reordering, [`Decoder`] turns decoder output into multi-plane views, and
//! [`DemuxStream`] iterates the packets of a container.
//!
//! # Quick Start (Encoding)
//!
//! ```ignore
//! use nvvc::{Encoder, EncoderSettings};
//! use nvvc::codec::{CudaPointerAttributes, PixelFormat};
//!
//! let settings = EncoderSettings::new(1920, 1080)
//!     .format(PixelFormat::Nv12)
//!     .option("codec", "hevc")
//!     .option("tuning_info", "low_latency")
//!     .option("bitrate", "4M");
//!
//! let mut encoder = Encoder::new(settings, provider, Box::new(CudaPointerAttributes::new(0)?))?;
//! for packet in encoder.encode(&frame, None)? {
//!     // packet.timestamp is the timestamp the frame was submitted with
//! }
//! let tail = encoder.end_encode()?;
//! ```

pub mod decoder;
pub mod demuxer;
pub mod encoder;

pub use decoder::Decoder;
pub use demuxer::{ColorRange, ColorSpace, DemuxStream, Demuxer, Packet, StreamMetadata};
pub use encoder::{Encoder, EncoderSettings};

pub use nvvc_codec as codec;
