//! Core types for video encoding/decoding.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::Serialize;
use tracing::warn;

use crate::CodecError;

lazy_static! {
    static ref CODECS: HashMap<&'static str, Codec> = [
        ("h264", Codec::H264),
        ("hevc", Codec::Hevc),
        ("av1", Codec::Av1),
    ]
    .into_iter()
    .collect();

    static ref PRESETS: HashMap<&'static str, PresetProperties> = [
        ("P1", PresetProperties::new(Preset::P1)),
        ("P2", PresetProperties::new(Preset::P2)),
        ("P3", PresetProperties::new(Preset::P3)),
        ("P4", PresetProperties::new(Preset::P4)),
        ("P5", PresetProperties::new(Preset::P5)),
        ("P6", PresetProperties::new(Preset::P6)),
        ("P7", PresetProperties::new(Preset::P7)),
    ]
    .into_iter()
    .collect();

    static ref RC_MODES: HashMap<&'static str, RateControlMode> = [
        ("constqp", RateControlMode::ConstQp),
        ("vbr", RateControlMode::Vbr),
        ("cbr", RateControlMode::Cbr),
    ]
    .into_iter()
    .collect();
}

/// Video codec type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Codec {
    /// H.264/AVC codec.
    H264,
    /// H.265/HEVC codec.
    Hevc,
    /// AV1 codec.
    Av1,
}

impl Codec {
    /// Look up a codec by its option name (`h264`, `hevc`, `av1`).
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        CODECS
            .get(name)
            .copied()
            .ok_or_else(|| CodecError::InvalidCodec(name.to_string()))
    }

    /// Option name of the codec.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Av1 => "av1",
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::H264
    }
}

/// Encoder preset, P1 (fastest) to P7 (slowest, best quality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Preset {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
    P7,
}

impl Default for Preset {
    fn default() -> Self {
        Self::P4
    }
}

/// Static properties attached to a preset.
///
/// `low_latency` and `lossless` are the parent flags the rest of the
/// resolution reads; tuning info may raise them later. Every P-preset is
/// `modern`, meaning it is fetched together with a tuning info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetProperties {
    pub preset: Preset,
    pub low_latency: bool,
    pub lossless: bool,
    pub modern: bool,
}

impl PresetProperties {
    fn new(preset: Preset) -> Self {
        Self {
            preset,
            low_latency: false,
            lossless: false,
            modern: true,
        }
    }

    /// Look up preset properties by name.
    ///
    /// Unknown names are not an error: they log and fall back to the
    /// default preset.
    #[must_use]
    pub fn lookup(name: &str) -> Self {
        match PRESETS.get(name) {
            Some(props) => *props,
            None => {
                warn!(preset = name, "preset not found, using default P4");
                Self::new(Preset::default())
            }
        }
    }
}

/// Tuning info for modern presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TuningInfo {
    /// No tuning; the preset config is fetched without one.
    Undefined,
    HighQuality,
    LowLatency,
    UltraLowLatency,
    Lossless,
    UltraHighQuality,
}

impl TuningInfo {
    /// Parse a `tuning_info` option value. Unknown names map to `Undefined`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "high_quality" => Self::HighQuality,
            "low_latency" => Self::LowLatency,
            "ultra_low_latency" => Self::UltraLowLatency,
            "lossless" => Self::Lossless,
            "uhq" => Self::UltraHighQuality,
            _ => Self::Undefined,
        }
    }

    /// Whether this tuning implies the low-latency parent flag.
    #[must_use]
    pub fn is_low_latency(&self) -> bool {
        matches!(self, Self::LowLatency | Self::UltraLowLatency)
    }
}

impl Default for TuningInfo {
    fn default() -> Self {
        Self::Undefined
    }
}

/// Multi-pass encoding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MultiPass {
    Disabled,
    /// Two passes, first pass at quarter resolution.
    QuarterResolution,
    /// Two passes, both at full resolution.
    FullResolution,
}

impl MultiPass {
    /// Parse a `multipass` option value. Anything but `qres`/`fullres` disables it.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "qres" => Self::QuarterResolution,
            "fullres" => Self::FullResolution,
            _ => Self::Disabled,
        }
    }
}

impl Default for MultiPass {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Rate control mode for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RateControlMode {
    /// Constant QP - fixed quality, variable bitrate.
    ConstQp,
    /// Variable Bitrate - targets average bitrate.
    Vbr,
    /// Constant Bitrate - strict bitrate control.
    Cbr,
}

impl RateControlMode {
    /// Look up a mode by its option name (`constqp`, `vbr`, `cbr`).
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        RC_MODES
            .get(name)
            .copied()
            .ok_or_else(|| CodecError::InvalidRateControlMode(name.to_string()))
    }
}

impl Default for RateControlMode {
    fn default() -> Self {
        Self::ConstQp
    }
}

/// Encode profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Profile {
    /// Let the driver pick.
    Autoselect,
    /// H.264 High 4:4:4 Predictive, required for 4:4:4 input.
    H264High444,
    /// HEVC Format Range Extensions, required for 4:4:4 input.
    HevcFrext,
}

impl Default for Profile {
    fn default() -> Self {
        Self::Autoselect
    }
}

/// Pixel format of a video frame.
///
/// Fixes plane count, element width, chroma subsampling and whether the
/// frame is packed or planar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelFormat {
    /// 8-bit 4:2:0, Y plane + interleaved UV plane.
    Nv12,
    /// 16-bit container 4:2:0 (P010/P016), Y plane + interleaved UV plane.
    P010,
    /// 8-bit 4:4:4, three full planes.
    Yuv444,
    /// 16-bit container 4:4:4 (10 or 16 significant bits), three full planes.
    Yuv444P16,
    /// 8-bit 4:2:0, Y + U + V planes (YUV420).
    Yv12,
    /// Packed 8-bit ARGB.
    Argb,
    /// Packed 8-bit ABGR.
    Abgr,
    /// Packed 10-bit ARGB.
    Argb10,
    /// Packed 10-bit ABGR.
    Abgr10,
    /// Unknown surface format.
    Undefined,
}

impl PixelFormat {
    /// Parse an encoder format name.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "NV12" => Ok(Self::Nv12),
            "P010" | "P016" => Ok(Self::P010),
            "YUV444" => Ok(Self::Yuv444),
            "YUV444_10BIT" | "YUV444_16BIT" => Ok(Self::Yuv444P16),
            "YUV420" | "YV12" => Ok(Self::Yv12),
            "ARGB" => Ok(Self::Argb),
            "ABGR" => Ok(Self::Abgr),
            "ARGB10" => Ok(Self::Argb10),
            "ABGR10" => Ok(Self::Abgr10),
            _ => Err(CodecError::UnknownPixelFormat(name.to_string())),
        }
    }

    /// Canonical option name, as understood by the `fmt` option.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nv12 => "NV12",
            Self::P010 => "P010",
            Self::Yuv444 => "YUV444",
            Self::Yuv444P16 => "YUV444_10BIT",
            Self::Yv12 => "YUV420",
            Self::Argb => "ARGB",
            Self::Abgr => "ABGR",
            Self::Argb10 => "ARGB10",
            Self::Abgr10 => "ABGR10",
            Self::Undefined => "UNDEFINED",
        }
    }

    /// Number of planes, 0 for `Undefined`.
    #[must_use]
    pub fn plane_count(&self) -> usize {
        match self {
            Self::Nv12 | Self::P010 => 2,
            Self::Yuv444 | Self::Yuv444P16 | Self::Yv12 => 3,
            Self::Argb | Self::Abgr | Self::Argb10 | Self::Abgr10 => 1,
            Self::Undefined => 0,
        }
    }

    /// Element type of every plane.
    #[must_use]
    pub fn element(&self) -> ElementType {
        match self {
            Self::P010 | Self::Yuv444P16 => ElementType::U16,
            _ => ElementType::U8,
        }
    }

    /// Returns true for interleaved RGBA formats.
    #[must_use]
    pub fn is_packed(&self) -> bool {
        matches!(self, Self::Argb | Self::Abgr | Self::Argb10 | Self::Abgr10)
    }

    /// Returns true for formats carrying more than 8 significant bits.
    #[must_use]
    pub fn is_ten_bit(&self) -> bool {
        matches!(self, Self::P010 | Self::Yuv444P16 | Self::Argb10 | Self::Abgr10)
    }

    /// Returns true for 4:4:4 planar formats.
    #[must_use]
    pub fn is_yuv444(&self) -> bool {
        matches!(self, Self::Yuv444 | Self::Yuv444P16)
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::Nv12
    }
}

/// Output surface format reported by the hardware decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    Nv12,
    P016,
    Yuv444,
    Yuv444P16,
    /// Anything this crate has no layout for.
    Other(i32),
}

impl SurfaceFormat {
    /// Pixel format used to lay out frames of this surface.
    #[must_use]
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            Self::Nv12 => PixelFormat::Nv12,
            Self::P016 => PixelFormat::P010,
            Self::Yuv444 => PixelFormat::Yuv444,
            Self::Yuv444P16 => PixelFormat::Yuv444P16,
            Self::Other(_) => PixelFormat::Undefined,
        }
    }
}

/// Element type of a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ElementType {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit, little endian.
    U16,
}

impl ElementType {
    /// Size of one element in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }

    /// Array interface type string.
    #[must_use]
    pub fn typestr(&self) -> &'static str {
        match self {
            Self::U8 => "|u1",
            Self::U16 => "<u2",
        }
    }

    /// Whether a declared type string denotes this element type.
    ///
    /// Accepts array interface strings with any byte-order mark and the
    /// single-character buffer protocol codes.
    #[must_use]
    pub fn accepts(&self, typestr: &str) -> bool {
        match self {
            Self::U8 => matches!(typestr, "|u1" | "<u1" | "u1" | "B"),
            Self::U16 => matches!(typestr, "<u2" | "|u2" | "u2" | "H"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_lookup() {
        assert_eq!(Codec::from_name("av1").unwrap(), Codec::Av1);
        assert!(matches!(Codec::from_name("vp9"), Err(CodecError::InvalidCodec(_))));
        assert_eq!(Codec::default(), Codec::H264);
    }

    #[test]
    fn test_preset_fallback() {
        assert_eq!(PresetProperties::lookup("P7").preset, Preset::P7);
        let fallback = PresetProperties::lookup("slow");
        assert_eq!(fallback.preset, Preset::P4);
        assert!(fallback.modern);
    }

    #[test]
    fn test_rc_mode_lookup() {
        assert_eq!(RateControlMode::from_name("vbr").unwrap(), RateControlMode::Vbr);
        assert!(RateControlMode::from_name("abr").is_err());
    }

    #[test]
    fn test_pixel_format_names() {
        assert_eq!(PixelFormat::from_name("YUV444_16BIT").unwrap(), PixelFormat::Yuv444P16);
        assert_eq!(PixelFormat::from_name("YUV420").unwrap(), PixelFormat::Yv12);
        assert_eq!(PixelFormat::from_name("P016").unwrap(), PixelFormat::P010);
        assert!(PixelFormat::from_name("RGB").is_err());
        for name in ["NV12", "P010", "YUV444", "YUV444_10BIT", "YUV420", "ARGB", "ABGR", "ARGB10", "ABGR10"] {
            assert_eq!(PixelFormat::from_name(name).unwrap().name(), name);
        }
    }

    #[test]
    fn test_surface_mapping() {
        assert_eq!(SurfaceFormat::P016.pixel_format(), PixelFormat::P010);
        assert_eq!(SurfaceFormat::Other(7).pixel_format(), PixelFormat::Undefined);
    }

    #[test]
    fn test_element_typestr() {
        assert!(ElementType::U8.accepts("B"));
        assert!(ElementType::U16.accepts("|u2"));
        assert!(!ElementType::U8.accepts("<u2"));
        assert_eq!(ElementType::U16.size(), 2);
    }
}
