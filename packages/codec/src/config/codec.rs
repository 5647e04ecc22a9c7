//! Codec-specific configuration.

use serde::Serialize;
use tracing::warn;

use super::options::EncoderOptions;
use super::vui::VuiConfig;
use super::ParentFlags;
use crate::{Codec, CodecError, PixelFormat, Profile};

/// Largest reference list length the encoder accepts.
pub const MAX_NUM_REFS: u32 = 6;

/// Chroma subsampling signalled in the bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum ChromaFormat {
    Yuv420 = 1,
    Yuv444 = 3,
}

impl Default for ChromaFormat {
    fn default() -> Self {
        Self::Yuv420
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BitDepth {
    Eight,
    Ten,
}

impl Default for BitDepth {
    fn default() -> Self {
        Self::Eight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct H264Config {
    pub chroma_format: ChromaFormat,
    pub idr_period: u32,
    pub slice_mode: u32,
    pub slice_mode_data: u32,
    pub repeat_sps_pps: bool,
    /// 0 lets the encoder choose.
    pub num_ref_l0: u32,
    pub num_ref_l1: u32,
    pub vui: VuiConfig,
}

impl Default for H264Config {
    fn default() -> Self {
        Self {
            chroma_format: ChromaFormat::Yuv420,
            idr_period: 0,
            slice_mode: 3,
            slice_mode_data: 1,
            repeat_sps_pps: false,
            num_ref_l0: 0,
            num_ref_l1: 0,
            vui: VuiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HevcConfig {
    pub chroma_format: ChromaFormat,
    pub input_bit_depth: BitDepth,
    pub output_bit_depth: BitDepth,
    pub idr_period: u32,
    pub slice_mode: u32,
    pub slice_mode_data: u32,
    pub repeat_sps_pps: bool,
    pub num_ref_l0: u32,
    pub num_ref_l1: u32,
    pub vui: VuiConfig,
}

/// AV1 carries its colour description in the sequence header rather than a
/// VUI, but the fields are the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Av1Config {
    pub chroma_format: ChromaFormat,
    pub input_bit_depth: BitDepth,
    pub output_bit_depth: BitDepth,
    pub idr_period: u32,
    pub repeat_seq_hdr: bool,
    pub num_fwd_refs: u32,
    pub num_bwd_refs: u32,
    pub level_autoselect: bool,
    pub vui: VuiConfig,
}

impl Default for Av1Config {
    fn default() -> Self {
        Self {
            chroma_format: ChromaFormat::Yuv420,
            input_bit_depth: BitDepth::Eight,
            output_bit_depth: BitDepth::Eight,
            idr_period: 0,
            repeat_seq_hdr: false,
            num_fwd_refs: 0,
            num_bwd_refs: 0,
            level_autoselect: true,
            vui: VuiConfig::default(),
        }
    }
}

/// Configuration of exactly one codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodecConfig {
    H264(H264Config),
    Hevc(HevcConfig),
    Av1(Av1Config),
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::H264(H264Config::default())
    }
}

impl CodecConfig {
    /// Defaults of `codec`.
    #[must_use]
    pub fn for_codec(codec: Codec) -> Self {
        match codec {
            Codec::H264 => Self::H264(H264Config::default()),
            Codec::Hevc => Self::Hevc(HevcConfig::default()),
            Codec::Av1 => Self::Av1(Av1Config::default()),
        }
    }

    #[must_use]
    pub fn codec(&self) -> Codec {
        match self {
            Self::H264(_) => Codec::H264,
            Self::Hevc(_) => Codec::Hevc,
            Self::Av1(_) => Codec::Av1,
        }
    }

    #[must_use]
    pub fn chroma_format(&self) -> ChromaFormat {
        match self {
            Self::H264(c) => c.chroma_format,
            Self::Hevc(c) => c.chroma_format,
            Self::Av1(c) => c.chroma_format,
        }
    }

    #[must_use]
    pub fn idr_period(&self) -> u32 {
        match self {
            Self::H264(c) => c.idr_period,
            Self::Hevc(c) => c.idr_period,
            Self::Av1(c) => c.idr_period,
        }
    }

    #[must_use]
    pub fn vui(&self) -> &VuiConfig {
        match self {
            Self::H264(c) => &c.vui,
            Self::Hevc(c) => &c.vui,
            Self::Av1(c) => &c.vui,
        }
    }

    /// Profile implied by the chroma format.
    #[must_use]
    pub fn profile(&self) -> Profile {
        match (self, self.chroma_format()) {
            (Self::H264(_), ChromaFormat::Yuv444) => Profile::H264High444,
            (Self::Hevc(_), ChromaFormat::Yuv444) => Profile::HevcFrext,
            _ => Profile::Autoselect,
        }
    }

    /// Apply format, GOP structure, reference and VUI options.
    ///
    /// `gop_length` becomes the IDR period unless `idrperiod` is given.
    pub(crate) fn apply_options(
        &mut self,
        options: &EncoderOptions,
        flags: &ParentFlags,
        gop_length: u32,
    ) -> Result<(), CodecError> {
        let format = options
            .get("fmt")
            .map(PixelFormat::from_name)
            .transpose()?;
        let chroma_format = match format {
            Some(f) if f.is_yuv444() => ChromaFormat::Yuv444,
            _ => ChromaFormat::Yuv420,
        };
        let bit_depth = match format {
            Some(f) if f.is_ten_bit() => BitDepth::Ten,
            _ => BitDepth::Eight,
        };
        let idr_period = options.number("idrperiod")?.unwrap_or(gop_length);
        let repeat_headers = options.number::<u32>("repeatspspps")?.map(|v| v != 0);
        let num_ref_l0 = num_refs(options, "numrefl0")?;
        let num_ref_l1 = num_refs(options, "numrefl1")?;
        let slice_mode = options.number::<u32>("slice_mode")?;
        let slice_data = options.number::<u32>("slice_data")?;
        let vui = VuiConfig::from_options(options)?;

        match self {
            Self::H264(c) => {
                c.chroma_format = chroma_format;
                c.idr_period = idr_period;
                c.slice_mode = slice_mode.unwrap_or(3);
                c.slice_mode_data = slice_data.unwrap_or(1);
                c.repeat_sps_pps = repeat_headers.unwrap_or(c.repeat_sps_pps);
                c.num_ref_l0 = num_ref_l0.unwrap_or(c.num_ref_l0);
                c.num_ref_l1 = num_ref_l1.unwrap_or(c.num_ref_l1);
                c.vui = vui;
            }
            Self::Hevc(c) => {
                c.chroma_format = chroma_format;
                c.input_bit_depth = bit_depth;
                c.output_bit_depth = bit_depth;
                c.idr_period = idr_period;
                c.slice_mode = slice_mode.unwrap_or(c.slice_mode);
                c.slice_mode_data = slice_data.unwrap_or(c.slice_mode_data);
                c.repeat_sps_pps = repeat_headers.unwrap_or(c.repeat_sps_pps);
                c.num_ref_l0 = num_ref_l0.unwrap_or(c.num_ref_l0);
                c.num_ref_l1 = num_ref_l1.unwrap_or(c.num_ref_l1);
                c.vui = vui;
            }
            Self::Av1(c) => {
                c.chroma_format = chroma_format;
                c.input_bit_depth = bit_depth;
                c.output_bit_depth = bit_depth;
                c.idr_period = idr_period;
                c.repeat_seq_hdr = repeat_headers.unwrap_or(c.repeat_seq_hdr);
                c.num_fwd_refs = num_ref_l0.unwrap_or(c.num_fwd_refs);
                c.num_bwd_refs = num_ref_l1.unwrap_or(c.num_bwd_refs);
                c.level_autoselect = true;
                c.vui = vui;
            }
        }

        if chroma_format == ChromaFormat::Yuv444 && flags.codec == Codec::Av1 {
            warn!("4:4:4 input is not supported by AV1 encoding");
        }
        Ok(())
    }
}

fn num_refs(options: &EncoderOptions, key: &str) -> Result<Option<u32>, CodecError> {
    Ok(options.number::<u32>(key)?.and_then(|n| {
        if (1..=MAX_NUM_REFS).contains(&n) {
            Some(n)
        } else {
            warn!(option = key, value = n, "reference count must be within 1..=6, ignoring");
            None
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(codec: Codec) -> ParentFlags {
        ParentFlags {
            codec,
            modern: true,
            low_latency: false,
            lossless: false,
        }
    }

    fn resolve(codec: Codec, options: EncoderOptions, gop: u32) -> CodecConfig {
        let mut config = CodecConfig::for_codec(codec);
        config.apply_options(&options, &flags(codec), gop).unwrap();
        config
    }

    #[test]
    fn test_h264_defaults() {
        let CodecConfig::H264(c) = resolve(Codec::H264, EncoderOptions::new(), 60) else {
            panic!("expected h264 config");
        };
        assert_eq!(c.slice_mode, 3);
        assert_eq!(c.slice_mode_data, 1);
        assert_eq!(c.chroma_format, ChromaFormat::Yuv420);
        assert_eq!(c.idr_period, 60);
    }

    #[test]
    fn test_yuv444_profiles() {
        let opts = EncoderOptions::new().set("fmt", "YUV444");
        let h264 = resolve(Codec::H264, opts.clone(), 30);
        assert_eq!(h264.chroma_format(), ChromaFormat::Yuv444);
        assert_eq!(h264.profile(), Profile::H264High444);

        let hevc = resolve(Codec::Hevc, opts.set("fmt", "YUV444_10BIT"), 30);
        assert_eq!(hevc.profile(), Profile::HevcFrext);
        let CodecConfig::Hevc(c) = hevc else {
            panic!("expected hevc config");
        };
        assert_eq!(c.output_bit_depth, BitDepth::Ten);
    }

    #[test]
    fn test_ten_bit_av1() {
        let CodecConfig::Av1(c) = resolve(Codec::Av1, EncoderOptions::new().set("fmt", "P010"), 30)
        else {
            panic!("expected av1 config");
        };
        assert_eq!(c.input_bit_depth, BitDepth::Ten);
        assert_eq!(c.chroma_format, ChromaFormat::Yuv420);
        assert!(c.level_autoselect);
    }

    #[test]
    fn test_idr_and_refs() {
        let opts = EncoderOptions::new()
            .set("idrperiod", "120")
            .set("numrefl0", "4")
            .set("numrefl1", "9")
            .set("repeatspspps", "1");
        let CodecConfig::Hevc(c) = resolve(Codec::Hevc, opts, 30) else {
            panic!("expected hevc config");
        };
        assert_eq!(c.idr_period, 120);
        assert_eq!(c.num_ref_l0, 4);
        assert_eq!(c.num_ref_l1, 0);
        assert!(c.repeat_sps_pps);
    }

    #[test]
    fn test_slice_options() {
        let opts = EncoderOptions::new().set("slice_mode", "1").set("slice_data", "1500");
        let CodecConfig::H264(c) = resolve(Codec::H264, opts, 30) else {
            panic!("expected h264 config");
        };
        assert_eq!((c.slice_mode, c.slice_mode_data), (1, 1500));
    }

    #[test]
    fn test_unknown_fmt() {
        let mut config = CodecConfig::for_codec(Codec::H264);
        let err = config
            .apply_options(&EncoderOptions::new().set("fmt", "RGB565"), &flags(Codec::H264), 30)
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownPixelFormat(_)));
    }
}
