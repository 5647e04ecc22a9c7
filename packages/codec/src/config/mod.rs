//! Encoder session parameters and their resolution from string options.
//!
//! [`ConfigResolver`] turns an [`EncoderOptions`] map into fully populated
//! [`InitializeParams`]. Resolution works on a copy and commits only when
//! every step succeeds, so a failed resolve leaves the target untouched.
//!
//! # Example
//!
//! ```
//! use nvvc_codec::config::{ConfigResolver, EncoderOptions, OfflineCapabilities};
//! use nvvc_codec::RateControlMode;
//!
//! let options = EncoderOptions::new()
//!     .set("codec", "hevc")
//!     .set("s", "1920x1080")
//!     .set("tuning_info", "low_latency")
//!     .set("bitrate", "4M");
//! let params = ConfigResolver::new(&options).resolve(&OfflineCapabilities).unwrap();
//! assert_eq!(params.encode_config.rc.mode, RateControlMode::Cbr);
//! ```

mod codec;
mod options;
mod rate_control;
mod vui;

use serde::Serialize;
use tracing::debug;

pub use codec::{Av1Config, BitDepth, ChromaFormat, CodecConfig, H264Config, HevcConfig, MAX_NUM_REFS};
pub use options::{parse_bitrate, parse_frame_rate, parse_qp, parse_resolution, EncoderOptions};
pub use rate_control::{Qp, RateControlConfig, ReconfigureParams, DEFAULT_CONST_QP};
pub use vui::{ColorStandard, VuiConfig, VIDEO_FORMAT_UNSPECIFIED};

use crate::provider::{CapabilityProvider, EncodeCapability};
use crate::{Codec, CodecError, Preset, PresetProperties, Profile, TuningInfo};

/// GOP length meaning "no periodic key frames".
pub const INFINITE_GOP_LENGTH: u32 = 0xffff_ffff;

/// Frame rate used when `fps` is not given.
pub const DEFAULT_FRAME_RATE: (u32, u32) = (30, 1);

/// Everything a hardware encoder session is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializeParams {
    pub codec: Codec,
    pub preset: Preset,
    pub tuning_info: TuningInfo,
    pub encode_width: u32,
    pub encode_height: u32,
    pub dar_width: u32,
    pub dar_height: u32,
    /// Upper bound for later resolution changes; 0 disables them.
    pub max_encode_width: u32,
    pub max_encode_height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    /// Picture type decision is left to the encoder.
    pub enable_ptd: bool,
    pub enable_encode_async: bool,
    pub encode_config: EncodeConfig,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            preset: Preset::default(),
            tuning_info: TuningInfo::Undefined,
            encode_width: 0,
            encode_height: 0,
            dar_width: 0,
            dar_height: 0,
            max_encode_width: 0,
            max_encode_height: 0,
            frame_rate_num: DEFAULT_FRAME_RATE.0,
            frame_rate_den: DEFAULT_FRAME_RATE.1,
            enable_ptd: true,
            enable_encode_async: false,
            encode_config: EncodeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodeConfig {
    pub profile: Profile,
    pub gop_length: u32,
    /// Distance between P frames, taken verbatim from `bf`.
    pub frame_interval_p: i32,
    pub rc: RateControlConfig,
    pub codec_config: CodecConfig,
}

impl EncodeConfig {
    /// Base configuration for `codec` without any preset applied.
    #[must_use]
    pub fn for_codec(codec: Codec) -> Self {
        Self {
            profile: Profile::Autoselect,
            gop_length: INFINITE_GOP_LENGTH,
            frame_interval_p: 1,
            rc: RateControlConfig::initial(false),
            codec_config: CodecConfig::for_codec(codec),
        }
    }
}

/// Flags the preset and tuning choice hand down to later resolution steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParentFlags {
    pub codec: Codec,
    pub modern: bool,
    pub low_latency: bool,
    pub lossless: bool,
}

/// Resolves [`EncoderOptions`] into [`InitializeParams`].
///
/// Recognized options:
///
/// | key | meaning |
/// |-----|---------|
/// | `codec` | `h264` (default), `hevc`, `av1` |
/// | `preset` | `P1`..`P7`, default `P4` |
/// | `tuning_info` | `high_quality` (default), `low_latency`, `ultra_low_latency`, `lossless`, `uhq` |
/// | `s` / `max_res` | `WxH` or `W,H`; an empty `max_res` disables resolution changes |
/// | `fps` | decimal frame rate, two fractional digits kept |
/// | `gop`, `bf`, `idrperiod` | GOP length, P-frame interval, IDR period |
/// | `bitrate`, `maxbitrate`, `vbvbufsize`, `vbvinit` | sizes with `k`/`m` suffixes |
/// | `rc`, `multipass`, `ldkfs`, `cq` | rate control mode and tuning |
/// | `initqp`, `qmin`, `qmax`, `constqp` | one QP or `p,b,i` |
/// | `aq`, `temporalaq`, `lookahead` | adaptive quantization |
/// | `fmt` | input pixel format name |
/// | `repeatspspps`, `numrefl0`, `numrefl1`, `slice_mode`, `slice_data` | bitstream structure |
/// | `colorspace`, `num_unit_in_ticks`, `timescale` | VUI |
pub struct ConfigResolver<'a> {
    options: &'a EncoderOptions,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(options: &'a EncoderOptions) -> Self {
        Self { options }
    }

    /// Resolve parameters for a new session.
    pub fn resolve<C>(&self, caps: &C) -> Result<InitializeParams, CodecError>
    where
        C: CapabilityProvider + ?Sized,
    {
        let mut params = InitializeParams::default();
        self.resolve_into(&mut params, false, caps)?;
        Ok(params)
    }

    /// Recompute the reconfigurable fields of a live session's parameters.
    pub fn reconfigure<C>(&self, live: &InitializeParams, caps: &C) -> Result<InitializeParams, CodecError>
    where
        C: CapabilityProvider + ?Sized,
    {
        let mut params = live.clone();
        self.resolve_into(&mut params, true, caps)?;
        Ok(params)
    }

    /// Resolve into `params`.
    ///
    /// With `is_reconfigure` only the rate control fields and the frame rate
    /// are touched, and tuning is forced to low latency. `params` is left
    /// unchanged on error.
    pub fn resolve_into<C>(
        &self,
        params: &mut InitializeParams,
        is_reconfigure: bool,
        caps: &C,
    ) -> Result<(), CodecError>
    where
        C: CapabilityProvider + ?Sized,
    {
        let options = self.options;
        let mut next = if is_reconfigure {
            params.clone()
        } else {
            InitializeParams::default()
        };

        let codec = Codec::from_name(options.get("codec").unwrap_or("h264"))?;
        if is_reconfigure && codec != next.codec && options.get("codec").is_some() {
            return Err(CodecError::invalid_option("codec", codec.name()));
        }
        let codec = if is_reconfigure { next.codec } else { codec };

        let preset = PresetProperties::lookup(options.get("preset").unwrap_or("P4"));
        let mut flags = ParentFlags {
            codec,
            modern: preset.modern,
            low_latency: preset.low_latency,
            lossless: preset.lossless,
        };
        let mut tuning = TuningInfo::Undefined;
        if preset.modern {
            tuning = options
                .get("tuning_info")
                .map(TuningInfo::from_name)
                .unwrap_or(TuningInfo::HighQuality);
            if tuning.is_low_latency() {
                flags.low_latency = true;
            } else if tuning == TuningInfo::Lossless {
                flags.lossless = true;
            }
        }

        if !is_reconfigure {
            next.codec = codec;
            next.preset = preset.preset;
            next.tuning_info = tuning;
            self.resolve_resolution(&mut next)?;
        }

        if let Some(fps) = options.get("fps") {
            let (num, den) = parse_frame_rate(fps)?;
            next.frame_rate_num = num;
            next.frame_rate_den = den;
        }

        if cfg!(windows) {
            next.enable_encode_async =
                caps.capability(codec, EncodeCapability::AsyncEncodeSupport)? != 0;
        }

        if is_reconfigure {
            next.encode_config.rc.apply_options(options, &flags)?;
            next.tuning_info = TuningInfo::LowLatency;
        } else {
            next.enable_ptd = true;
            next.encode_config = self.resolve_encode_config(caps, &next, &flags)?;
        }

        debug!(
            codec = codec.name(),
            preset = ?next.preset,
            tuning = ?next.tuning_info,
            width = next.encode_width,
            height = next.encode_height,
            is_reconfigure,
            "resolved encoder parameters"
        );
        *params = next;
        Ok(())
    }

    fn resolve_resolution(&self, params: &mut InitializeParams) -> Result<(), CodecError> {
        let Some(size) = self.options.get("s") else {
            return Ok(());
        };
        let (width, height) = parse_resolution(size)?;
        params.encode_width = width;
        params.encode_height = height;
        params.dar_width = width;
        params.dar_height = height;

        (params.max_encode_width, params.max_encode_height) = if self.options.contains_key("max_res") {
            match self.options.get("max_res") {
                Some(max) => parse_resolution(max)?,
                None => (0, 0),
            }
        } else {
            (width, height)
        };
        Ok(())
    }

    fn resolve_encode_config<C>(
        &self,
        caps: &C,
        params: &InitializeParams,
        flags: &ParentFlags,
    ) -> Result<EncodeConfig, CodecError>
    where
        C: CapabilityProvider + ?Sized,
    {
        let options = self.options;
        let mut config = caps.preset_config(params.codec, params.preset, params.tuning_info)?;
        if config.codec_config.codec() != params.codec {
            config.codec_config = CodecConfig::for_codec(params.codec);
        }

        config.profile = Profile::Autoselect;
        if let Some(bf) = options.number::<i32>("bf")? {
            config.frame_interval_p = bf;
        }
        config.gop_length = options.number("gop")?.unwrap_or(INFINITE_GOP_LENGTH);
        if config.gop_length == INFINITE_GOP_LENGTH {
            config.frame_interval_p = 1;
        }

        config.rc = RateControlConfig::initial(flags.lossless);
        config.rc.apply_options(options, flags)?;

        config
            .codec_config
            .apply_options(options, flags, config.gop_length)?;
        config.profile = config.codec_config.profile();
        Ok(config)
    }
}

/// Capability provider for resolving without a GPU.
///
/// Reports no optional capabilities and hands out the codec defaults as the
/// preset configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCapabilities;

impl CapabilityProvider for OfflineCapabilities {
    fn capability(&self, _codec: Codec, _capability: EncodeCapability) -> Result<i32, CodecError> {
        Ok(0)
    }

    fn preset_config(
        &self,
        codec: Codec,
        _preset: Preset,
        _tuning: TuningInfo,
    ) -> Result<EncodeConfig, CodecError> {
        Ok(EncodeConfig::for_codec(codec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MultiPass, RateControlMode};

    fn resolve(options: &EncoderOptions) -> InitializeParams {
        ConfigResolver::new(options).resolve(&OfflineCapabilities).unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = resolve(&EncoderOptions::new().set("s", "1920x1080"));
        assert_eq!(params.codec, Codec::H264);
        assert_eq!(params.preset, Preset::P4);
        assert_eq!(params.tuning_info, TuningInfo::HighQuality);
        assert_eq!((params.frame_rate_num, params.frame_rate_den), (30, 1));
        assert_eq!((params.encode_width, params.encode_height), (1920, 1080));
        assert_eq!((params.dar_width, params.dar_height), (1920, 1080));
        assert_eq!((params.max_encode_width, params.max_encode_height), (1920, 1080));
        assert!(params.enable_ptd);

        let config = &params.encode_config;
        assert_eq!(config.gop_length, INFINITE_GOP_LENGTH);
        assert_eq!(config.frame_interval_p, 1);
        assert_eq!(config.rc.mode, RateControlMode::ConstQp);
        assert_eq!(config.rc.const_qp, DEFAULT_CONST_QP);
        assert_eq!(config.profile, Profile::Autoselect);
        let CodecConfig::H264(h264) = config.codec_config else {
            panic!("expected h264 config");
        };
        assert_eq!((h264.slice_mode, h264.slice_mode_data), (3, 1));
        assert_eq!(h264.idr_period, INFINITE_GOP_LENGTH);
    }

    #[test]
    fn test_hevc_low_latency_bitrate() {
        let options = EncoderOptions::new()
            .set("codec", "hevc")
            .set("s", "1920x1080")
            .set("fmt", "NV12")
            .set("tuning_info", "low_latency")
            .set("bitrate", "4M")
            .set("fps", "29.97");
        let params = resolve(&options);
        let rc = &params.encode_config.rc;
        assert_eq!(params.codec, Codec::Hevc);
        assert_eq!(params.tuning_info, TuningInfo::LowLatency);
        assert_eq!(rc.mode, RateControlMode::Cbr);
        assert_eq!(rc.multi_pass, MultiPass::QuarterResolution);
        assert_eq!(rc.low_delay_key_frame_scale, 1);
        assert_eq!(rc.average_bitrate, 4_194_304);
        assert_eq!((params.frame_rate_num, params.frame_rate_den), (2997, 100));
        assert_eq!(params.encode_config.codec_config.chroma_format(), ChromaFormat::Yuv420);
    }

    #[test]
    fn test_gop_and_bf() {
        let params = resolve(&EncoderOptions::new().set("gop", "60").set("bf", "3"));
        assert_eq!(params.encode_config.gop_length, 60);
        assert_eq!(params.encode_config.frame_interval_p, 3);
        assert_eq!(params.encode_config.codec_config.idr_period(), 60);

        let params = resolve(&EncoderOptions::new().set("bf", "3"));
        assert_eq!(params.encode_config.frame_interval_p, 1);
    }

    #[test]
    fn test_max_res() {
        let params = resolve(&EncoderOptions::new().set("s", "1280,720").set("max_res", "3840x2160"));
        assert_eq!((params.max_encode_width, params.max_encode_height), (3840, 2160));

        let params = resolve(&EncoderOptions::new().set("s", "1280x720").set("max_res", ""));
        assert_eq!((params.max_encode_width, params.max_encode_height), (0, 0));
    }

    #[test]
    fn test_lossless_tuning() {
        let params = resolve(&EncoderOptions::new().set("tuning_info", "lossless"));
        assert_eq!(params.encode_config.rc.const_qp, Qp::default());
        assert_eq!(params.tuning_info, TuningInfo::Lossless);
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        let params = resolve(&EncoderOptions::new().set("preset", "P9"));
        assert_eq!(params.preset, Preset::P4);
    }

    #[test]
    fn test_yuv444_profile() {
        let params = resolve(&EncoderOptions::new().set("fmt", "YUV444"));
        assert_eq!(params.encode_config.profile, Profile::H264High444);
    }

    #[test]
    fn test_failure_leaves_target_untouched() {
        let mut params = resolve(&EncoderOptions::new().set("s", "640x480"));
        let before = params.clone();
        for options in [
            EncoderOptions::new().set("codec", "vp9"),
            EncoderOptions::new().set("s", "640x480").set("rc", "abr"),
            EncoderOptions::new().set("s", "wide"),
            EncoderOptions::new().set("fps", "x"),
        ] {
            let result = ConfigResolver::new(&options).resolve_into(&mut params, false, &OfflineCapabilities);
            assert!(result.is_err());
            assert_eq!(params, before);
        }
    }

    #[test]
    fn test_reconfigure_touches_only_eligible_fields() {
        let live = resolve(
            &EncoderOptions::new()
                .set("s", "1920x1080")
                .set("gop", "120")
                .set("colorspace", "bt709"),
        );
        let options = EncoderOptions::new()
            .set("bitrate", "2M")
            .set("rc", "cbr")
            .set("fps", "60")
            .set("gop", "10")
            .set("s", "640x480");
        let next = ConfigResolver::new(&options)
            .reconfigure(&live, &OfflineCapabilities)
            .unwrap();

        assert_eq!(next.tuning_info, TuningInfo::LowLatency);
        assert_eq!(next.encode_config.rc.average_bitrate, 2 * 1024 * 1024);
        assert_eq!(next.encode_config.rc.mode, RateControlMode::Cbr);
        assert_eq!(next.frame_rate_num, 60);
        assert_eq!(next.encode_config.gop_length, 120);
        assert_eq!(next.encode_width, 1920);
        assert_eq!(next.encode_config.codec_config, live.encode_config.codec_config);
    }

    #[test]
    fn test_reconfigure_is_idempotent() {
        let live = resolve(&EncoderOptions::new().set("s", "1280x720"));
        let options = EncoderOptions::new().set("bitrate", "1M").set("qmin", "12");
        let resolver = ConfigResolver::new(&options);
        let once = resolver.reconfigure(&live, &OfflineCapabilities).unwrap();
        let twice = resolver.reconfigure(&once, &OfflineCapabilities).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reconfigure_rejects_codec_change() {
        let live = resolve(&EncoderOptions::new());
        let options = EncoderOptions::new().set("codec", "av1");
        assert!(ConfigResolver::new(&options)
            .reconfigure(&live, &OfflineCapabilities)
            .is_err());
    }
}
