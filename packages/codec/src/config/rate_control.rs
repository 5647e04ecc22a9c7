//! Rate control parameters.

use serde::Serialize;
use tracing::{debug, warn};

use super::options::{parse_bitrate, parse_qp, EncoderOptions};
use super::{InitializeParams, ParentFlags};
use crate::{CodecError, MultiPass, RateControlMode};

/// Quantization parameters for P, B and I frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Qp {
    pub inter_p: u32,
    pub inter_b: u32,
    pub intra: u32,
}

impl Qp {
    /// Same QP for every frame type.
    #[must_use]
    pub const fn uniform(qp: u32) -> Self {
        Self {
            inter_p: qp,
            inter_b: qp,
            intra: qp,
        }
    }
}

/// Constant QP used until options say otherwise.
pub const DEFAULT_CONST_QP: Qp = Qp {
    inter_p: 28,
    inter_b: 31,
    intra: 25,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateControlConfig {
    pub mode: RateControlMode,
    pub multi_pass: MultiPass,
    pub low_delay_key_frame_scale: u8,
    pub average_bitrate: u32,
    pub max_bitrate: u32,
    pub vbv_buffer_size: u32,
    pub vbv_initial_delay: u32,
    pub const_qp: Qp,
    pub enable_initial_rc_qp: bool,
    pub initial_rc_qp: Qp,
    pub enable_min_qp: bool,
    pub min_qp: Qp,
    pub enable_max_qp: bool,
    pub max_qp: Qp,
    /// Target quality for VBR; 0 leaves it to the encoder.
    pub target_quality: u8,
    pub enable_aq: bool,
    pub aq_strength: u32,
    pub enable_temporal_aq: bool,
    pub enable_lookahead: bool,
    pub lookahead_depth: u16,
}

impl RateControlConfig {
    /// Starting point of a fresh session: constant QP with the default
    /// triple, or all zeros for lossless encoding.
    #[must_use]
    pub fn initial(lossless: bool) -> Self {
        Self {
            mode: RateControlMode::ConstQp,
            const_qp: if lossless { Qp::default() } else { DEFAULT_CONST_QP },
            ..Self::default()
        }
    }

    /// Apply the rate control options in order.
    ///
    /// An explicit `bitrate` selects CBR, two-pass at quarter resolution
    /// under low-latency tuning. A later `rc` always wins over it.
    pub(crate) fn apply_options(
        &mut self,
        options: &EncoderOptions,
        flags: &ParentFlags,
    ) -> Result<(), CodecError> {
        if let Some(value) = options.get("bitrate") {
            self.average_bitrate = parse_bitrate(value)?;
            self.mode = RateControlMode::Cbr;
            if flags.modern && flags.low_latency {
                self.multi_pass = MultiPass::QuarterResolution;
                self.low_delay_key_frame_scale = 1;
            }
        }
        if let Some(value) = options.get("multipass") {
            self.multi_pass = MultiPass::from_name(value);
        }
        if options.get("ldkfs").is_some() {
            self.low_delay_key_frame_scale = 1;
        }
        if let Some(value) = options.get("maxbitrate") {
            self.max_bitrate = parse_bitrate(value)?;
        }
        if let Some(value) = options.get("vbvbufsize") {
            self.vbv_buffer_size = parse_bitrate(value)?;
        }
        if let Some(value) = options.get("vbvinit") {
            self.vbv_initial_delay = parse_bitrate(value)?;
        }
        if let Some(cq) = options.number::<u8>("cq")? {
            self.target_quality = cq;
            self.average_bitrate = 0;
            self.max_bitrate = 0;
        }
        if let Some(value) = options.get("rc") {
            self.mode = RateControlMode::from_name(value)?;
        }

        if let Some(qp) = qp_option(options, "initqp") {
            self.initial_rc_qp = qp;
            self.enable_initial_rc_qp = true;
        }
        if let Some(qp) = qp_option(options, "qmin") {
            self.min_qp = qp;
            self.enable_min_qp = true;
        }
        if let Some(qp) = qp_option(options, "qmax") {
            self.max_qp = qp;
            self.enable_max_qp = true;
        }
        if let Some(qp) = qp_option(options, "constqp") {
            self.const_qp = qp;
        }

        if options.get("temporalaq").is_some() {
            self.enable_temporal_aq = true;
        }
        if let Some(depth) = options.number::<u16>("lookahead")? {
            self.lookahead_depth = depth;
            self.enable_lookahead = depth != 0;
        }
        if let Some(strength) = options.number::<u32>("aq")? {
            self.enable_aq = true;
            self.aq_strength = strength;
        }

        if self.mode == RateControlMode::ConstQp && self.average_bitrate != 0 {
            warn!(
                bitrate = self.average_bitrate,
                "bitrate is ignored in constant QP mode"
            );
        }
        debug!(mode = ?self.mode, bitrate = self.average_bitrate, "rate control resolved");
        Ok(())
    }
}

fn qp_option(options: &EncoderOptions, key: &str) -> Option<Qp> {
    options.get(key).and_then(|value| parse_qp(key, value))
}

/// The fields a live session accepts on reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconfigureParams {
    pub rate_control_mode: RateControlMode,
    pub multi_pass: MultiPass,
    pub average_bitrate: u32,
    pub vbv_buffer_size: u32,
    pub max_bitrate: u32,
    pub vbv_initial_delay: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
}

impl ReconfigureParams {
    /// Snapshot the reconfigurable fields of `params`.
    #[must_use]
    pub fn from_params(params: &InitializeParams) -> Self {
        let rc = &params.encode_config.rc;
        Self {
            rate_control_mode: rc.mode,
            multi_pass: rc.multi_pass,
            average_bitrate: rc.average_bitrate,
            vbv_buffer_size: rc.vbv_buffer_size,
            max_bitrate: rc.max_bitrate,
            vbv_initial_delay: rc.vbv_initial_delay,
            frame_rate_num: params.frame_rate_num,
            frame_rate_den: params.frame_rate_den,
        }
    }

    /// Write these fields into `params`, leaving everything else untouched.
    pub fn apply_to(&self, params: &mut InitializeParams) {
        let rc = &mut params.encode_config.rc;
        rc.mode = self.rate_control_mode;
        rc.multi_pass = self.multi_pass;
        rc.average_bitrate = self.average_bitrate;
        rc.vbv_buffer_size = self.vbv_buffer_size;
        rc.max_bitrate = self.max_bitrate;
        rc.vbv_initial_delay = self.vbv_initial_delay;
        params.frame_rate_num = self.frame_rate_num;
        params.frame_rate_den = self.frame_rate_den;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Codec;

    fn flags(modern: bool, low_latency: bool) -> ParentFlags {
        ParentFlags {
            codec: Codec::H264,
            modern,
            low_latency,
            lossless: false,
        }
    }

    fn apply(options: EncoderOptions, flags: &ParentFlags) -> RateControlConfig {
        let mut rc = RateControlConfig::initial(false);
        rc.apply_options(&options, flags).unwrap();
        rc
    }

    #[test]
    fn test_initial() {
        assert_eq!(RateControlConfig::initial(false).const_qp, DEFAULT_CONST_QP);
        assert_eq!(RateControlConfig::initial(true).const_qp, Qp::default());
        assert_eq!(RateControlConfig::initial(true).mode, RateControlMode::ConstQp);
    }

    #[test]
    fn test_bitrate_low_latency() {
        let rc = apply(EncoderOptions::new().set("bitrate", "4M"), &flags(true, true));
        assert_eq!(rc.average_bitrate, 4 * 1024 * 1024);
        assert_eq!(rc.mode, RateControlMode::Cbr);
        assert_eq!(rc.multi_pass, MultiPass::QuarterResolution);
        assert_eq!(rc.low_delay_key_frame_scale, 1);
    }

    #[test]
    fn test_bitrate_high_quality_selects_cbr() {
        let rc = apply(EncoderOptions::new().set("bitrate", "4M"), &flags(true, false));
        assert_eq!(rc.mode, RateControlMode::Cbr);
        assert_eq!(rc.average_bitrate, 4 * 1024 * 1024);
        assert_eq!(rc.multi_pass, MultiPass::Disabled);
        assert_eq!(rc.low_delay_key_frame_scale, 0);
    }

    #[test]
    fn test_bitrate_legacy_preset() {
        let rc = apply(EncoderOptions::new().set("bitrate", "800k"), &flags(false, false));
        assert_eq!(rc.mode, RateControlMode::Cbr);
    }

    #[test]
    fn test_rc_overrides_bitrate_mode() {
        let opts = EncoderOptions::new().set("bitrate", "4M").set("rc", "vbr");
        let rc = apply(opts, &flags(true, true));
        assert_eq!(rc.mode, RateControlMode::Vbr);
        assert_eq!(rc.multi_pass, MultiPass::QuarterResolution);
    }

    #[test]
    fn test_unknown_rc_fails() {
        let mut rc = RateControlConfig::initial(false);
        let err = rc
            .apply_options(&EncoderOptions::new().set("rc", "abr"), &flags(true, false))
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidRateControlMode(_)));
    }

    #[test]
    fn test_cq_clears_bitrates() {
        let opts = EncoderOptions::new()
            .set("bitrate", "4M")
            .set("maxbitrate", "8M")
            .set("cq", "23");
        let rc = apply(opts, &flags(true, false));
        assert_eq!(rc.target_quality, 23);
        assert_eq!(rc.average_bitrate, 0);
        assert_eq!(rc.max_bitrate, 0);
    }

    #[test]
    fn test_rc_after_cq_keeps_bitrates_cleared() {
        let opts = EncoderOptions::new()
            .set("bitrate", "4M")
            .set("maxbitrate", "8M")
            .set("cq", "20")
            .set("rc", "vbr");
        let rc = apply(opts, &flags(true, false));
        assert_eq!(rc.mode, RateControlMode::Vbr);
        assert_eq!(rc.average_bitrate, 0);
        assert_eq!(rc.max_bitrate, 0);
        assert_eq!(rc.target_quality, 20);
    }

    #[test]
    fn test_qp_options() {
        let opts = EncoderOptions::new()
            .set("initqp", "20")
            .set("qmin", "10,12,8")
            .set("qmax", "40,42")
            .set("constqp", "bad");
        let rc = apply(opts, &flags(true, false));
        assert!(rc.enable_initial_rc_qp);
        assert_eq!(rc.initial_rc_qp, Qp::uniform(20));
        assert!(rc.enable_min_qp);
        assert_eq!(rc.min_qp, Qp { inter_p: 10, inter_b: 12, intra: 8 });
        assert!(!rc.enable_max_qp);
        assert_eq!(rc.const_qp, DEFAULT_CONST_QP);
    }

    #[test]
    fn test_aq_and_lookahead() {
        let opts = EncoderOptions::new()
            .set("aq", "8")
            .set("temporalaq", "1")
            .set("lookahead", "0")
            .set("multipass", "fullres")
            .set("vbvbufsize", "1M")
            .set("vbvinit", "512k");
        let rc = apply(opts, &flags(true, false));
        assert!(rc.enable_aq);
        assert_eq!(rc.aq_strength, 8);
        assert!(rc.enable_temporal_aq);
        assert!(!rc.enable_lookahead);
        assert_eq!(rc.multi_pass, MultiPass::FullResolution);
        assert_eq!(rc.vbv_buffer_size, 1024 * 1024);
        assert_eq!(rc.vbv_initial_delay, 512 * 1024);

        let rc = apply(EncoderOptions::new().set("lookahead", "16"), &flags(true, false));
        assert!(rc.enable_lookahead);
        assert_eq!(rc.lookahead_depth, 16);
    }

    #[test]
    fn test_reconfigure_params_round_trip_fields() {
        let mut params = InitializeParams::default();
        params.encode_config.rc.average_bitrate = 1000;
        params.encode_config.rc.mode = RateControlMode::Vbr;
        let mut snapshot = ReconfigureParams::from_params(&params);
        assert_eq!(snapshot.frame_rate_num, 30);

        snapshot.average_bitrate = 2000;
        snapshot.frame_rate_num = 60;
        snapshot.apply_to(&mut params);
        assert_eq!(params.encode_config.rc.average_bitrate, 2000);
        assert_eq!(params.encode_config.rc.mode, RateControlMode::Vbr);
        assert_eq!(params.frame_rate_num, 60);
    }
}
