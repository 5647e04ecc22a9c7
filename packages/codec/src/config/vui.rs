//! Video usability information: colour description and timing.

use serde::Serialize;
use tracing::warn;

use super::options::EncoderOptions;
use crate::CodecError;

/// Code points shared by colour primaries, transfer characteristics and
/// matrix coefficients for the standards the encoder signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum ColorStandard {
    Bt709 = 1,
    Unspecified = 2,
    /// BT.601 525-line.
    Smpte170m = 6,
}

impl ColorStandard {
    /// Match a colourspace name by substring, case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.contains("bt709") {
            Some(Self::Bt709)
        } else if name.contains("bt601") {
            Some(Self::Smpte170m)
        } else {
            None
        }
    }

    #[must_use]
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

impl Default for ColorStandard {
    fn default() -> Self {
        Self::Unspecified
    }
}

/// `video_format` value for an unspecified source.
pub const VIDEO_FORMAT_UNSPECIFIED: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VuiConfig {
    pub video_signal_type_present: bool,
    pub video_format: u32,
    pub video_full_range: bool,
    pub colour_description_present: bool,
    pub colour_primaries: ColorStandard,
    pub transfer_characteristics: ColorStandard,
    pub colour_matrix: ColorStandard,
    pub timing_info_present: bool,
    pub num_unit_in_ticks: u32,
    pub time_scale: u32,
}

impl Default for VuiConfig {
    fn default() -> Self {
        Self {
            video_signal_type_present: false,
            video_format: VIDEO_FORMAT_UNSPECIFIED,
            video_full_range: false,
            colour_description_present: false,
            colour_primaries: ColorStandard::Unspecified,
            transfer_characteristics: ColorStandard::Unspecified,
            colour_matrix: ColorStandard::Unspecified,
            timing_info_present: false,
            num_unit_in_ticks: 0,
            time_scale: 0,
        }
    }
}

impl VuiConfig {
    /// Build the VUI from `colorspace`, `num_unit_in_ticks` and `timescale`.
    ///
    /// A recognized colourspace signals full range with matching colour
    /// description. Anything else leaves every colour field unspecified.
    /// Timing is signalled only when both timing values are non-zero.
    pub fn from_options(options: &EncoderOptions) -> Result<Self, CodecError> {
        let mut vui = Self::default();
        match options.get("colorspace") {
            Some(name) => match ColorStandard::from_name(name) {
                Some(standard) => {
                    vui.video_signal_type_present = true;
                    vui.video_full_range = true;
                    vui.colour_description_present = true;
                    vui.colour_primaries = standard;
                    vui.transfer_characteristics = standard;
                    vui.colour_matrix = standard;
                }
                None => warn!(colorspace = name, "unrecognized colorspace, signalling unspecified"),
            },
            None => warn!("colorspace not set, signalling unspecified"),
        }

        vui.num_unit_in_ticks = options.number("num_unit_in_ticks")?.unwrap_or_default();
        vui.time_scale = options.number("timescale")?.unwrap_or_default();
        vui.timing_info_present = vui.num_unit_in_ticks != 0 && vui.time_scale != 0;
        Ok(vui)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bt709() {
        let vui = VuiConfig::from_options(&EncoderOptions::new().set("colorspace", "BT709")).unwrap();
        assert!(vui.video_full_range);
        assert_eq!(vui.video_format, VIDEO_FORMAT_UNSPECIFIED);
        assert_eq!(vui.colour_matrix.code(), 1);
        assert_eq!(vui.colour_primaries, ColorStandard::Bt709);
    }

    #[test]
    fn test_bt601_maps_to_smpte170m() {
        let vui = VuiConfig::from_options(&EncoderOptions::new().set("colorspace", "bt601")).unwrap();
        assert_eq!(vui.transfer_characteristics.code(), 6);
    }

    #[test]
    fn test_unrecognized_is_unspecified() {
        for opts in [EncoderOptions::new(), EncoderOptions::new().set("colorspace", "srgb")] {
            let vui = VuiConfig::from_options(&opts).unwrap();
            assert!(!vui.video_full_range);
            assert_eq!(vui.colour_primaries.code(), 2);
            assert_eq!(vui.colour_matrix.code(), 2);
        }
    }

    #[test]
    fn test_timing_needs_both_values() {
        let opts = EncoderOptions::new().set("num_unit_in_ticks", "1001");
        assert!(!VuiConfig::from_options(&opts).unwrap().timing_info_present);

        let vui = VuiConfig::from_options(&opts.set("timescale", "60000")).unwrap();
        assert!(vui.timing_info_present);
        assert_eq!(vui.time_scale, 60000);
    }
}
