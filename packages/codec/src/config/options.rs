//! String options and the parsers for their value syntaxes.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::warn;

use super::rate_control::Qp;
use crate::CodecError;

/// Flat `key → value` encoder options.
///
/// An empty value counts as absent for every key except `max_res`, where an
/// explicitly empty value disables dynamic resolution change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderOptions(BTreeMap<String, String>);

impl EncoderOptions {
    /// Create an empty option map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert an option, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Non-empty value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Whether `key` was given at all, even with an empty value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse whitespace separated `key=value` pairs.
    pub fn parse_pairs(input: &str) -> Result<Self, CodecError> {
        input
            .split_whitespace()
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
                _ => Err(CodecError::invalid_option(pair, "")),
            })
            .collect()
    }

    /// Parse the value of `key` as a number.
    pub(crate) fn number<T: FromStr>(&self, key: &str) -> Result<Option<T>, CodecError> {
        self.get(key)
            .map(|value| {
                value
                    .trim()
                    .parse()
                    .map_err(|_| CodecError::invalid_option(key, value))
            })
            .transpose()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EncoderOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, String>> for EncoderOptions {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Parse `WxH` or `W,H`.
pub fn parse_resolution(value: &str) -> Result<(u32, u32), CodecError> {
    let (w, h) = value
        .split_once('x')
        .or_else(|| value.split_once(','))
        .ok_or_else(|| CodecError::InvalidResolution(value.to_string()))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| CodecError::InvalidResolution(value.to_string()))
    };
    Ok((parse(w)?, parse(h)?))
}

/// Parse a decimal frame rate into an exact `(num, den)` pair.
///
/// At most two fractional digits are kept: `29.97` is `2997/100` and
/// `23.976` is truncated to `2397/100`.
pub fn parse_frame_rate(value: &str) -> Result<(u32, u32), CodecError> {
    let invalid = || CodecError::InvalidFrameRate(value.to_string());
    let value = value.trim();
    let (int, frac) = value.split_once('.').unwrap_or((value, ""));
    let frac = &frac[..frac.len().min(2)];
    if int.is_empty() || !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let num: u32 = format!("{int}{frac}").parse().map_err(|_| invalid())?;
    let den = 10u32.pow(frac.len() as u32);
    if num == 0 {
        return Err(invalid());
    }
    Ok((num, den))
}

/// Parse a bitrate with an optional `k`/`K` (×1024) or `m`/`M` (×1024²) suffix.
pub fn parse_bitrate(value: &str) -> Result<u32, CodecError> {
    let invalid = || CodecError::InvalidBitrate(value.to_string());
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last() {
        Some('k' | 'K') => (&value[..value.len() - 1], 1024u32),
        Some('m' | 'M') => (&value[..value.len() - 1], 1024 * 1024),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };
    digits
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

/// Parse a QP triple: one value for P, B and I, or `p,b,i`.
///
/// Any other shape is logged and yields `None`.
pub fn parse_qp(key: &str, value: &str) -> Option<Qp> {
    let values: Result<Vec<u32>, _> = value.split(',').map(|v| v.trim().parse()).collect();
    match values.as_deref() {
        Ok([qp]) => Some(Qp::uniform(*qp)),
        Ok([p, b, i]) => Some(Qp {
            inter_p: *p,
            inter_b: *b,
            intra: *i,
        }),
        _ => {
            warn!(option = key, value, "expected qp_for_P_B_I or qp_P,qp_B,qp_I (no spaces)");
            None
        }
    }
}
