//! Tempo modes and rate multipliers

use num_rational::Ratio;
use num_traits::Zero;

/// Rational speed multiplier applied to the master step in sync mode
pub type Multiplier = Ratio<u32>;

/// How a device derives its step duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TempoMode {
    /// Locked to the master tempo, scaled by the device multiplier
    #[default]
    Sync,
    /// Running at the device's own tempo
    Free,
}

impl TempoMode {
    /// Parse a mode from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<TempoMode> {
        match s.to_lowercase().as_str() {
            "sync" | "synced" => Some(TempoMode::Sync),
            "free" => Some(TempoMode::Free),
            _ => None,
        }
    }

    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            TempoMode::Sync => "sync",
            TempoMode::Free => "free",
        }
    }
}

/// Largest speed-up a sync device accepts; slow-downs are bounded by its inverse
pub const MAX_MULTIPLIER: u32 = 64;

/// A multiplier is usable when both parts are non-zero and it lies within
/// `1/MAX_MULTIPLIER..=MAX_MULTIPLIER`
#[inline]
pub fn is_valid_multiplier(multiplier: Multiplier) -> bool {
    if multiplier.numer().is_zero() || multiplier.denom().is_zero() {
        return false;
    }
    let bound = Ratio::from_integer(MAX_MULTIPLIER);
    multiplier <= bound && multiplier.recip() <= bound
}

/// Parse a multiplier written as `n`, `n/d` or a decimal such as `0.5`.
///
/// Decimals are approximated with a denominator of 1000, which covers the
/// usual halves, quarters and eighths exactly.
pub fn parse_multiplier(s: &str) -> Option<Multiplier> {
    let s = s.trim().trim_end_matches(['x', 'X', '×']);
    let parsed = if let Some((n, d)) = s.split_once('/') {
        let n: u32 = n.trim().parse().ok()?;
        let d: u32 = d.trim().parse().ok()?;
        if d == 0 {
            return None;
        }
        Ratio::new(n, d)
    } else if let Ok(n) = s.parse::<u32>() {
        Ratio::from_integer(n)
    } else {
        let f: f64 = s.parse().ok()?;
        if !f.is_finite() || f <= 0.0 || f > u32::MAX as f64 / 1000.0 {
            return None;
        }
        Ratio::new((f * 1000.0).round() as u32, 1000)
    };
    is_valid_multiplier(parsed).then_some(parsed)
}
