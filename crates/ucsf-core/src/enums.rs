//! Enumerations shared by the reader, the peak picker and the writers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Peak sign ──────────────────────────────────────────────────────────────

/// Which extrema a peak search admits.
///
/// The integer codes are the ones used on the command line and in saved
/// pick configurations: `1` positive maxima, `-1` negative minima, `0` both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum Sign {
    Positive = 1,
    Negative = -1,
    #[default]
    Both = 0,
}

impl Sign {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            1 => Some(Self::Positive),
            -1 => Some(Self::Negative),
            0 => Some(Self::Both),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Threshold and sign gate applied to a candidate before any neighbour
    /// is read. `threshold` is taken as a magnitude.
    pub fn admits(self, value: f32, threshold: f32) -> bool {
        let threshold = threshold.abs();
        if value.abs() < threshold {
            return false;
        }
        match self {
            Self::Positive => value >= threshold,
            Self::Negative => value <= -threshold,
            Self::Both => true,
        }
    }

    /// Neighbour test of the local-extremum check: the neighbour must not
    /// beat the candidate and must stay above 20 % of it (shoulder rejection).
    pub fn neighbour_ok(self, centre: f32, neighbour: f32) -> bool {
        match self {
            Self::Positive => neighbour >= centre * SHOULDER_RATIO && neighbour <= centre,
            Self::Negative => neighbour <= centre * SHOULDER_RATIO && neighbour >= centre,
            Self::Both => {
                let c = centre.abs();
                let n = neighbour.abs();
                n >= c * SHOULDER_RATIO && n <= c
            }
        }
    }
}

/// Fraction of the candidate height every neighbour has to reach.
pub const SHOULDER_RATIO: f32 = 0.2;

impl From<Sign> for i32 {
    fn from(s: Sign) -> i32 {
        s.as_i32()
    }
}

impl TryFrom<i32> for Sign {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        Self::from_i32(v).ok_or_else(|| format!("invalid sign {} (expected 1, -1 or 0)", v))
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
            Self::Both => write!(f, "both"),
        }
    }
}

// ─── Shift units ────────────────────────────────────────────────────────────

/// Unit of a centre-frequency translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftUnit {
    Ppm,
    Hz,
    Points,
}

impl FromStr for ShiftUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ppm" => Ok(Self::Ppm),
            "hz" => Ok(Self::Hz),
            "pt" | "pts" | "points" => Ok(Self::Points),
            other => Err(format!("incorrect unit '{}' (expected ppm, hz or pt)", other)),
        }
    }
}

impl fmt::Display for ShiftUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ppm => write!(f, "ppm"),
            Self::Hz => write!(f, "hz"),
            Self::Points => write!(f, "pt"),
        }
    }
}
