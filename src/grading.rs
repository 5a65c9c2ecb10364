use serde::{Serialize, Serializer};
use std::fmt;

/// Percentage at or above which a mark (or an aggregate) counts as a pass.
pub const PASS_THRESHOLD: f64 = 40.0;

/// Round to 2 decimals the way report tables display them.
///
/// Rounding works from the exact binary value of `x`, so `2.675` stays
/// `2.67` (its binary value sits just below the midpoint).
pub fn round2(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    format!("{:.2}", x).parse::<f64>().unwrap_or(x)
}

/// `obtained / max * 100` rounded to 2 decimals; a zero (or negative)
/// denominator yields `0.0` instead of an error.
pub fn percentage(obtained: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    round2(obtained / max * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    CPlus,
    C,
    F,
}

impl Grade {
    /// Every grade from best to worst; distribution tables use this order.
    pub const ALL: [Grade; 7] = [
        Grade::APlus,
        Grade::A,
        Grade::BPlus,
        Grade::B,
        Grade::CPlus,
        Grade::C,
        Grade::F,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Letter grade for a percentage. Lower bounds are inclusive.
///
/// | percentage >= | grade |
/// |---------------|-------|
/// | 90            | A+    |
/// | 80            | A     |
/// | 70            | B+    |
/// | 60            | B     |
/// | 50            | C+    |
/// | 40            | C     |
/// | otherwise     | F     |
pub fn grade(percentage: f64) -> Grade {
    match percentage {
        p if p >= 90.0 => Grade::APlus,
        p if p >= 80.0 => Grade::A,
        p if p >= 70.0 => Grade::BPlus,
        p if p >= 60.0 => Grade::B,
        p if p >= 50.0 => Grade::CPlus,
        p if p >= 40.0 => Grade::C,
        _ => Grade::F,
    }
}

pub fn is_pass(percentage: f64) -> bool {
    percentage >= PASS_THRESHOLD
}

/// Overall result for an aggregate. `NoData` is distinct from `Fail`: it
/// means nothing has been marked yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Pass,
    Fail,
    NoData,
}

impl PassStatus {
    pub fn from_percentage(percentage: f64) -> Self {
        if is_pass(percentage) {
            PassStatus::Pass
        } else {
            PassStatus::Fail
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PassStatus::Pass => "Pass",
            PassStatus::Fail => "Fail",
            PassStatus::NoData => "No Data",
        }
    }
}

impl Serialize for PassStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
