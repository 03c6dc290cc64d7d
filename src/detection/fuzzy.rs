//! Fuzzy crime-likelihood evaluator.
//!
//! Five [0,1] readings (anger, fear, stress, sound, crowd) are fuzzified into
//! low/medium/high and the hour of day into day/night. A fixed Mamdani rule
//! table clips the output sets and the clipped sets are max-aggregated. The
//! 0.1-step output universe is refined with each set's clip crossings, and
//! the piecewise-linear result is defuzzified by its area centroid.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced by the evaluator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FuzzyError {
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
}

impl FuzzyError {
    /// Name of the offending input
    pub fn field(&self) -> &str {
        match self {
            FuzzyError::InvalidInput { field, .. } => field,
        }
    }
}

/// Triangular membership breakpoints `(a, b, c)`
type Triangle = (f64, f64, f64);

const LOW: Triangle = (0.0, 0.0, 0.5);
const MEDIUM: Triangle = (0.0, 0.5, 1.0);
const HIGH: Triangle = (0.5, 1.0, 1.0);

const DAY: Triangle = (0.0, 0.0, 12.0);
const NIGHT: Triangle = (12.0, 24.0, 24.0);

/// Output universe is 0.0, 0.1, ..., 1.0
const OUTPUT_STEPS: usize = 10;

/// Linguistic terms shared by the [0,1] inputs and the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    fn triangle(self) -> Triangle {
        match self {
            Level::Low => LOW,
            Level::Medium => MEDIUM,
            Level::High => HIGH,
        }
    }

    /// Degree to which `x` belongs to this term
    pub fn membership(self, x: f64) -> f64 {
        trimf(x, self.triangle())
    }
}

/// Triangular membership function. Shoulders (`a == b` or `b == c`) are
/// handled by checking the peak first.
fn trimf(x: f64, (a, b, c): Triangle) -> f64 {
    if x < a || x > c {
        0.0
    } else if x == b {
        1.0
    } else if x < b {
        (x - a) / (b - a)
    } else {
        (c - x) / (c - b)
    }
}

/// Night membership for an hour in [0,24]
pub fn night(hour: f64) -> f64 {
    trimf(hour, NIGHT)
}

/// Day membership for an hour in [0,24]
pub fn day(hour: f64) -> f64 {
    trimf(hour, DAY)
}

/// Crisp inputs for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FuzzyInputs {
    pub anger: f64,
    pub fear: f64,
    pub stress: f64,
    pub sound: f64,
    pub crowd: f64,
    pub time_of_day: f64,
}

/// Metric keys read by [`FuzzyInputs::from_metrics`]
pub const METRIC_KEYS: [&str; 5] = ["anger", "fear", "stress", "sound", "crowd"];

impl FuzzyInputs {
    /// Read the five readings from a metrics map. Missing keys read as 0;
    /// a present key that is not a number is rejected.
    pub fn from_metrics(metrics: &Map<String, Value>, time_of_day: f64) -> Result<Self, FuzzyError> {
        let read = |field: &str| -> Result<f64, FuzzyError> {
            match metrics.get(field) {
                None | Some(Value::Null) => Ok(0.0),
                Some(Value::Number(n)) => n.as_f64().ok_or_else(|| FuzzyError::InvalidInput {
                    field: field.to_string(),
                    reason: format!("{} is not representable as f64", n),
                }),
                Some(other) => Err(FuzzyError::InvalidInput {
                    field: field.to_string(),
                    reason: format!("expected a number, got {}", other),
                }),
            }
        };

        Ok(Self {
            anger: read("anger")?,
            fear: read("fear")?,
            stress: read("stress")?,
            sound: read("sound")?,
            crowd: read("crowd")?,
            time_of_day,
        })
    }

    /// Reject non-finite values and clamp finite ones into their universe
    fn sanitized(&self) -> Result<Self, FuzzyError> {
        let unit = |field: &str, v: f64| check_finite(field, v).map(|v| v.clamp(0.0, 1.0));

        Ok(Self {
            anger: unit("anger", self.anger)?,
            fear: unit("fear", self.fear)?,
            stress: unit("stress", self.stress)?,
            sound: unit("sound", self.sound)?,
            crowd: unit("crowd", self.crowd)?,
            time_of_day: check_finite("time_of_day", self.time_of_day)?.clamp(0.0, 24.0),
        })
    }
}

fn check_finite(field: &str, value: f64) -> Result<f64, FuzzyError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FuzzyError::InvalidInput {
            field: field.to_string(),
            reason: format!("{} is not a finite number", value),
        })
    }
}

/// Rule activations paired with their consequent
fn fire_rules(inputs: &FuzzyInputs) -> [(f64, Level); 5] {
    let night = night(inputs.time_of_day);
    [
        (Level::High.membership(inputs.anger).min(night), Level::High),
        (Level::High.membership(inputs.fear).min(night), Level::High),
        (
            Level::High
                .membership(inputs.stress)
                .min(Level::High.membership(inputs.sound)),
            Level::High,
        ),
        (
            Level::High
                .membership(inputs.crowd)
                .min(Level::High.membership(inputs.sound)),
            Level::Medium,
        ),
        (
            Level::Low
                .membership(inputs.anger)
                .min(Level::Low.membership(inputs.fear)),
            Level::Low,
        ),
    ]
}

/// Strongest activation of each output term
fn term_cuts(activations: &[(f64, Level)]) -> [(Level, f64); 3] {
    let cut = |term: Level| {
        activations
            .iter()
            .filter(|(_, level)| *level == term)
            .map(|(strength, _)| *strength)
            .fold(0.0, f64::max)
    };
    [
        (Level::Low, cut(Level::Low)),
        (Level::Medium, cut(Level::Medium)),
        (Level::High, cut(Level::High)),
    ]
}

/// Output universe with the points where each clipped term meets its cut
fn breakpoints(cuts: &[(Level, f64)]) -> Vec<f64> {
    let grid: Vec<f64> = (0..=OUTPUT_STEPS)
        .map(|step| step as f64 / OUTPUT_STEPS as f64)
        .collect();
    let mut points = grid.clone();

    for &(term, cut) in cuts.iter().filter(|(_, cut)| *cut > 0.0) {
        for pair in grid.windows(2) {
            let (x1, x2) = (pair[0], pair[1]);
            let (m1, m2) = (term.membership(x1), term.membership(x2));
            if (m1 >= cut) != (m2 >= cut) {
                points.push(x1 + (cut - m1) * (x2 - x1) / (m2 - m1));
            }
        }
    }

    points.sort_by(f64::total_cmp);
    points.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    points
}

/// Centroid of the max-aggregated clipped output sets, integrated as a
/// piecewise-linear area. Returns 0.0 when no rule fires.
fn defuzzify(activations: &[(f64, Level)]) -> f64 {
    let cuts = term_cuts(activations);
    let xs = breakpoints(&cuts);
    let aggregate = |x: f64| {
        cuts.iter()
            .map(|&(term, cut)| cut.min(term.membership(x)))
            .fold(0.0, f64::max)
    };
    let ys: Vec<f64> = xs.iter().map(|&x| aggregate(x)).collect();

    let mut moment_sum = 0.0;
    let mut area_sum = 0.0;
    for i in 1..xs.len() {
        let (x1, x2, y1, y2) = (xs[i - 1], xs[i], ys[i - 1], ys[i]);
        let width = x2 - x1;
        if (y1 == 0.0 && y2 == 0.0) || width == 0.0 {
            continue;
        }

        let (centre, area) = if y1 == y2 {
            (x1 + 0.5 * width, width * y1)
        } else if y1 == 0.0 {
            (x1 + 2.0 / 3.0 * width, 0.5 * width * y2)
        } else if y2 == 0.0 {
            (x1 + 1.0 / 3.0 * width, 0.5 * width * y1)
        } else {
            (
                x1 + 2.0 / 3.0 * width * (y2 + 0.5 * y1) / (y1 + y2),
                0.5 * width * (y1 + y2),
            )
        };
        moment_sum += centre * area;
        area_sum += area;
    }

    if area_sum > 0.0 {
        moment_sum / area_sum
    } else {
        0.0
    }
}

/// Evaluate the crime likelihood in [0,1] for the given readings
pub fn evaluate_crime_likelihood(inputs: &FuzzyInputs) -> Result<f64, FuzzyError> {
    let inputs = inputs.sanitized()?;
    Ok(defuzzify(&fire_rules(&inputs)))
}
