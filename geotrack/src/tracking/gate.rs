//! Jitter acceptance gate.
//!
//! Consumer GPS wanders inside its reported error radius even when the
//! device is standing still. The gate accepts a candidate move when either:
//!
//! - the fix is trustworthy (`0 < accuracy ≤ trust_accuracy_meters`), or
//! - the move is larger than `max(min_movement_meters, accuracy × accuracy_multiplier)`.
//!
//! Both criteria are deliberately OR-ed: a precise tiny move and a noisy
//! large move both pass. A distance exactly on the threshold is rejected.

use std::fmt;

/// Default trusted accuracy (meters).
pub const DEFAULT_TRUST_ACCURACY_METERS: f64 = 8.0;

/// Default minimum movement floor (meters).
pub const DEFAULT_MIN_MOVEMENT_METERS: f64 = 10.0;

/// Default accuracy multiplier.
pub const DEFAULT_ACCURACY_MULTIPLIER: f64 = 1.5;

/// Lowest allowed accuracy multiplier.
pub const MIN_ACCURACY_MULTIPLIER: f64 = 1.0;

/// Highest allowed accuracy multiplier.
pub const MAX_ACCURACY_MULTIPLIER: f64 = 3.0;

/// Thresholds for the acceptance gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Fixes at or below this accuracy are accepted regardless of distance.
    pub trust_accuracy_meters: f64,

    /// Floor for the distance criterion.
    pub min_movement_meters: f64,

    /// Scale applied to the reported accuracy for the distance criterion.
    pub accuracy_multiplier: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            trust_accuracy_meters: DEFAULT_TRUST_ACCURACY_METERS,
            min_movement_meters: DEFAULT_MIN_MOVEMENT_METERS,
            accuracy_multiplier: DEFAULT_ACCURACY_MULTIPLIER,
        }
    }
}

impl GateConfig {
    /// Create a gate configuration, clamping values into their valid ranges.
    ///
    /// Negative distances become zero and the multiplier is held to
    /// `[MIN_ACCURACY_MULTIPLIER, MAX_ACCURACY_MULTIPLIER]`.
    pub fn new(
        trust_accuracy_meters: f64,
        min_movement_meters: f64,
        accuracy_multiplier: f64,
    ) -> Self {
        Self {
            trust_accuracy_meters: non_negative(trust_accuracy_meters, DEFAULT_TRUST_ACCURACY_METERS),
            min_movement_meters: non_negative(min_movement_meters, DEFAULT_MIN_MOVEMENT_METERS),
            accuracy_multiplier: clamp_accuracy_multiplier(accuracy_multiplier),
        }
    }

    /// Distance a candidate must exceed to pass on distance alone.
    pub fn threshold(&self, accuracy: f64) -> f64 {
        // f64::max ignores a NaN operand, so an unusable accuracy falls back to the floor
        self.min_movement_meters.max(accuracy * self.accuracy_multiplier)
    }
}

fn non_negative(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        tracing::warn!(fallback, "Gate distance is NaN, using default");
        fallback
    } else if value < 0.0 {
        tracing::warn!(value, "Gate distance is negative, clamping to 0");
        0.0
    } else {
        value
    }
}

/// Clamps a gate multiplier into its allowed range, logging a warning if clamped.
pub fn clamp_accuracy_multiplier(value: f64) -> f64 {
    if value.is_nan() {
        tracing::warn!(
            fallback = DEFAULT_ACCURACY_MULTIPLIER,
            "Accuracy multiplier is NaN, using default"
        );
        return DEFAULT_ACCURACY_MULTIPLIER;
    }

    let clamped = value.clamp(MIN_ACCURACY_MULTIPLIER, MAX_ACCURACY_MULTIPLIER);
    if clamped != value {
        tracing::warn!(
            requested = value,
            clamped,
            "Accuracy multiplier out of range"
        );
    }
    clamped
}

/// Why the gate accepted or rejected a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    /// The fix was accurate enough to trust any move.
    AcceptedAccuracy,
    /// The move exceeded the noise threshold.
    AcceptedDistance,
    /// The move was within the noise envelope.
    RejectedJitter,
}

impl DecisionReason {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::RejectedJitter)
    }

    /// Stable label used in status reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AcceptedAccuracy => "AcceptedAccuracy",
            Self::AcceptedDistance => "AcceptedDistance",
            Self::RejectedJitter => "RejectedJitter",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateDecision {
    pub reason: DecisionReason,

    /// Planar distance of the candidate from the last accepted target.
    pub distance: f64,

    /// Accuracy reported with the candidate sample.
    pub accuracy: f64,

    /// Distance threshold that applied, `max(min_movement, accuracy × multiplier)`.
    pub threshold: f64,

    /// Configuration the decision was made with.
    pub config: GateConfig,
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        self.reason.is_accepted()
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            DecisionReason::AcceptedAccuracy => write!(
                f,
                "Accepted: acc {:.1} ≤ {:.1}",
                self.accuracy, self.config.trust_accuracy_meters
            ),
            DecisionReason::AcceptedDistance => write!(
                f,
                "Accepted: move {:.1} > max({:.1}, {:.1})",
                self.distance,
                self.config.min_movement_meters,
                self.accuracy * self.config.accuracy_multiplier
            ),
            DecisionReason::RejectedJitter => write!(
                f,
                "Rejected (jitter): move {:.1}, acc {:.1}",
                self.distance, self.accuracy
            ),
        }
    }
}

/// The accuracy/distance acceptance test.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptanceGate {
    config: GateConfig,
}

impl AcceptanceGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide whether a candidate `distance` meters away, reported with
    /// `accuracy`, should replace the last accepted target.
    pub fn evaluate(&self, distance: f64, accuracy: f64) -> GateDecision {
        let accuracy_good = accuracy > 0.0 && accuracy <= self.config.trust_accuracy_meters;
        let threshold = self.config.threshold(accuracy);
        let big_enough_move = distance > threshold;

        let reason = if accuracy_good {
            DecisionReason::AcceptedAccuracy
        } else if big_enough_move {
            DecisionReason::AcceptedDistance
        } else {
            DecisionReason::RejectedJitter
        };

        GateDecision {
            reason,
            distance,
            accuracy,
            threshold,
            config: self.config,
        }
    }
}
