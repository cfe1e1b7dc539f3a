//! Q1.15 signal values
//!
//! Application math runs on a signed 16-bit fixed-point type covering
//! [-1.0, 1.0). The range maps linearly onto servo pulse widths around the
//! neutral pulse; most servos reach their mechanical limits well inside
//! the representable range. All arithmetic saturates at the type bounds
//! instead of wrapping, so a chain of operations degrades to a clipped
//! value rather than a sign flip.

use crate::io::servo_out::{DEFAULT_SERVO_PULSE, MAX_SERVO_PULSE, MIN_SERVO_PULSE};
use crate::io::time_base::{us_to_ticks, Tick};

/// Pulse offset corresponding to a full-scale value of 1.0
const FULL_SCALE_TICKS: i32 = us_to_ticks(1000) as i32;

const FRACTION_BITS: u32 = 15;

/// A Q1.15 fixed-point value in [-1.0, 1.0)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcValue(i16);

impl RcValue {
    /// -1.0
    pub const MIN: RcValue = RcValue(i16::MIN);
    /// 0.99997, the largest representable value
    pub const MAX: RcValue = RcValue(i16::MAX);
    /// 0.0
    pub const ZERO: RcValue = RcValue(0);

    /// Build from the raw two's-complement representation
    pub const fn from_raw(raw: i16) -> Self {
        Self(raw)
    }

    /// The raw two's-complement representation
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Saturating addition
    pub const fn saturating_add(self, other: RcValue) -> RcValue {
        RcValue(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction
    pub const fn saturating_sub(self, other: RcValue) -> RcValue {
        RcValue(self.0.saturating_sub(other.0))
    }

    /// Saturating multiplication
    ///
    /// The only overflowing product is (-1.0) * (-1.0), which clips to
    /// [`RcValue::MAX`].
    pub const fn saturating_mul(self, other: RcValue) -> RcValue {
        let wide = (self.0 as i32 * other.0 as i32) >> FRACTION_BITS;
        RcValue(clamp_raw(wide))
    }

    /// Saturating division
    ///
    /// Any quotient at or beyond the bounds clips, division by zero
    /// included (it clips toward the sign of the dividend).
    pub const fn saturating_div(self, other: RcValue) -> RcValue {
        if other.0 == 0 {
            return if self.0 < 0 { RcValue::MIN } else { RcValue::MAX };
        }
        let wide = ((self.0 as i32) << FRACTION_BITS) / other.0 as i32;
        RcValue(clamp_raw(wide))
    }

    /// Saturating negation; -(-1.0) clips to [`RcValue::MAX`]
    pub const fn saturating_neg(self) -> RcValue {
        RcValue(self.0.saturating_neg())
    }

    /// Convert a measured pulse width to a value
    ///
    /// The neutral pulse maps to zero and a full-scale value to a
    /// 1000 µs offset; pulses beyond full scale clip.
    pub const fn from_pulse_ticks(pulse: Tick) -> RcValue {
        let offset = pulse as i32 - DEFAULT_SERVO_PULSE as i32;
        RcValue(clamp_raw((offset << FRACTION_BITS) / FULL_SCALE_TICKS))
    }

    /// Convert a value to a commanded pulse width
    ///
    /// The inverse of [`RcValue::from_pulse_ticks`], additionally clamped
    /// to the pulse protection bounds.
    pub const fn to_pulse_ticks(self) -> Tick {
        let offset = (self.0 as i32 * FULL_SCALE_TICKS) >> FRACTION_BITS;
        let pulse = DEFAULT_SERVO_PULSE as i32 + offset;
        if pulse < MIN_SERVO_PULSE as i32 {
            MIN_SERVO_PULSE
        } else if pulse > MAX_SERVO_PULSE as i32 {
            MAX_SERVO_PULSE
        } else {
            pulse as Tick
        }
    }
}

const fn clamp_raw(wide: i32) -> i16 {
    if wide > i16::MAX as i32 {
        i16::MAX
    } else if wide < i16::MIN as i32 {
        i16::MIN
    } else {
        wide as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raw representation of a float in [-1.0, 1.0)
    fn q(v: f32) -> RcValue {
        RcValue::from_raw((v * 32768.0).clamp(-32768.0, 32767.0) as i16)
    }

    #[test]
    fn test_add_saturates_at_bounds() {
        assert_eq!(q(0.75).saturating_add(q(0.75)), RcValue::MAX);
        assert_eq!(q(-0.75).saturating_add(q(-0.75)), RcValue::MIN);
        assert_eq!(q(0.25).saturating_add(q(0.25)), q(0.5));
    }

    #[test]
    fn test_sub_saturates_at_bounds() {
        assert_eq!(q(-0.75).saturating_sub(q(0.75)), RcValue::MIN);
        assert_eq!(RcValue::MAX.saturating_sub(RcValue::MIN), RcValue::MAX);
        assert_eq!(q(0.5).saturating_sub(q(0.25)), q(0.25));
    }

    #[test]
    fn test_mul() {
        assert_eq!(q(0.5).saturating_mul(q(0.5)), q(0.25));
        assert_eq!(q(-0.5).saturating_mul(q(0.5)), q(-0.25));
        assert_eq!(RcValue::ZERO.saturating_mul(RcValue::MAX), RcValue::ZERO);
        // the one overflowing product
        assert_eq!(RcValue::MIN.saturating_mul(RcValue::MIN), RcValue::MAX);
    }

    #[test]
    fn test_div() {
        assert_eq!(q(0.25).saturating_div(q(0.5)), q(0.5));
        assert_eq!(q(-0.25).saturating_div(q(0.5)), q(-0.5));
        // magnitude >= 1.0 clips
        assert_eq!(q(0.5).saturating_div(q(0.25)), RcValue::MAX);
        assert_eq!(q(-0.5).saturating_div(q(0.25)), RcValue::MIN);
        // division by zero clips toward the dividend's sign
        assert_eq!(q(0.1).saturating_div(RcValue::ZERO), RcValue::MAX);
        assert_eq!(q(-0.1).saturating_div(RcValue::ZERO), RcValue::MIN);
    }

    #[test]
    fn test_neg() {
        assert_eq!(q(0.5).saturating_neg(), q(-0.5));
        assert_eq!(RcValue::MIN.saturating_neg(), RcValue::MAX);
    }

    #[test]
    fn test_pulse_mapping() {
        assert_eq!(RcValue::ZERO.to_pulse_ticks(), DEFAULT_SERVO_PULSE);
        assert_eq!(RcValue::from_pulse_ticks(DEFAULT_SERVO_PULSE), RcValue::ZERO);

        // +-0.5 is a 500 us offset from neutral, give or take the
        // truncation of the fixed-point scaling
        let plus_half = q(0.5).to_pulse_ticks();
        assert!(plus_half.abs_diff(DEFAULT_SERVO_PULSE + us_to_ticks(500)) <= 1);

        let minus_half = q(-0.5).to_pulse_ticks();
        assert!(minus_half.abs_diff(DEFAULT_SERVO_PULSE - us_to_ticks(500)) <= 1);
    }

    #[test]
    fn test_pulse_mapping_clips() {
        // a pulse far beyond full scale clips the value
        assert_eq!(RcValue::from_pulse_ticks(MAX_SERVO_PULSE), RcValue::MAX);
        assert_eq!(RcValue::from_pulse_ticks(0), RcValue::MIN);

        // commanded pulses never leave the protection bounds
        assert!(RcValue::MAX.to_pulse_ticks() <= MAX_SERVO_PULSE);
        assert!(RcValue::MIN.to_pulse_ticks() >= MIN_SERVO_PULSE);
    }

    #[test]
    fn test_pulse_round_trip_near_center() {
        for us in [1100u32, 1300, 1520, 1700, 1900] {
            let pulse = us_to_ticks(us);
            let back = RcValue::from_pulse_ticks(pulse).to_pulse_ticks();
            assert!(pulse.abs_diff(back) <= 1, "{} -> {}", pulse, back);
        }
    }
}
