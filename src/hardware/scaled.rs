//! Physical-unit adapter over a pulse axis.
//!
//! `ScaledAxis` maps pulses to a linear physical unit (millimetres, degrees, ...):
//!
//! ```text
//! units = pulses * units_per_pulse + offset
//! ```
//!
//! Unit targets are rounded to the nearest whole pulse. Relative moves in units are issued as
//! hardware relative moves, so no position is read back to compute them.

use crate::error::{StageError, StageResult};
use crate::hardware::capabilities::PulseAxis;
use crate::hardware::types::Axis;

#[derive(Debug, Clone)]
pub struct ScaledAxis<A: PulseAxis> {
    inner: A,
    units_per_pulse: f64,
    offset: f64,
}

impl<A: PulseAxis> ScaledAxis<A> {
    /// Wrap `inner` with `units_per_pulse` (e.g. 0.002 mm per pulse) and zero offset.
    ///
    /// # Errors
    /// Returns `InvalidParameter` unless `units_per_pulse` is finite and non-zero.
    pub fn new(inner: A, units_per_pulse: f64) -> StageResult<Self> {
        if !units_per_pulse.is_finite() || units_per_pulse == 0.0 {
            return Err(StageError::InvalidParameter(format!(
                "units per pulse must be finite and non-zero, got {units_per_pulse}"
            )));
        }
        Ok(Self {
            inner,
            units_per_pulse,
            offset: 0.0,
        })
    }

    /// Unit value reported at pulse position 0.
    pub fn with_offset(mut self, offset: f64) -> StageResult<Self> {
        if !offset.is_finite() {
            return Err(StageError::InvalidParameter(format!(
                "offset must be finite, got {offset}"
            )));
        }
        self.offset = offset;
        Ok(self)
    }

    pub fn units_per_pulse(&self) -> f64 {
        self.units_per_pulse
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }

    pub fn to_units(&self, pulses: i64) -> f64 {
        pulses as f64 * self.units_per_pulse + self.offset
    }

    /// Nearest pulse position for `units`.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if the result is not a representable pulse count.
    pub fn to_pulses(&self, units: f64) -> StageResult<i64> {
        self.distance_to_pulses(units - self.offset)
    }

    fn distance_to_pulses(&self, distance: f64) -> StageResult<i64> {
        let pulses = (distance / self.units_per_pulse).round();
        if !pulses.is_finite() || pulses.abs() >= i64::MAX as f64 {
            return Err(StageError::InvalidParameter(format!(
                "{distance} units is not a representable pulse distance on axis {}",
                self.inner.axis()
            )));
        }
        Ok(pulses as i64)
    }

    /// Current position in units.
    pub fn units(&self) -> StageResult<f64> {
        Ok(self.to_units(self.inner.position()?))
    }

    pub fn move_to_units(&self, target: f64) -> StageResult<()> {
        let pulses = self.to_pulses(target)?;
        self.inner.move_absolute_pulses(pulses)
    }

    pub fn move_by_units(&self, distance: f64) -> StageResult<()> {
        let pulses = self.distance_to_pulses(distance)?;
        self.inner.move_relative_pulses(pulses)
    }
}

impl<A: PulseAxis> PulseAxis for ScaledAxis<A> {
    fn axis(&self) -> Axis {
        self.inner.axis()
    }

    fn position(&self) -> StageResult<i64> {
        self.inner.position()
    }

    fn move_absolute_pulses(&self, target: i64) -> StageResult<()> {
        self.inner.move_absolute_pulses(target)
    }

    fn move_relative_pulses(&self, delta: i64) -> StageResult<()> {
        self.inner.move_relative_pulses(delta)
    }

    fn reset(&self) -> StageResult<()> {
        self.inner.reset()
    }

    fn is_ready(&self) -> StageResult<bool> {
        self.inner.is_ready()
    }

    fn wait_until_ready(&self) -> StageResult<()> {
        self.inner.wait_until_ready()
    }

    fn stop(&self) -> StageResult<()> {
        self.inner.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingAxis {
        position: Cell<i64>,
        moves: RefCell<Vec<String>>,
    }

    impl PulseAxis for RecordingAxis {
        fn axis(&self) -> Axis {
            Axis::One
        }
        fn position(&self) -> StageResult<i64> {
            Ok(self.position.get())
        }
        fn move_absolute_pulses(&self, target: i64) -> StageResult<()> {
            self.moves.borrow_mut().push(format!("A{target}"));
            self.position.set(target);
            Ok(())
        }
        fn move_relative_pulses(&self, delta: i64) -> StageResult<()> {
            self.moves.borrow_mut().push(format!("M{delta}"));
            self.position.set(self.position.get() + delta);
            Ok(())
        }
        fn reset(&self) -> StageResult<()> {
            self.position.set(0);
            Ok(())
        }
        fn is_ready(&self) -> StageResult<bool> {
            Ok(true)
        }
        fn wait_until_ready(&self) -> StageResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rejects_degenerate_scale() {
        assert!(ScaledAxis::new(RecordingAxis::default(), 0.0).is_err());
        assert!(ScaledAxis::new(RecordingAxis::default(), f64::NAN).is_err());
        assert!(ScaledAxis::new(RecordingAxis::default(), 0.002)
            .unwrap()
            .with_offset(f64::INFINITY)
            .is_err());
    }

    #[test]
    fn test_unit_moves_round_to_nearest_pulse() {
        let stage = ScaledAxis::new(RecordingAxis::default(), 0.001).unwrap();
        // 0.3 / 0.001 is 299.99999999999994 in binary floating point
        stage.move_to_units(0.3).unwrap();
        assert_eq!(stage.position().unwrap(), 300);
        stage.move_by_units(-0.0504).unwrap();
        assert_eq!(stage.inner().moves.borrow().as_slice(), ["A300", "M-50"]);
        assert!((stage.units().unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_offset_and_negative_scale() {
        let stage = ScaledAxis::new(RecordingAxis::default(), -0.5)
            .unwrap()
            .with_offset(10.0)
            .unwrap();
        assert_eq!(stage.to_pulses(10.0).unwrap(), 0);
        assert_eq!(stage.to_pulses(5.0).unwrap(), 10);
        assert!((stage.to_units(-4) - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_range_target() {
        let stage = ScaledAxis::new(RecordingAxis::default(), 1.0).unwrap();
        assert!(matches!(
            stage.move_to_units(1e300),
            Err(StageError::InvalidParameter(_))
        ));
        assert!(stage.move_by_units(f64::NAN).is_err());
        assert!(stage.inner().moves.borrow().is_empty());
    }
}
