//! Canonical movement actions shared in shape by every skater.

use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// Full turn in degrees.
pub const FULL_TURN: u32 = 360;

/// One of the evenly spaced movement directions with a fixed step per round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAction {
    angle: u32,
    step_distance: f64,
}

impl CanonicalAction {
    /// Direction of movement in degrees, in `[0, 360)`.
    pub fn angle(&self) -> u32 {
        self.angle
    }

    /// Distance covered in one round when the move is not blocked.
    pub fn step_distance(&self) -> f64 {
        self.step_distance
    }
}

/// Build the catalog of canonical actions `0, base_angle, 2 * base_angle, ...` below 360.
///
/// The result is sorted by ascending angle, which is the iteration order used
/// everywhere a deterministic traversal is needed.
///
/// # Errors
/// Returns [`SimError::Configuration`] if `base_angle` is zero or does not divide 360,
/// or if `step_distance` is not a finite positive number.
pub fn build_catalog(
    base_angle: u32,
    step_distance: f64,
) -> Result<Vec<CanonicalAction>, SimError> {
    if base_angle == 0 || FULL_TURN % base_angle != 0 {
        return Err(SimError::configuration(format!(
            "{FULL_TURN} is not divisible by base angle {base_angle} without remainder"
        )));
    }
    if !step_distance.is_finite() || step_distance <= 0.0 {
        return Err(SimError::configuration(format!(
            "step distance must be finite and positive, but is {step_distance}"
        )));
    }

    let catalog = (0..FULL_TURN)
        .step_by(base_angle as usize)
        .map(|angle| CanonicalAction {
            angle,
            step_distance,
        })
        .collect();

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn catalog_for_45_degrees() {
        let catalog = build_catalog(45, 1.0).unwrap();
        let angles: Vec<_> = catalog.iter().map(|a| a.angle()).collect();
        assert_eq!(angles, vec![0, 45, 90, 135, 180, 225, 270, 315]);
        assert!(catalog.iter().all(|a| a.step_distance() == 1.0));
    }

    #[test]
    fn rejects_non_divisor() {
        let err = build_catalog(7, 1.0).unwrap_err();
        assert!(matches!(err, SimError::Configuration { .. }));
        assert!(build_catalog(0, 1.0).is_err());
    }

    #[test]
    fn rejects_bad_step_distance() {
        assert!(build_catalog(60, 0.0).is_err());
        assert!(build_catalog(60, -1.0).is_err());
        assert!(build_catalog(60, f64::NAN).is_err());
    }

    #[test]
    fn accepts_exactly_the_divisors_of_a_full_turn() {
        for base_angle in 1..=FULL_TURN {
            match build_catalog(base_angle, 1.0) {
                Ok(catalog) => {
                    assert_eq!(FULL_TURN % base_angle, 0);
                    assert_eq!(catalog.len() as u32, FULL_TURN / base_angle);
                }
                Err(err) => {
                    assert_ne!(FULL_TURN % base_angle, 0);
                    assert!(matches!(err, SimError::Configuration { .. }));
                }
            }
        }
    }

    fn divisors() -> Vec<u32> {
        (1..=FULL_TURN).filter(|d| FULL_TURN % d == 0).collect()
    }

    proptest! {
        #[test]
        fn catalog_is_uniform(
            base_angle in prop::sample::select(divisors()),
            step_distance in 0.01f64..100.0,
        ) {
            let catalog = build_catalog(base_angle, step_distance).unwrap();
            prop_assert_eq!(catalog.len() as u32, FULL_TURN / base_angle);
            prop_assert_eq!(catalog[0].angle(), 0);
            for pair in catalog.windows(2) {
                prop_assert_eq!(pair[1].angle() - pair[0].angle(), base_angle);
            }
            prop_assert!(catalog.last().unwrap().angle() < FULL_TURN);
            prop_assert!(catalog.iter().all(|a| a.step_distance() == step_distance));
        }
    }
}
