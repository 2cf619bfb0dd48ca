// SPDX-License-Identifier: MIT OR Apache-2.0
//! Easing functions for track transitions.

use serde::{Deserialize, Serialize};

/// Easing applied to a transition's normalized progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    /// Identity
    #[default]
    Linear,
    /// Quadratic ease-in
    InQuad,
    /// Quadratic ease-out
    OutQuad,
    /// Quadratic ease-in-out
    InOutQuad,
    /// Cubic ease-in
    InCubic,
    /// Cubic ease-out
    OutCubic,
    /// Sine ease-in
    InSine,
    /// Sine ease-out
    OutSine,
    /// Sine ease-in-out
    InOutSine,
}

impl Easing {
    /// Map normalized progress `t` in `[0, 1]` through this curve
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::InQuad => t * t,
            Easing::OutQuad => t * (2.0 - t),
            Easing::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    let u = t - 1.0;
                    1.0 - 2.0 * u * u
                }
            }
            Easing::InCubic => t * t * t,
            Easing::OutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Easing::InSine => 1.0 - (t * std::f64::consts::FRAC_PI_2).cos(),
            Easing::OutSine => (t * std::f64::consts::FRAC_PI_2).sin(),
            Easing::InOutSine => 0.5 * (1.0 - (t * std::f64::consts::PI).cos()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EASINGS: [Easing; 9] = [
        Easing::Linear,
        Easing::InQuad,
        Easing::OutQuad,
        Easing::InOutQuad,
        Easing::InCubic,
        Easing::OutCubic,
        Easing::InSine,
        Easing::OutSine,
        Easing::InOutSine,
    ];

    #[test]
    fn test_endpoints_fixed() {
        for easing in EASINGS {
            assert!(easing.apply(0.0).abs() < 1e-9, "{easing:?} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9, "{easing:?} at 1");
        }
    }

    #[test]
    fn test_monotonic_on_unit_interval() {
        for easing in EASINGS {
            let mut prev = easing.apply(0.0);
            for i in 1..=100 {
                let v = easing.apply(f64::from(i) / 100.0);
                assert!(v >= prev - 1e-12, "{easing:?} decreased at step {i}");
                prev = v;
            }
        }
    }

    #[test]
    fn test_out_quad_front_loads() {
        assert!(Easing::OutQuad.apply(0.5) > 0.5);
        assert!(Easing::InQuad.apply(0.5) < 0.5);
    }
}
