//! Fault decision.

use rand::Rng;

/// Whether this node is faulty. Drawn once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultDecision {
    faulty: bool,
    draw: u8,
}

impl FaultDecision {
    /// Draws uniformly from `[0, 100)` and marks the node faulty if the draw is below
    /// `percent`.
    pub fn decide<R: Rng + ?Sized>(percent: u8, rng: &mut R) -> Self {
        let draw = rng.random_range(0..100u8);
        Self {
            faulty: draw < percent,
            draw,
        }
    }

    pub fn is_faulty(&self) -> bool {
        self.faulty
    }

    pub fn draw(&self) -> u8 {
        self.draw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    proptest! {
        #[test]
        fn hundred_percent_always_fails(seed in any::<u64>()) {
            let decision = FaultDecision::decide(100, &mut StdRng::seed_from_u64(seed));
            prop_assert!(decision.is_faulty());
        }

        #[test]
        fn zero_percent_never_fails(seed in any::<u64>()) {
            let decision = FaultDecision::decide(0, &mut StdRng::seed_from_u64(seed));
            prop_assert!(!decision.is_faulty());
        }

        #[test]
        fn faulty_iff_draw_below_percent(seed in any::<u64>(), percent in 0u8..=100) {
            let decision = FaultDecision::decide(percent, &mut StdRng::seed_from_u64(seed));
            prop_assert!(decision.draw() < 100);
            prop_assert_eq!(decision.is_faulty(), decision.draw() < percent);
        }
    }
}
