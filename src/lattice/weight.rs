//! Two-part lattice weight: graph cost plus acoustic cost.

/// Costs are negated log probabilities; smaller is better.
///
/// The two parts are kept apart so the acoustic part can be rescaled on
/// its own. Paths are ranked by the sum of both parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeWeight {
    pub graph: f32,
    pub acoustic: f32,
}

impl LatticeWeight {
    /// Identity of [`times`](Self::times): a free transition.
    pub const ONE: Self = Self {
        graph: 0.0,
        acoustic: 0.0,
    };

    /// Annihilator: an impossible transition or a non-final state.
    pub const ZERO: Self = Self {
        graph: f32::INFINITY,
        acoustic: f32::INFINITY,
    };

    pub fn new(graph: f32, acoustic: f32) -> Self {
        Self { graph, acoustic }
    }

    /// Weight of following `self` then `other`.
    pub fn times(self, other: Self) -> Self {
        if self.is_zero() || other.is_zero() {
            Self::ZERO
        } else {
            Self {
                graph: self.graph + other.graph,
                acoustic: self.acoustic + other.acoustic,
            }
        }
    }

    /// Total cost used for ranking.
    pub fn value(&self) -> f32 {
        self.graph + self.acoustic
    }

    pub fn is_zero(&self) -> bool {
        self.graph == f32::INFINITY || self.acoustic == f32::INFINITY
    }

    /// Multiply the acoustic part by `factor`; [`ZERO`](Self::ZERO) stays zero.
    pub fn scale_acoustic(self, factor: f32) -> Self {
        if self.is_zero() {
            self
        } else {
            Self {
                graph: self.graph,
                acoustic: self.acoustic * factor,
            }
        }
    }
}

impl Default for LatticeWeight {
    fn default() -> Self {
        Self::ONE
    }
}

/// Factor that undoes search-time acoustic scaling, or `None` when the
/// scale is zero and weights must be left as they are.
pub fn unscale_factor(acoustic_scale: f32) -> Option<f32> {
    (acoustic_scale != 0.0).then(|| 1.0 / acoustic_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_adds_componentwise() {
        let w = LatticeWeight::new(1.0, 2.0).times(LatticeWeight::new(0.5, -1.0));
        assert_eq!(w, LatticeWeight::new(1.5, 1.0));
        assert_eq!(w.value(), 2.5);
        assert_eq!(LatticeWeight::ONE.times(w), w);
    }

    #[test]
    fn zero_annihilates() {
        let w = LatticeWeight::new(1.0, 2.0);
        assert!(w.times(LatticeWeight::ZERO).is_zero());
        assert!(LatticeWeight::ZERO.scale_acoustic(0.5).is_zero());
        assert!(!LatticeWeight::ONE.is_zero());
    }

    #[test]
    fn unscaling_divides_acoustic_part_only() {
        let factor = unscale_factor(0.0769).unwrap();
        let w = LatticeWeight::new(3.0, 7.69).scale_acoustic(factor);
        assert_eq!(w.graph, 3.0);
        assert!((w.acoustic - 100.0).abs() < 1e-3, "{}", w.acoustic);
    }

    #[test]
    fn zero_scale_means_no_unscaling() {
        assert_eq!(unscale_factor(0.0), None);
    }
}
