pub use crate::config::PositionSizing;

/// Turns a signal's confidence into a position value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRule {
    pub mode: PositionSizing,
    /// Fraction of total value allocated before confidence scaling
    pub base_fraction: f64,
}

impl Default for SizingRule {
    fn default() -> Self {
        Self {
            mode: PositionSizing::ConfidenceAdaptive,
            base_fraction: 0.15,
        }
    }
}

impl SizingRule {
    /// Position value to commit, clamped to the per-position cap and cash
    pub fn position_value(
        &self,
        total_value: f64,
        cash: f64,
        max_position_fraction: f64,
        confidence: f64,
    ) -> f64 {
        let base = total_value * self.base_fraction;
        let sized = match self.mode {
            PositionSizing::Fixed => base,
            // 50% of base at zero confidence, 100% at full confidence
            PositionSizing::ConfidenceAdaptive => base * (0.5 + confidence.clamp(0.0, 1.0) * 0.5),
        };

        sized
            .min(total_value * max_position_fraction)
            .min(cash)
            .max(0.0)
    }
}
