use std::fmt;

use serde::{Deserialize, Serialize};

/// Lunar phase of a single day, classified against its neighbors' visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LunarPhase {
    NewMoon,
    Increasing,
    FullMoon,
    Decreasing,
}

impl LunarPhase {
    /// Classify a day from the lunar visibility of yesterday, today and tomorrow.
    pub fn classify(previous: f64, current: f64, next: f64) -> Self {
        if previous < current {
            if current < next {
                LunarPhase::Increasing
            } else {
                LunarPhase::FullMoon
            }
        } else if current < next {
            LunarPhase::NewMoon
        } else {
            LunarPhase::Decreasing
        }
    }

    /// Full or new moon: a local maximum or minimum of visibility.
    pub fn is_lunar_extreme(self) -> bool {
        matches!(self, LunarPhase::NewMoon | LunarPhase::FullMoon)
    }
}

impl fmt::Display for LunarPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LunarPhase::NewMoon => "new moon",
            LunarPhase::Increasing => "increasing",
            LunarPhase::FullMoon => "full moon",
            LunarPhase::Decreasing => "decreasing",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(LunarPhase::classify(0.2, 0.4, 0.6), LunarPhase::Increasing);
        assert_eq!(LunarPhase::classify(0.8, 1.0, 0.8), LunarPhase::FullMoon);
        assert_eq!(LunarPhase::classify(0.2, 0.0, 0.2), LunarPhase::NewMoon);
        assert_eq!(LunarPhase::classify(0.6, 0.4, 0.2), LunarPhase::Decreasing);
    }

    #[test]
    fn test_plateau_classification() {
        // Equal visibility on the rising side counts as the peak.
        assert_eq!(LunarPhase::classify(0.4, 0.6, 0.6), LunarPhase::FullMoon);
        assert_eq!(LunarPhase::classify(0.6, 0.6, 0.4), LunarPhase::Decreasing);
    }

    #[test]
    fn test_extremes() {
        assert!(LunarPhase::NewMoon.is_lunar_extreme());
        assert!(LunarPhase::FullMoon.is_lunar_extreme());
        assert!(!LunarPhase::Increasing.is_lunar_extreme());
        assert!(!LunarPhase::Decreasing.is_lunar_extreme());
    }
}
