//! Host reference for the diff histogram.
//!
//! The diff buffer holds one exponential moving average of per-frame count
//! growth per cell, stored as raw `f32` bits in the `u32` histogram layout.
//! Averages are never negative, so the bit patterns order the same way as
//! the values and the integer maximum reduction applies unchanged.

/// Growth of one cell since the previous frame. Counts never decrease
/// between resets; a smaller current count reads as no growth.
pub fn growth(current: u32, previous: u32) -> f32 {
    current.saturating_sub(previous) as f32
}

/// One moving-average step: `alpha * growth + (1 - alpha) * average`.
pub fn moving_average(average: f32, growth: f32, alpha: f32) -> f32 {
    alpha * growth + (1.0 - alpha) * average
}

/// Decodes one diff cell.
pub fn average_from_bits(bits: u32) -> f32 {
    f32::from_bits(bits)
}

/// Encodes one diff cell.
pub fn average_to_bits(average: f32) -> u32 {
    average.to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_growth_decays_to_zero() {
        let mut average = moving_average(0.0, 5.0, 0.05);
        assert!((average - 0.25).abs() < 1e-6);
        for _ in 0..200 {
            average = moving_average(average, 0.0, 0.05);
        }
        assert!(average < 1e-4, "{average}");
    }

    #[test]
    fn test_steady_growth_converges() {
        let mut average = 0.0;
        for _ in 0..500 {
            average = moving_average(average, 3.0, 0.05);
        }
        assert!((average - 3.0).abs() < 1e-3, "{average}");
    }

    #[test]
    fn test_growth_never_negative() {
        assert_eq!(growth(7, 3), 4.0);
        assert_eq!(growth(3, 7), 0.0);
    }

    #[test]
    fn test_bit_patterns_order_like_values() {
        let values = [0.0f32, 1e-6, 0.05, 0.5, 1.0, 3.25, 1e6];
        for pair in values.windows(2) {
            assert!(average_to_bits(pair[0]) < average_to_bits(pair[1]));
        }
        assert_eq!(average_to_bits(0.0), 0);
        assert_eq!(average_from_bits(average_to_bits(3.25)), 3.25);
    }
}
