//! Evenly spaced time grids.

/// `n` evenly spaced points from `start` to `stop`, both ends included.
///
/// `n == 0` yields an empty grid and `n == 1` yields `[start]`.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Simulation grid over `[0, hours]` with `round(hours * points_per_hour)` points.
///
/// Rounding is half-to-even so that e.g. 2.5 points round to 2.
pub fn time_grid(hours: f64, points_per_hour: f64) -> Vec<f64> {
    let n = (hours * points_per_hour).round_ties_even();
    if !n.is_finite() || n <= 0.0 {
        return Vec::new();
    }
    linspace(0.0, hours, n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_includes_both_ends() {
        let g = linspace(0.0, 1.0, 5);
        assert_eq!(g, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn ten_hours_gives_one_point_per_minute() {
        let g = time_grid(10.0, 60.0);
        assert_eq!(g.len(), 600);
        assert_eq!(g[0], 0.0);
        assert_eq!(*g.last().unwrap(), 10.0);
    }

    #[test]
    fn fractional_point_counts_round_half_to_even() {
        assert_eq!(time_grid(0.5, 5.0).len(), 2);
        assert_eq!(time_grid(0.5, 7.0).len(), 4);
        assert!(time_grid(0.0, 60.0).is_empty());
    }
}
