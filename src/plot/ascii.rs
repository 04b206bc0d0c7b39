//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - measured points: `o`
//! - simulated trajectory: `-` line

use crate::domain::{AxisScale, Snapshot};
use crate::plot::selection::{PlotSelection, Shown, variable_series};

/// Render one panel per selected variable that has something to draw.
pub fn render_snapshot_plots(snapshot: &Snapshot, selection: &PlotSelection, width: usize, height: usize) -> String {
    let mut out = String::new();
    for var in selection.panels() {
        let panel = render_variable_plot(
            snapshot,
            var,
            selection.shown(var),
            width,
            height,
            selection.scale_for(var),
        );
        if let Some(panel) = panel {
            out.push_str(&panel);
            out.push('\n');
        }
    }
    out
}

/// Render the shown series of one variable.
///
/// Returns `None` when the snapshot has no values for `variable`.
pub fn render_variable_plot(
    snapshot: &Snapshot,
    variable: &str,
    shown: Shown,
    width: usize,
    height: usize,
    scale: AxisScale,
) -> Option<String> {
    let (measured, curve) = variable_series(snapshot, variable, shown, scale);
    if measured.is_empty() && curve.is_empty() {
        return None;
    }

    let (t_min, t_max) = range(measured.iter().chain(&curve).map(|p| p.0)).unwrap_or((0.0, 1.0));
    Some(render_plot(variable, &measured, &curve, t_min, t_max, width, height, scale))
}

#[allow(clippy::too_many_arguments)]
fn render_plot(
    label: &str,
    points: &[(f64, f64)],
    curve: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
    scale: AxisScale,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (y_min, y_max) = range(points.iter().chain(curve).map(|p| p.1)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);

    for &(t, y) in points {
        let x = map_x(t, t_min, t_max, width);
        let y = map_y(y, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    let mut out = String::new();
    match scale {
        AxisScale::Linear => out.push_str(&format!(
            "Plot {label}: t=[{t_min:.2}, {t_max:.2}] h | y=[{y_min:.3}, {y_max:.3}]\n"
        )),
        AxisScale::Log => out.push_str(&format!(
            "Plot {label}: t=[{t_min:.2}, {t_max:.2}] h | log10 y=[{y_min:.3}, {y_max:.3}]\n"
        )),
    }

    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }

    out
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() {
        if max > min {
            Some((min, max))
        } else {
            Some((min - 0.5, max + 0.5))
        }
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParamMap, Table, VariableSelection};
    use std::collections::BTreeMap;

    const BOTH: Shown = Shown {
        measured: true,
        simulated: true,
    };

    fn snapshot() -> Snapshot {
        let mut offline = Table::new(vec!["cX".to_string()]);
        offline.push_row(0.0, vec![Some(1.0)]).unwrap();
        offline.push_row(9.0, vec![Some(11.0)]).unwrap();
        let mut measured = BTreeMap::new();
        measured.insert("offline".to_string(), offline);

        let mut sim = Table::new(vec!["cX".to_string()]);
        sim.push_row(0.0, vec![Some(1.0)]).unwrap();
        sim.push_row(9.0, vec![Some(1.0)]).unwrap();
        Snapshot::new(measured, sim, ParamMap::new())
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let txt = render_variable_plot(&snapshot(), "cX", BOTH, 10, 5, AxisScale::Linear).unwrap();
        let expected = concat!(
            "Plot cX: t=[0.00, 9.00] h | y=[0.500, 11.500]\n",
            "         o\n",
            "\n",
            "\n",
            "\n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn log_scale_drops_non_positive_values() {
        let mut snap = snapshot();
        snap.measured_data
            .get_mut("offline")
            .unwrap()
            .push_row(10.0, vec![Some(0.0)])
            .unwrap();
        let txt = render_variable_plot(&snap, "cX", BOTH, 10, 5, AxisScale::Log).unwrap();
        assert!(txt.starts_with("Plot cX: t=[0.00, 9.00] h | log10 y="));
    }

    #[test]
    fn unknown_variables_are_skipped() {
        assert!(render_variable_plot(&snapshot(), "pH", BOTH, 10, 5, AxisScale::Linear).is_none());
        let offered = VariableSelection {
            measurement_vars: vec!["pH".to_string(), "cX".to_string()],
            simulated_vars: Vec::new(),
        };
        let all = render_snapshot_plots(&snapshot(), &PlotSelection::new(&offered), 10, 5);
        assert!(all.starts_with("Plot cX"));
        assert!(render_snapshot_plots(&Snapshot::empty(), &PlotSelection::new(&offered), 10, 5).is_empty());
    }

    #[test]
    fn hidden_simulation_leaves_only_points() {
        let offered = VariableSelection {
            measurement_vars: vec!["cX".to_string()],
            simulated_vars: vec!["cX".to_string()],
        };
        let body = |txt: &str| txt.lines().skip(1).collect::<Vec<_>>().join("\n");

        let measured_only = render_snapshot_plots(&snapshot(), &PlotSelection::new(&offered), 10, 5);
        assert!(!body(&measured_only).contains('-'));
        assert_eq!(body(&measured_only).matches('o').count(), 2);

        let curve_only = PlotSelection::new(&offered).with_shown(&[], &["cX".to_string()]);
        let txt = render_snapshot_plots(&snapshot(), &curve_only, 10, 5);
        assert!(txt.starts_with("Plot cX: t=[0.00, 9.00] h | y=[1.000, 1.000]"));
        assert!(!body(&txt).contains('o'));
        assert!(body(&txt).contains("----------"));
    }

    #[test]
    fn secondary_variables_use_their_own_scale() {
        let offered = VariableSelection {
            measurement_vars: vec!["cX".to_string()],
            simulated_vars: vec!["cX".to_string()],
        };
        let selection = PlotSelection::new(&offered).with_secondary(&["cX".to_string()], AxisScale::Log);
        let txt = render_snapshot_plots(&snapshot(), &selection, 10, 5);
        assert!(txt.contains("log10 y="));
    }
}
