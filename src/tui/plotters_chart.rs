//! Plotters-powered process chart widget for Ratatui.
//!
//! One chart shows one variable: measured samples as dots, the simulated
//! trajectory as a line, each only when selected. Plotters output is rendered into the Ratatui buffer
//! through `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::domain::{AxisScale, Snapshot};
use crate::plot::{Shown, variable_series};

/// Series and bounds of one variable, already transformed for the y scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub measured: Vec<(f64, f64)>,
    pub simulated: Vec<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub scale: AxisScale,
}

impl ChartSeries {
    /// Collect the shown series of `variable` from the snapshot.
    ///
    /// On a log scale values are mapped to `log10` and non-positive ones are
    /// dropped. Returns `None` when nothing is left to draw.
    pub fn from_snapshot(snapshot: &Snapshot, variable: &str, shown: Shown, scale: AxisScale) -> Option<Self> {
        let (measured, simulated) = variable_series(snapshot, variable, shown, scale);
        if measured.is_empty() && simulated.is_empty() {
            return None;
        }

        let all = || measured.iter().chain(&simulated);
        let x_bounds = bounds(all().map(|p| p.0), 0.0);
        let y_bounds = bounds(all().map(|p| p.1), 0.05);
        Some(Self {
            measured,
            simulated,
            x_bounds,
            y_bounds,
            scale,
        })
    }

    /// Tick label for an axis value.
    pub fn format_y(&self, v: f64) -> String {
        match self.scale {
            AxisScale::Linear => format!("{v:.2}"),
            AxisScale::Log => format!("{:.2}", 10f64.powf(v)),
        }
    }
}

fn bounds(values: impl Iterator<Item = f64>, pad_frac: f64) -> [f64; 2] {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    if hi <= lo {
        return [lo - 0.5, hi + 0.5];
    }
    let pad = (hi - lo) * pad_frac;
    [lo - pad, hi + pad]
}

/// Render-only chart description.
pub struct ProcessChart<'a> {
    pub series: &'a ChartSeries,
    pub y_label: &'a str,
    pub measured_color: RGBColor,
    pub simulated_color: RGBColor,
    pub axis_color: RGBColor,
}

impl Widget for ProcessChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters cannot lay out a mesh in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.series.x_bounds;
        let [y0, y1] = self.series.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let series = self.series;
        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 7)
                .set_label_area_size(LabelAreaPosition::Bottom, 2)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("t (h)")
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(4)
                .x_label_formatter(&|v| format!("{v:.1}"))
                .y_label_formatter(&|v| series.format_y(*v))
                .label_style(("sans-serif", 10).into_font().color(&self.axis_color))
                .axis_style(&self.axis_color)
                .bold_line_style(&self.axis_color)
                .draw()?;

            chart.draw_series(LineSeries::new(series.simulated.iter().copied(), &self.simulated_color))?;

            // `Circle` radii are mis-scaled by the ratatui backend; a pixel reads as a dot.
            chart.draw_series(
                series
                    .measured
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), self.measured_color)),
            )?;

            Ok(())
        });

        widget.render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParamMap, Table};
    use std::collections::BTreeMap;

    const BOTH: Shown = Shown {
        measured: true,
        simulated: true,
    };

    fn snapshot() -> Snapshot {
        let mut offline = Table::new(vec!["cX".to_string(), "cS".to_string()]);
        offline.push_row(1.0, vec![Some(0.5), Some(0.0)]).unwrap();
        offline.push_row(3.0, vec![Some(2.0), None]).unwrap();
        let mut measured = BTreeMap::new();
        measured.insert("offline".to_string(), offline);

        let mut sim = Table::new(vec!["cX".to_string()]);
        sim.push_row(0.0, vec![Some(0.1)]).unwrap();
        sim.push_row(5.0, vec![Some(10.0)]).unwrap();
        Snapshot::new(measured, sim, ParamMap::new())
    }

    #[test]
    fn bounds_cover_measured_and_simulated() {
        let series = ChartSeries::from_snapshot(&snapshot(), "cX", BOTH, AxisScale::Linear).unwrap();
        assert_eq!(series.measured, vec![(1.0, 0.5), (3.0, 2.0)]);
        assert_eq!(series.simulated.len(), 2);
        assert_eq!(series.x_bounds, [0.0, 5.0]);
        assert!((series.y_bounds[0] - (0.1 - 0.495)).abs() < 1e-12);
        assert!((series.y_bounds[1] - (10.0 + 0.495)).abs() < 1e-12);
    }

    #[test]
    fn log_scale_drops_non_positive_points() {
        let series = ChartSeries::from_snapshot(&snapshot(), "cS", BOTH, AxisScale::Log);
        // The only cS sample is 0.0, which has no logarithm.
        assert!(series.is_none());

        let series = ChartSeries::from_snapshot(&snapshot(), "cX", BOTH, AxisScale::Log).unwrap();
        assert_eq!(series.simulated.len(), 2);
        assert!((series.simulated[0].1 + 1.0).abs() < 1e-12);
        assert!((series.simulated[1].1 - 1.0).abs() < 1e-12);
        assert_eq!(series.format_y(1.0), "10.00");
    }

    #[test]
    fn single_point_gets_a_unit_window() {
        let mut sim = Table::new(vec!["CO2".to_string()]);
        sim.push_row(2.0, vec![Some(4.0)]).unwrap();
        let snap = Snapshot::new(BTreeMap::new(), sim, ParamMap::new());
        let series = ChartSeries::from_snapshot(&snap, "CO2", BOTH, AxisScale::Linear).unwrap();
        assert_eq!(series.x_bounds, [1.5, 2.5]);
        assert_eq!(series.y_bounds, [3.5, 4.5]);
        assert!(ChartSeries::from_snapshot(&Snapshot::empty(), "CO2", BOTH, AxisScale::Linear).is_none());
    }

    #[test]
    fn hidden_series_do_not_stretch_the_bounds() {
        let measured_only = Shown {
            measured: true,
            simulated: false,
        };
        let series = ChartSeries::from_snapshot(&snapshot(), "cX", measured_only, AxisScale::Linear).unwrap();
        assert!(series.simulated.is_empty());
        assert_eq!(series.x_bounds, [1.0, 3.0]);

        let simulated_only = Shown {
            measured: false,
            simulated: true,
        };
        let series = ChartSeries::from_snapshot(&snapshot(), "cX", simulated_only, AxisScale::Linear).unwrap();
        assert!(series.measured.is_empty());
        assert_eq!(series.x_bounds, [0.0, 5.0]);

        assert!(ChartSeries::from_snapshot(&snapshot(), "cX", Shown::default(), AxisScale::Linear).is_none());
    }
}
