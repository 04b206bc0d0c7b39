//! Ratatui-based monitoring dashboard.
//!
//! Cycles run on a worker thread; the UI thread owns the `Session`, queues
//! triggers (timer ticks, key presses) and hands them to the worker one at a
//! time. Manual estimate presses are dropped while a cycle is in flight.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::app::pipeline::{Monitor, build_monitor};
use crate::control::{Plan, RunOutcome, RunRequest, Session, Trigger};
use crate::domain::{AutoEstimation, AxisScale, MonitorConfig, Rgb};
use crate::plot::PlotSelection;
use crate::error::AppError;
use crate::fit::EstimationReport;
use crate::report::{VariableFit, compute_fit_stats, plan_label};

mod input;
mod plotters_chart;

use input::{Action, Mode, PARAM_COLUMNS, ViewState, format_number, scale_label};
use plotters_chart::{ChartSeries, ProcessChart};

const OPTIONS_WIDTH: u16 = 54;

/// Start the dashboard.
pub fn run(config: MonitorConfig, auto_estimation: AutoEstimation) -> Result<(), AppError> {
    let monitor = build_monitor(config)?;
    let mut app = App::new(monitor, auto_estimation)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::runtime(format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::runtime(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::runtime(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// The control loop running on its own thread.
struct Worker {
    requests: Sender<RunRequest>,
    outcomes: Receiver<RunOutcome>,
}

impl Worker {
    fn spawn(monitor: Monitor) -> Result<Self, AppError> {
        let (requests, request_rx) = mpsc::channel::<RunRequest>();
        let (outcome_tx, outcomes) = mpsc::channel();

        std::thread::Builder::new()
            .name("biomon-cycle".to_string())
            .spawn(move || {
                for request in request_rx {
                    let outcome = monitor.run(request);
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| AppError::runtime(format!("Failed to start worker thread: {e}")))?;

        Ok(Self { requests, outcomes })
    }
}

/// Triggers waiting for the worker, plus the one it is running.
#[derive(Debug, Default)]
struct TriggerQueue {
    pending: VecDeque<Trigger>,
    in_flight: Option<Trigger>,
}

impl TriggerQueue {
    /// Queue `trigger` unless the same trigger is already waiting.
    fn push(&mut self, trigger: Trigger) -> bool {
        if self.pending.contains(&trigger) {
            return false;
        }
        self.pending.push_back(trigger);
        true
    }

    /// The next trigger to run, if the worker is idle.
    fn next(&mut self) -> Option<Trigger> {
        if self.in_flight.is_some() {
            return None;
        }
        let trigger = self.pending.pop_front()?;
        self.in_flight = Some(trigger);
        Some(trigger)
    }

    fn finish(&mut self) {
        self.in_flight = None;
    }

    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// What the header shows about the last finished cycle.
struct LastCycle {
    plan: Plan,
    elapsed: Duration,
    estimation: Option<EstimationReport>,
}

struct App {
    config: MonitorConfig,
    session: Session,
    view: ViewState,
    worker: Worker,
    queue: TriggerQueue,
    iteration_label: String,
    last: Option<LastCycle>,
    fits: Vec<VariableFit>,
    status: String,
    next_tick: Instant,
}

impl App {
    fn new(monitor: Monitor, auto_estimation: AutoEstimation) -> Result<Self, AppError> {
        let config = monitor.config().clone();
        let session = Session::new(&config, auto_estimation);
        let view = ViewState::new(&config.variables);
        let next_tick = Instant::now() + config.poll_interval;
        let worker = Worker::spawn(monitor)?;

        let mut queue = TriggerQueue::default();
        queue.push(Trigger::Initial);

        Ok(Self {
            config,
            session,
            view,
            worker,
            queue,
            iteration_label: "This is iteration: 0".to_string(),
            last: None,
            fits: Vec::new(),
            status: "Loading measurement data...".to_string(),
            next_tick,
        })
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            needs_redraw |= self.collect_outcome()?;

            if Instant::now() >= self.next_tick {
                self.next_tick = Instant::now() + self.config.poll_interval;
                self.queue.push(Trigger::Timer);
            }
            needs_redraw |= self.dispatch()?;

            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::runtime(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::runtime(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::runtime(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match self.view.handle_key(code, &mut self.session, self.queue.is_busy()) {
            Action::Quit => return true,
            Action::Run(trigger) => {
                if self.queue.push(trigger) {
                    self.status = format!("Queued {trigger:?} cycle.");
                }
            }
            Action::Notice(text) => self.status = text,
            Action::None => {}
        }
        false
    }

    fn dispatch(&mut self) -> Result<bool, AppError> {
        let Some(trigger) = self.queue.next() else {
            return Ok(false);
        };
        let request = self.session.request(trigger);
        self.worker
            .requests
            .send(request)
            .map_err(|_| AppError::runtime("The cycle worker stopped unexpectedly."))?;
        self.status = format!("Running {trigger:?} cycle...");
        Ok(true)
    }

    fn collect_outcome(&mut self) -> Result<bool, AppError> {
        let outcome = match self.worker.outcomes.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return Ok(false),
            Err(TryRecvError::Disconnected) => {
                return Err(AppError::runtime("The cycle worker stopped unexpectedly."));
            }
        };

        self.queue.finish();
        self.session.absorb(&outcome);
        self.view.clamp(self.session.params.len());
        self.fits = compute_fit_stats(&self.session.snapshot);
        self.iteration_label = outcome.iteration_label.clone();
        self.status = match outcome.error.message() {
            Some(_) => "Cycle failed.".to_string(),
            None => format!("Cycle finished in {:.2}s.", outcome.elapsed.as_secs_f64()),
        };
        self.last = Some(LastCycle {
            plan: outcome.plan,
            elapsed: outcome.elapsed,
            estimation: outcome.estimation,
        });
        Ok(true)
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let theme = &self.config.theme;
        let size = frame.area();
        frame.render_widget(
            Block::default().style(Style::default().bg(color(theme.background)).fg(color(theme.text))),
            size,
        );

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("biomon", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" | bioprocess monitor | source: {:?}", self.config.source).to_lowercase()),
        ]));

        let state = if self.queue.is_busy() {
            Span::styled("running", Style::default().fg(Color::Yellow))
        } else if self.session.error.is_errored() {
            Span::styled("errored", Style::default().fg(Color::Red))
        } else {
            Span::styled("idle", Style::default().fg(Color::Green))
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{} | ", self.iteration_label)),
            state,
            Span::styled(
                format!(
                    " | auto estimation: {} | horizon: {} h | poll every {} s",
                    self.session.auto_estimation.label(),
                    format_number(self.session.horizon_hours),
                    self.config.poll_interval.as_secs(),
                ),
                Style::default().fg(Color::Gray),
            ),
        ]));

        if let Some(last) = &self.last {
            let mut text = format!("last cycle: {} in {:.2}s", plan_label(last.plan), last.elapsed.as_secs_f64());
            if let Some(report) = &last.estimation {
                text.push_str(&format!(
                    " | estimation: {} it, rmse={:.4}{}",
                    report.iterations,
                    report.rmse,
                    if report.converged { "" } else { " (not converged)" }
                ));
            }
            lines.push(Line::from(Span::styled(text, Style::default().fg(Color::Gray))));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        // An errored session shows nothing but the message and the retry hint.
        if let Some(message) = self.session.error.message() {
            self.draw_error(frame, area, message);
            return;
        }

        let columns = if self.view.show_options {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(0), Constraint::Length(OPTIONS_WIDTH)])
                .split(area)
        } else {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(0)])
                .split(area)
        };

        self.draw_charts(frame, columns[0]);

        if self.view.show_options {
            self.draw_options(frame, columns[1]);
        }
    }

    fn draw_charts(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let panels = chart_panels(&self.session.snapshot, &self.view.plot);

        if panels.is_empty() {
            let text = if self.queue.is_busy() {
                "Waiting for data..."
            } else {
                "No data to display."
            };
            let msg = Paragraph::new(text)
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().title("Process").borders(Borders::ALL));
            frame.render_widget(msg, area);
            return;
        }

        let per_row = if panels.len() > 1 { 2 } else { 1 };
        let n_rows = panels.len().div_ceil(per_row);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Ratio(1, n_rows as u32); n_rows])
            .split(area);

        for (row_idx, chunk) in panels.chunks(per_row).enumerate() {
            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, per_row as u32); per_row])
                .split(rows[row_idx]);
            for ((var, series), cell) in chunk.iter().zip(cells.iter()) {
                self.draw_chart(frame, *cell, var, series);
            }
        }
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, var: &str, series: &ChartSeries) {
        let axis = if self.view.plot.is_secondary(var) { " [2nd axis]" } else { "" };
        let title = match series.scale {
            AxisScale::Linear => format!("{var}{axis}"),
            AxisScale::Log => format!("{var} (log){axis}"),
        };
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let widget = ProcessChart {
            series,
            y_label: var,
            measured_color: rgb(self.config.theme.text),
            simulated_color: RGBColor(0, 255, 255),
            axis_color: rgb(self.config.theme.text),
        };
        frame.render_widget(widget, inner);
    }

    fn draw_error(&self, frame: &mut ratatui::Frame<'_>, area: Rect, message: &str) {
        let text = Text::from(vec![
            Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Red))),
            Line::from(Span::styled("Press r to retry.", Style::default().fg(Color::Gray))),
        ]);
        let p = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(Block::default().title("Error").borders(Borders::ALL).border_style(Style::default().fg(Color::Red)));
        frame.render_widget(p, area);
    }

    fn draw_options(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = &self.config.theme;
        let panel_style = Style::default().bg(color(theme.settings)).fg(color(theme.text));
        let fits_height = if self.fits.is_empty() { 0 } else { self.fits.len() as u16 + 2 };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5),
                Constraint::Min(0),
                Constraint::Length(fits_height),
            ])
            .split(area);

        let horizon = match &self.view.mode {
            Mode::Horizon(buffer) => Span::styled(
                format!("Horizon: {buffer}_ h"),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            _ => Span::raw(format!("Horizon: {} h", format_number(self.session.horizon_hours))),
        };
        let settings = Paragraph::new(Text::from(vec![
            Line::from(horizon),
            Line::from(format!("Auto estimation: {}", self.session.auto_estimation.label())),
            Line::from(format!(
                "Y scale: {} | 2nd axis: {}",
                scale_label(self.view.plot.scale),
                scale_label(self.view.plot.secondary_scale)
            )),
        ]))
        .style(panel_style)
        .block(Block::default().title("Options").borders(Borders::ALL));
        frame.render_widget(settings, chunks[0]);

        match self.view.mode {
            Mode::Variables(cursor) => self.draw_variable_picker(frame, chunks[1], cursor),
            _ => self.draw_param_table(frame, chunks[1]),
        }

        if !self.fits.is_empty() {
            let lines: Vec<Line> = self
                .fits
                .iter()
                .map(|f| Line::from(format!("{:<6} n={:<4} rmse={:.4} bias={:+.4}", f.variable, f.n, f.rmse, f.bias)))
                .collect();
            let p = Paragraph::new(Text::from(lines))
                .style(panel_style)
                .block(Block::default().title("Fit").borders(Borders::ALL));
            frame.render_widget(p, chunks[2]);
        }
    }

    fn draw_param_table(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let theme = &self.config.theme;
        let header = Row::new(PARAM_COLUMNS.iter().map(|c| Cell::from(*c)))
            .style(Style::default().bg(color(theme.table_header)).add_modifier(Modifier::BOLD));

        let rows = self.session.params.iter().enumerate().map(|(i, row)| {
            let values = [
                row.name.clone(),
                format_number(row.value),
                row.vary.clone(),
                format_number(row.min),
                format_number(row.max),
            ];
            let cells = values.into_iter().enumerate().map(|(j, text)| {
                let selected = i == self.view.row && j == self.view.column;
                match (&self.view.mode, selected) {
                    (Mode::Cell(buffer), true) => Cell::from(format!("{buffer}_"))
                        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                    (_, true) => Cell::from(text).style(Style::default().add_modifier(Modifier::REVERSED)),
                    _ => Cell::from(text),
                }
            });
            Row::new(cells)
        });

        let widths = [
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(10),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .style(Style::default().bg(color(theme.table_background)).fg(color(theme.text)))
            .block(Block::default().title("Parameters").borders(Borders::ALL));
        frame.render_widget(table, area);
    }

    fn draw_variable_picker(&self, frame: &mut ratatui::Frame<'_>, area: Rect, cursor: usize) {
        let theme = &self.config.theme;
        let header = Row::new(["variable", "measured", "simulated", "axis"].map(Cell::from))
            .style(Style::default().bg(color(theme.table_header)).add_modifier(Modifier::BOLD));

        let plot = &self.view.plot;
        let mark = |offered: bool, on: bool| match (offered, on) {
            (false, _) => "-",
            (true, true) => "[x]",
            (true, false) => "[ ]",
        };
        let rows = plot.variables().into_iter().enumerate().map(|(i, var)| {
            let shown = plot.shown(var);
            let row = Row::new([
                var.to_string(),
                mark(plot.offers_measured(var), shown.measured).to_string(),
                mark(plot.offers_simulated(var), shown.simulated).to_string(),
                if plot.is_secondary(var) { "2nd" } else { "1st" }.to_string(),
            ]);
            if i == cursor {
                row.style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                row
            }
        });

        let widths = [
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(6),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .style(Style::default().bg(color(theme.table_background)).fg(color(theme.text)))
            .block(Block::default().title("Displayed variables").borders(Borders::ALL));
        frame.render_widget(table, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut help = String::from("q quit  e estimate  a auto  h horizon  l/L log  d variables  o options");
        if let Mode::Variables(_) = self.view.mode {
            help = String::from("up/down select  m measured  s simulated  y 2nd axis  Esc done");
        } else if self.view.show_options {
            help.push_str("  arrows/Enter edit  v vary");
        }
        if self.session.error.is_errored() {
            help.push_str("  r retry");
        }
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Charts to draw, one per selected variable with visible data.
fn chart_panels<'a>(snapshot: &crate::domain::Snapshot, plot: &'a PlotSelection) -> Vec<(&'a str, ChartSeries)> {
    plot.panels()
        .into_iter()
        .filter_map(|var| {
            ChartSeries::from_snapshot(snapshot, var, plot.shown(var), plot.scale_for(var)).map(|s| (var, s))
        })
        .collect()
}

fn color(c: Rgb) -> Color {
    Color::Rgb(c.0, c.1, c.2)
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_runs_one_trigger_at_a_time() {
        let mut queue = TriggerQueue::default();
        assert!(queue.push(Trigger::Initial));
        assert!(queue.push(Trigger::Timer));
        assert!(!queue.push(Trigger::Timer));

        assert_eq!(queue.next(), Some(Trigger::Initial));
        assert!(queue.is_busy());
        assert_eq!(queue.next(), None);

        queue.finish();
        assert_eq!(queue.next(), Some(Trigger::Timer));
        // A tick while the previous one runs is queued again.
        assert!(queue.push(Trigger::Timer));
        queue.finish();
        assert_eq!(queue.next(), Some(Trigger::Timer));
        queue.finish();
        assert_eq!(queue.next(), None);
        assert!(!queue.is_busy());
    }

    #[test]
    fn theme_colours_convert() {
        assert_eq!(color(Rgb(1, 2, 3)), Color::Rgb(1, 2, 3));
        assert_eq!(rgb(Rgb(4, 5, 6)), RGBColor(4, 5, 6));
    }

    #[test]
    fn simulated_only_variables_get_charts() {
        use crate::domain::{ParamMap, Snapshot, Table, VariableSelection};
        use std::collections::BTreeMap;

        let mut offline = Table::new(vec!["cX".to_string()]);
        offline.push_row(1.0, vec![Some(0.5)]).unwrap();
        let mut measured = BTreeMap::new();
        measured.insert("offline".to_string(), offline);
        let mut sim = Table::new(vec!["cX".to_string(), "mu".to_string()]);
        sim.push_row(0.0, vec![Some(0.1), Some(0.2)]).unwrap();
        sim.push_row(2.0, vec![Some(0.9), Some(0.3)]).unwrap();
        let snapshot = Snapshot::new(measured, sim, ParamMap::new());

        let mut plot = PlotSelection::new(&VariableSelection {
            measurement_vars: vec!["cX".to_string()],
            simulated_vars: vec!["cX".to_string(), "mu".to_string()],
        });
        let panels = chart_panels(&snapshot, &plot);
        assert_eq!(panels.len(), 1);
        assert!(panels[0].1.simulated.is_empty());

        plot.toggle_simulated("mu");
        plot.toggle_simulated("cX");
        let panels = chart_panels(&snapshot, &plot);
        let names: Vec<&str> = panels.iter().map(|(v, _)| *v).collect();
        assert_eq!(names, vec!["cX", "mu"]);
        assert_eq!(panels[0].1.simulated.len(), 2);
        assert!(panels[1].1.measured.is_empty());
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(ratatui::backend::TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let symbols: Vec<&str> = buffer.content.iter().map(|c| c.symbol()).collect();
        symbols.chunks(width).map(|row| row.concat()).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn errored_session_shows_only_the_error_panel() {
        let config = MonitorConfig {
            source: crate::domain::SourceKind::Demo,
            work_dir: crate::io::testutil::scratch_dir("tui-errored"),
            ..MonitorConfig::default()
        };
        let monitor = build_monitor(config).unwrap();
        let mut app = App::new(monitor, AutoEstimation::Disabled).unwrap();

        let healthy = screen(&app);
        assert!(healthy.contains("Options"));
        assert!(healthy.contains("No data to display."));

        app.session.error = crate::control::ErrorState::Errored("The Dataframe is empty".to_string());
        let errored = screen(&app);
        assert!(errored.contains("The Dataframe is empty"));
        assert!(errored.contains("Press r to retry."));
        assert!(!errored.contains("Options"));
        assert!(!errored.contains("Parameters"));
        assert!(!errored.contains("No data to display."));
    }
}
