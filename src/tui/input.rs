//! Key handling for the dashboard.
//!
//! Everything here is terminal-free: keys mutate the `Session` (horizon,
//! auto-estimation flag, parameter table) and the view state (displayed
//! variables, axis scales, table selection), and come back as an `Action`
//! the event loop acts on.

use crossterm::event::KeyCode;

use crate::control::{Session, Trigger};
use crate::domain::{AxisScale, VariableSelection, VaryFlag, vary_label};
use crate::plot::PlotSelection;

/// Editable columns of the parameter table (the name column is fixed).
pub const PARAM_COLUMNS: [&str; 5] = ["name", "value", "vary", "min", "max"];

const FIRST_EDITABLE: usize = 1;
const VARY_COLUMN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Typing a new horizon.
    Horizon(String),
    /// Typing a new number into the selected parameter cell.
    Cell(String),
    /// Picking displayed variables; the cursor indexes `PlotSelection::variables`.
    Variables(usize),
}

/// What the event loop should do after a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Quit,
    Run(Trigger),
    Notice(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub mode: Mode,
    pub show_options: bool,
    pub plot: PlotSelection,
    pub row: usize,
    pub column: usize,
}

impl ViewState {
    /// Opens with every measured variable shown and no simulated curves.
    pub fn new(offered: &VariableSelection) -> Self {
        Self {
            mode: Mode::Normal,
            show_options: true,
            plot: PlotSelection::new(offered),
            row: 0,
            column: FIRST_EDITABLE,
        }
    }

    /// Keep the selection inside a table of `rows` rows.
    pub fn clamp(&mut self, rows: usize) {
        self.row = self.row.min(rows.saturating_sub(1));
    }

    pub fn handle_key(&mut self, code: KeyCode, session: &mut Session, busy: bool) -> Action {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.handle_normal(code, session, busy),
            Mode::Horizon(buffer) => self.handle_horizon(code, buffer, session),
            Mode::Cell(buffer) => self.handle_cell(code, buffer, session),
            Mode::Variables(cursor) => self.handle_variables(code, cursor),
        }
    }

    fn handle_normal(&mut self, code: KeyCode, session: &mut Session, busy: bool) -> Action {
        match code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('e') => {
                if busy {
                    Action::Notice("A cycle is running; estimate request ignored.".to_string())
                } else {
                    Action::Run(Trigger::Estimate)
                }
            }
            KeyCode::Char('r') => {
                if session.error.is_errored() {
                    Action::Run(Trigger::Retry)
                } else {
                    Action::None
                }
            }
            KeyCode::Char('a') => {
                session.auto_estimation = session.auto_estimation.toggled();
                Action::Notice(format!("auto estimation: {}", session.auto_estimation.label()))
            }
            KeyCode::Char('h') => {
                self.mode = Mode::Horizon(format_number(session.horizon_hours));
                Action::Notice("Editing horizon (hours). Enter to apply, Esc to cancel.".to_string())
            }
            KeyCode::Char('l') => {
                self.plot.toggle_scale();
                Action::Notice(format!("y scale: {}", scale_label(self.plot.scale)))
            }
            KeyCode::Char('L') => {
                self.plot.toggle_secondary_scale();
                Action::Notice(format!("secondary y scale: {}", scale_label(self.plot.secondary_scale)))
            }
            KeyCode::Char('d') => {
                // The picker lives in the options panel.
                self.show_options = true;
                self.mode = Mode::Variables(0);
                Action::Notice("m measured  s simulated  y secondary axis  Esc done".to_string())
            }
            KeyCode::Char('o') => {
                self.show_options = !self.show_options;
                Action::None
            }
            KeyCode::Char('v') if self.show_options => self.toggle_vary(session),
            KeyCode::Up if self.show_options => {
                self.row = self.row.saturating_sub(1);
                Action::None
            }
            KeyCode::Down if self.show_options => {
                if self.row + 1 < session.params.len() {
                    self.row += 1;
                }
                Action::None
            }
            KeyCode::Left if self.show_options => {
                if self.column > FIRST_EDITABLE {
                    self.column -= 1;
                }
                Action::None
            }
            KeyCode::Right if self.show_options => {
                if self.column + 1 < PARAM_COLUMNS.len() {
                    self.column += 1;
                }
                Action::None
            }
            KeyCode::Enter if self.show_options => {
                if self.column == VARY_COLUMN {
                    return self.toggle_vary(session);
                }
                match session.params.get(self.row).and_then(|row| cell_value(row, self.column)) {
                    Some(value) => {
                        self.mode = Mode::Cell(format_number(value));
                        Action::None
                    }
                    None => Action::None,
                }
            }
            _ => Action::None,
        }
    }

    fn handle_horizon(&mut self, code: KeyCode, mut buffer: String, session: &mut Session) -> Action {
        match code {
            KeyCode::Esc => Action::Notice("Horizon edit canceled.".to_string()),
            KeyCode::Enter => match buffer.trim().parse::<f64>() {
                Ok(hours) => {
                    session.horizon_hours = hours;
                    Action::Run(Trigger::Horizon)
                }
                Err(_) => {
                    let notice = format!("Invalid horizon '{}'.", buffer.trim());
                    self.mode = Mode::Horizon(buffer);
                    Action::Notice(notice)
                }
            },
            other => {
                edit_number(&mut buffer, other);
                self.mode = Mode::Horizon(buffer);
                Action::None
            }
        }
    }

    fn handle_cell(&mut self, code: KeyCode, mut buffer: String, session: &mut Session) -> Action {
        match code {
            KeyCode::Esc => Action::None,
            KeyCode::Enter => {
                let Ok(value) = buffer.trim().parse::<f64>() else {
                    let notice = format!("Invalid number '{}'.", buffer.trim());
                    self.mode = Mode::Cell(buffer);
                    return Action::Notice(notice);
                };
                let column = PARAM_COLUMNS[self.column];
                let Some(row) = session.params.get_mut(self.row) else {
                    return Action::None;
                };
                match column {
                    "value" => row.value = value,
                    "min" => row.min = value,
                    "max" => row.max = value,
                    _ => return Action::None,
                }
                Action::Notice(format!("{}.{column} = {}", row.name, format_number(value)))
            }
            other => {
                edit_number(&mut buffer, other);
                self.mode = Mode::Cell(buffer);
                Action::None
            }
        }
    }

    fn handle_variables(&mut self, code: KeyCode, cursor: usize) -> Action {
        if matches!(code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('d')) {
            return Action::None;
        }
        let last = self.plot.variables().len().saturating_sub(1);
        let cursor = match code {
            KeyCode::Up => cursor.saturating_sub(1),
            KeyCode::Down => (cursor + 1).min(last),
            _ => cursor.min(last),
        };
        self.mode = Mode::Variables(cursor);
        let Some(var) = self.plot.variables().get(cursor).map(|v| v.to_string()) else {
            return Action::None;
        };

        match code {
            KeyCode::Char('m') => {
                if !self.plot.offers_measured(&var) {
                    return Action::Notice(format!("{var} is not measured."));
                }
                let on = self.plot.toggle_measured(&var);
                Action::Notice(format!("{var}: measured {}", on_off(on)))
            }
            KeyCode::Char('s') => {
                if !self.plot.offers_simulated(&var) {
                    return Action::Notice(format!("{var} is not simulated."));
                }
                let on = self.plot.toggle_simulated(&var);
                Action::Notice(format!("{var}: simulated {}", on_off(on)))
            }
            KeyCode::Char('y') => {
                let on = self.plot.toggle_secondary(&var);
                Action::Notice(format!("{var}: {} axis", if on { "secondary" } else { "primary" }))
            }
            _ => Action::None,
        }
    }

    fn toggle_vary(&mut self, session: &mut Session) -> Action {
        let Some(row) = session.params.get_mut(self.row) else {
            return Action::None;
        };
        let next = match VaryFlag::coerce(&row.vary) {
            VaryFlag::Bool(vary) => !vary,
            VaryFlag::Raw(_) => true,
        };
        row.vary = vary_label(next).to_string();
        Action::Notice(format!("{}.vary = {}", row.name, row.vary))
    }
}

fn cell_value(row: &crate::domain::ParamRow, column: usize) -> Option<f64> {
    match *PARAM_COLUMNS.get(column)? {
        "value" => Some(row.value),
        "min" => Some(row.min),
        "max" => Some(row.max),
        _ => None,
    }
}

pub fn scale_label(scale: AxisScale) -> &'static str {
    match scale {
        AxisScale::Linear => "linear",
        AxisScale::Log => "log",
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "shown" } else { "hidden" }
}

fn edit_number(buffer: &mut String, code: KeyCode) {
    match code {
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char(c) if c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E') => buffer.push(c),
        _ => {}
    }
}

/// Compact rendering of a table number.
pub fn format_number(v: f64) -> String {
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v != 0.0 && (v.abs() >= 1e5 || v.abs() < 1e-3) {
        format!("{v:.3e}")
    } else {
        let s = format!("{v:.4}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
