use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};

use crate::model::config::AppConfig;
use crate::model::mode::Mode;
use crate::model::registry::{RecordHandle, Registry};
use crate::model::view::{Column, Projection, SortState};
use crate::msg::Msg;

/// A delete request waiting for the user's yes/no. Holds the record's
/// handle plus the id label shown in the prompt.
struct PendingDelete {
    handle: RecordHandle,
    label: String,
}

pub struct App {
    pub mode: Mode,
    store: Registry,
    projection: Projection,
    sort_state: SortState,
    last_sort: Option<(Column, bool)>,
    search_input: String,
    table: TableState,
    pending_delete: Option<PendingDelete>,
    notifications: VecDeque<String>,
    event_tx: mpsc::Sender<Msg>,
    pub should_quit: bool,
    dirty: bool,
    quit_confirm_armed: bool,
    quit_confirm_until: Option<Instant>,
}

impl App {
    pub fn new(config: &AppConfig, event_tx: mpsc::Sender<Msg>) -> Result<Self> {
        let registry_path = config.registry_path()?;
        let store = Registry::load(registry_path)?;
        let projection = Projection::build(&store, "");

        let mut table = TableState::default();
        if !projection.is_empty() {
            table.select(Some(0));
        }

        Ok(Self {
            mode: Mode::Normal,
            store,
            projection,
            sort_state: SortState::default(),
            last_sort: None,
            search_input: String::new(),
            table,
            pending_delete: None,
            notifications: VecDeque::new(),
            event_tx,
            should_quit: false,
            dirty: false,
            quit_confirm_armed: false,
            quit_confirm_until: None,
        })
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::ToggleEnabled => self.toggle_selected(),
            Msg::RequestDelete => self.request_delete(),
            Msg::ConfirmDelete(confirmed) => self.finish_delete(confirmed),
            Msg::SortBy(column) => self.sort_by(column),
            Msg::FilterChanged(query) => self.set_filter(query),
            Msg::Save => self.save(),
            Msg::Backup => self.backup(),
            Msg::Quit => self.should_quit = true,
            Msg::Resize(_w, _h) => {}
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Normal => self.handle_key_normal(key),
            Mode::Search => self.handle_key_search(key),
            Mode::ConfirmDelete => self.handle_key_confirm(key),
        }
    }

    fn handle_key_normal(&mut self, key: KeyEvent) {
        if self
            .quit_confirm_until
            .is_some_and(|until| Instant::now() > until)
        {
            self.quit_confirm_armed = false;
            self.quit_confirm_until = None;
        }
        if key.code != KeyCode::Char('q') {
            self.quit_confirm_armed = false;
            self.quit_confirm_until = None;
        }

        match key.code {
            KeyCode::Char('q') => {
                if !self.dirty {
                    self.request(Msg::Quit);
                } else if self.quit_confirm_armed {
                    self.request(Msg::Save);
                    self.request(Msg::Quit);
                    self.quit_confirm_armed = false;
                    self.quit_confirm_until = None;
                } else {
                    self.quit_confirm_armed = true;
                    self.quit_confirm_until = Some(Instant::now() + Duration::from_secs(2));
                }
            }
            KeyCode::Char('Q') => {
                self.request(Msg::Save);
                self.request(Msg::Quit);
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => {
                if !self.projection.is_empty() {
                    self.table.select(Some(0));
                }
            }
            KeyCode::Char('G') | KeyCode::End => {
                if !self.projection.is_empty() {
                    self.table.select(Some(self.projection.len() - 1));
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.request(Msg::ToggleEnabled),
            KeyCode::Char('d') | KeyCode::Char('x') => self.request(Msg::RequestDelete),
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('s') => self.request(Msg::Save),
            KeyCode::Char('b') => self.request(Msg::Backup),
            KeyCode::Char(ch @ '1'..='6') => {
                let index = ch as usize - '1' as usize;
                self.request(Msg::SortBy(Column::ALL[index]));
            }
            KeyCode::Esc => {
                if !self.search_input.is_empty() {
                    self.request(Msg::FilterChanged(String::new()));
                }
            }
            _ => {}
        }
    }

    fn handle_key_search(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                let mut query = self.search_input.clone();
                query.pop();
                self.request(Msg::FilterChanged(query));
            }
            KeyCode::Char(ch)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                let mut query = self.search_input.clone();
                query.push(ch);
                self.request(Msg::FilterChanged(query));
            }
            _ => {}
        }
    }

    fn handle_key_confirm(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.request(Msg::ConfirmDelete(true));
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.request(Msg::ConfirmDelete(false));
            }
            _ => {}
        }
    }

    /// Forward a semantic operation onto the event bus; it is applied in
    /// the same batch-drain pass, before the next draw.
    fn request(&mut self, msg: Msg) {
        let _ = self.event_tx.send(msg);
    }

    // ── Registry operations ──────────────────────────────────────

    fn selected_handle(&self) -> Option<RecordHandle> {
        self.table
            .selected()
            .and_then(|index| self.projection.row(index))
            .map(|row| row.handle)
    }

    /// Every store mutation and filter change funnels through here so no
    /// stale handle survives into the next interaction.
    fn rebuild_projection(&mut self) {
        self.projection = Projection::build(&self.store, &self.search_input);
        if let Some((column, ascending)) = self.last_sort {
            self.projection.sort_by(&self.store, column, ascending);
        }
        self.clamp_selection();
    }

    fn toggle_selected(&mut self) {
        let Some(handle) = self.selected_handle() else {
            return;
        };

        if self.store.toggle_enabled(handle) {
            self.dirty = true;
            self.rebuild_projection();
        }
    }

    fn request_delete(&mut self) {
        let Some(handle) = self.selected_handle() else {
            return;
        };
        let Some(record) = self.store.get(handle) else {
            return;
        };

        self.pending_delete = Some(PendingDelete {
            handle,
            label: record.id().to_string(),
        });
        self.mode = Mode::ConfirmDelete;
    }

    fn finish_delete(&mut self, confirmed: bool) {
        self.mode = Mode::Normal;
        let Some(pending) = self.pending_delete.take() else {
            return;
        };
        if !confirmed {
            return;
        }

        // A stale handle means the store moved on since the request;
        // dropping the request silently is the contract.
        if self.store.remove(pending.handle) {
            self.dirty = true;
            self.push_notification(format!("deleted '{}'", pending.label));
            self.rebuild_projection();
        }
    }

    fn sort_by(&mut self, column: Column) {
        let ascending = self.sort_state.next_direction(column);
        self.last_sort = Some((column, ascending));
        self.projection.sort_by(&self.store, column, ascending);
    }

    fn set_filter(&mut self, query: String) {
        self.search_input = query;
        self.rebuild_projection();
    }

    fn save(&mut self) {
        match self.store.save() {
            Ok(()) => {
                self.dirty = false;
                self.push_notification(format!(
                    "saved {} plugins to {}",
                    self.store.len(),
                    self.store.path().display()
                ));
            }
            Err(err) => {
                tracing::warn!("save failed: {err}");
                self.push_notification(format!("save failed: {err}"));
            }
        }
    }

    fn backup(&mut self) {
        match self.store.backup() {
            Ok(path) => {
                self.push_notification(format!("backup created at {}", path.display()));
            }
            Err(err) => {
                tracing::warn!("backup failed: {err}");
                self.push_notification(format!("backup failed: {err}"));
            }
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.projection.is_empty() {
            self.table.select(None);
            return;
        }

        let max = self.projection.len().saturating_sub(1) as isize;
        let current = self.table.selected().unwrap_or(0) as isize;
        self.table
            .select(Some((current + delta).clamp(0, max) as usize));
    }

    fn clamp_selection(&mut self) {
        if self.projection.is_empty() {
            self.table.select(None);
        } else {
            let index = self.table.selected().unwrap_or(0);
            self.table
                .select(Some(index.min(self.projection.len() - 1)));
        }
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
        while self.notifications.len() > 8 {
            self.notifications.pop_front();
        }
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // title bar
                Constraint::Min(1),    // table
                Constraint::Length(1), // status bar
            ])
            .split(frame.area());

        self.render_title_bar(frame, chunks[0]);
        self.render_table(frame, chunks[1]);
        self.render_status_bar(frame, chunks[2]);

        if self.mode == Mode::ConfirmDelete {
            self.render_confirm_overlay(frame);
        }
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let title = Span::styled(
            " vstman ",
            Style::default()
                .bg(Color::Rgb(30, 30, 45))
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        let hints = Span::styled(
            "  j/k: Move  Space: Toggle  d: Delete  /: Search  1-6: Sort  s: Save  b: Backup  q: Quit ",
            Style::default()
                .bg(Color::Rgb(20, 20, 30))
                .fg(Color::DarkGray),
        );

        frame.render_widget(
            Paragraph::new(Line::from(vec![title, hints]))
                .style(Style::default().bg(Color::Rgb(20, 20, 30))),
            area,
        );
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect) {
        let mut header_cells: Vec<Cell> = Column::ALL
            .iter()
            .map(|column| {
                let mut label = column.label().to_string();
                if let Some((sorted, ascending)) = self.last_sort {
                    if sorted == *column {
                        label.push_str(if ascending { " ▲" } else { " ▼" });
                    }
                }
                Cell::from(label).style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
            })
            .collect();
        header_cells.push(
            Cell::from("Delete").style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        );

        let rows = self.projection.rows().iter().map(|row| {
            let display = &row.display;
            Row::new(vec![
                Cell::from(display.category.clone()),
                Cell::from(display.id.clone()),
                Cell::from(display.vendor.clone()),
                Cell::from(display.path.clone()),
                Cell::from(display.enabled),
                Cell::from(display.error_code.clone()),
                Cell::from(Span::styled(
                    display.delete,
                    Style::default().fg(Color::Red),
                )),
            ])
        });

        let widths = [
            Constraint::Percentage(14),
            Constraint::Percentage(16),
            Constraint::Percentage(14),
            Constraint::Percentage(38),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(6),
        ];

        let table = Table::new(rows, widths)
            .header(Row::new(header_cells).height(1))
            .row_highlight_style(
                Style::default()
                    .bg(Color::Rgb(30, 30, 45))
                    .add_modifier(Modifier::BOLD),
            );

        frame.render_stateful_widget(table, area, &mut self.table);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mode_style = match self.mode {
            Mode::Normal => Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            Mode::Search => Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            Mode::ConfirmDelete => Style::default()
                .fg(Color::Black)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        };

        let mode_span = Span::styled(format!(" {} ", self.mode.label()), mode_style);

        let file_name = self
            .store
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "[registry]".to_string());
        let dirty_marker = if self.dirty { " [+]" } else { "" };

        let mut suffix = String::new();
        if self.mode == Mode::Search || !self.search_input.is_empty() {
            suffix.push_str(&format!(" | search: {}", self.search_input));
        }
        if self.quit_confirm_armed {
            suffix.push_str(" | unsaved changes, press q again to save+quit");
        }
        if let Some(note) = self.notifications.back() {
            suffix.push_str(&format!(" | {note}"));
        }

        let info = Span::styled(
            format!(
                " {file_name}{dirty_marker}  {}/{} plugins{suffix} ",
                self.projection.len(),
                self.store.len()
            ),
            Style::default().fg(Color::Gray).bg(Color::DarkGray),
        );

        let status = Paragraph::new(Line::from(vec![mode_span, info]))
            .style(Style::default().bg(Color::DarkGray));
        frame.render_widget(status, area);
    }

    fn render_confirm_overlay(&self, frame: &mut Frame) {
        let Some(pending) = &self.pending_delete else {
            return;
        };

        let area = centered_rect(50, 3, frame.area());
        frame.render_widget(Clear, area);

        let prompt = Paragraph::new(format!("Delete '{}'? (y/n)", pending.label))
            .style(Style::default().fg(Color::White).bg(Color::Rgb(25, 25, 42)))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Delete ")
                    .style(Style::default().fg(Color::Red)),
            );
        frame.render_widget(prompt, area);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::GeneralConfig;
    use serde_json::{Value, json};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample() -> String {
        json!([
            { "meta": { "id": "Reverb", "vendor": "Acme" }, "path": "/a/reverb.vst", "enabled": false, "errorCode": -1 },
            { "meta": { "id": "Chorus", "vendor": "Bell" }, "path": "/b/chorus.vst", "enabled": true },
            { "meta": { "id": "Delay", "vendor": "Acme" }, "path": "/c/delay.vst" }
        ])
        .to_string()
    }

    fn test_app(dir: &TempDir) -> (App, PathBuf) {
        let path = dir.path().join("known_audio_plugins.json");
        fs::write(&path, sample()).unwrap();

        let config = AppConfig {
            general: GeneralConfig {
                registry_path: path.to_string_lossy().to_string(),
            },
        };
        let (tx, _rx) = mpsc::channel();
        (App::new(&config, tx).unwrap(), path)
    }

    fn projected_ids(app: &App) -> Vec<String> {
        app.projection
            .rows()
            .iter()
            .map(|row| row.display.id.clone())
            .collect()
    }

    #[test]
    fn toggle_message_flips_the_selected_record() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = test_app(&dir);

        app.update(Msg::ToggleEnabled).unwrap();
        assert!(app.store.records()[0].enabled());
        assert!(app.dirty);
        // The projection was rebuilt with fresh handles.
        assert_eq!(app.projection.len(), 3);

        app.update(Msg::ToggleEnabled).unwrap();
        assert!(!app.store.records()[0].enabled());
    }

    #[test]
    fn delete_is_two_phase_and_cancelable() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = test_app(&dir);

        app.update(Msg::RequestDelete).unwrap();
        assert_eq!(app.mode, Mode::ConfirmDelete);
        assert_eq!(app.pending_delete.as_ref().unwrap().label, "Reverb");

        app.update(Msg::ConfirmDelete(false)).unwrap();
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.store.len(), 3);

        app.update(Msg::RequestDelete).unwrap();
        app.update(Msg::ConfirmDelete(true)).unwrap();
        assert_eq!(app.store.len(), 2);
        assert!(!projected_ids(&app).contains(&"Reverb".to_string()));
    }

    #[test]
    fn filter_message_narrows_the_projection() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = test_app(&dir);

        app.update(Msg::FilterChanged("acme".to_string())).unwrap();
        assert_eq!(projected_ids(&app), ["Reverb", "Delay"]);

        app.update(Msg::FilterChanged(String::new())).unwrap();
        assert_eq!(app.projection.len(), 3);
    }

    #[test]
    fn repeated_sort_flips_direction() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = test_app(&dir);

        app.update(Msg::SortBy(Column::Id)).unwrap();
        assert_eq!(projected_ids(&app), ["Chorus", "Delay", "Reverb"]);

        app.update(Msg::SortBy(Column::Id)).unwrap();
        assert_eq!(projected_ids(&app), ["Reverb", "Delay", "Chorus"]);
    }

    #[test]
    fn sort_survives_a_projection_rebuild() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = test_app(&dir);

        app.update(Msg::SortBy(Column::Id)).unwrap();
        // Toggling rebuilds the projection; the chosen sort is re-applied.
        app.update(Msg::ToggleEnabled).unwrap();
        assert_eq!(projected_ids(&app), ["Chorus", "Delay", "Reverb"]);
    }

    #[test]
    fn save_message_persists_a_toggle() {
        let dir = TempDir::new().unwrap();
        let (mut app, path) = test_app(&dir);

        app.update(Msg::ToggleEnabled).unwrap();
        app.update(Msg::Save).unwrap();
        assert!(!app.dirty);

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk[0]["enabled"], json!(true));
    }

    #[test]
    fn deleting_the_last_matching_row_clears_the_selection() {
        let dir = TempDir::new().unwrap();
        let (mut app, _) = test_app(&dir);

        app.update(Msg::FilterChanged("chorus".to_string())).unwrap();
        assert_eq!(app.projection.len(), 1);

        app.update(Msg::RequestDelete).unwrap();
        app.update(Msg::ConfirmDelete(true)).unwrap();
        assert!(app.projection.is_empty());
        assert_eq!(app.table.selected(), None);
        assert_eq!(app.store.len(), 2);
    }
}
