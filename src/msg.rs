use crossterm::event::KeyEvent;

use crate::model::view::Column;

/// All possible messages that drive state transitions.
///
/// Raw input events are translated into the semantic messages inside
/// `App::update`; the semantic set is the surface a test harness (or any
/// other frontend) drives directly.
#[derive(Debug, Clone)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize(u16, u16),

    // -- Registry operations (act on the selected row)
    ToggleEnabled,
    RequestDelete,
    ConfirmDelete(bool),
    SortBy(Column),
    FilterChanged(String),

    // -- File I/O
    Save,
    Backup,

    // -- System
    Quit,
}
