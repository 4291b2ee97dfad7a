/// Application interaction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Normal mode — table navigation and commands.
    #[default]
    Normal,
    /// Search mode — live filter editing.
    Search,
    /// Delete confirmation overlay (y/n).
    ConfirmDelete,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Search => "SEARCH",
            Mode::ConfirmDelete => "CONFIRM",
        }
    }
}
