use chrono::{DateTime, Local};
use ratatui::widgets::ListState;

use livedash::DisplayState;

/// What the terminal knows about one widget.
#[derive(Debug, Clone)]
pub struct WidgetView {
    pub title: String,
    /// Latest state received from the widget's controller.
    pub state: DisplayState,
    /// When `state` arrived; `None` until the first publication.
    pub updated_at: Option<DateTime<Local>>,
}

impl WidgetView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: DisplayState::loading(),
            updated_at: None,
        }
    }
}

pub struct App {
    /// One entry per declared widget, in declaration order.
    pub widgets: Vec<WidgetView>,
    /// Which card is highlighted.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Last status message.
    pub status: String,
}

impl App {
    pub fn new(titles: impl IntoIterator<Item = String>) -> Self {
        Self {
            widgets: titles.into_iter().map(WidgetView::new).collect(),
            list_state: ListState::default(),
            quit: false,
            status: "Starting…".into(),
        }
    }

    /// Record a state published by widget `index`.
    ///
    /// Returns `false` (and changes nothing) when the index is unknown or
    /// the state is not newer than the one already shown.
    pub fn apply(&mut self, index: usize, state: DisplayState) -> bool {
        let Some(view) = self.widgets.get_mut(index) else {
            return false;
        };
        if !state.supersedes(&view.state) {
            return false;
        }
        view.state = state;
        view.updated_at = Some(Local::now());
        true
    }

    /// Count of widgets currently in the given status.
    pub fn count(&self, status: livedash::Status) -> usize {
        self.widgets
            .iter()
            .filter(|w| w.state.status() == status)
            .count()
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        if self.widgets.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(self.widgets.len() - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.widgets.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.widgets.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.widgets.is_empty() {
            self.list_state.select(Some(self.widgets.len() - 1));
        }
    }
}
