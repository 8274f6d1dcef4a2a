use ratatui::widgets::ListState;

use kubelog_types::{ContainerInfo, ContainerRef};

use crate::connection::ConnectionState;

/// Screen enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    ContainerSelect,
    LogViewer,
}

/// UI-specific transient state
pub struct UiState {
    /// Is the search bar taking input?
    pub search_active: bool,

    /// Current search text; filters the container list while non-empty
    pub search_input: String,

    /// Is help overlay visible?
    pub help_visible: bool,

    /// List state for the container list
    pub list_state: ListState,

    /// Error message to display (if any)
    pub error_message: Option<String>,

    // Log viewer specific state
    /// Scroll position in log viewer
    pub log_scroll: usize,

    /// Auto-scroll enabled (follow mode)?
    pub auto_scroll: bool,

    /// Show timestamps in log viewer?
    pub show_timestamps: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            search_active: false,
            search_input: String::new(),
            help_visible: false,
            list_state: ListState::default(),
            error_message: None,
            log_scroll: 0,
            auto_scroll: true,
            show_timestamps: true,
        }
    }
}

/// Global viewer state
pub struct AppState {
    /// Current screen being displayed
    pub current_screen: Screen,

    /// Gateway the viewer talks to, for display
    pub gateway: String,

    /// Namespace reported by the gateway
    pub namespace: Option<String>,

    /// Last container directory snapshot
    pub containers: Vec<ContainerInfo>,

    /// Container the log view follows
    pub selected: Option<ContainerRef>,

    /// Mirror of the connection manager's state for rendering
    pub connection: ConnectionState,

    /// UI state
    pub ui_state: UiState,

    /// Whether app should quit
    pub should_quit: bool,
}

impl AppState {
    pub fn new(gateway: impl Into<String>) -> Self {
        let mut ui_state = UiState::default();
        ui_state.list_state.select(Some(0));

        Self {
            current_screen: Screen::ContainerSelect,
            gateway: gateway.into(),
            namespace: None,
            containers: Vec::new(),
            selected: None,
            connection: ConnectionState::Idle,
            ui_state,
            should_quit: false,
        }
    }

    /// Replace the directory snapshot, keeping the selection in range
    pub fn set_containers(&mut self, namespace: String, containers: Vec<ContainerInfo>) {
        self.namespace = Some(namespace);
        self.containers = containers;
        self.clamp_selection();
    }

    /// Containers matching the search text
    pub fn filtered_containers(&self) -> Vec<&ContainerInfo> {
        self.containers
            .iter()
            .filter(|c| c.matches(&self.ui_state.search_input))
            .collect()
    }

    /// Get the current list length based on screen
    pub fn current_list_len(&self) -> usize {
        match self.current_screen {
            Screen::ContainerSelect => self.filtered_containers().len(),
            Screen::LogViewer => 0,
        }
    }

    /// Move selection up
    pub fn list_up(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// Move selection down
    pub fn list_down(&mut self) {
        let len = self.current_list_len();
        if len == 0 {
            return;
        }

        let i = match self.ui_state.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.ui_state.list_state.select(Some(i));
    }

    /// The highlighted container in the filtered list
    pub fn highlighted_container(&self) -> Option<&ContainerInfo> {
        let index = self.ui_state.list_state.selected()?;
        self.filtered_containers().get(index).copied()
    }

    /// Switch to the log view for `target`
    pub fn open_log_view(&mut self, target: ContainerRef) {
        self.selected = Some(target);
        self.current_screen = Screen::LogViewer;
        self.ui_state.log_scroll = 0;
        self.ui_state.auto_scroll = true;
    }

    /// Leave the log view for the container list
    pub fn close_log_view(&mut self) {
        self.selected = None;
        self.current_screen = Screen::ContainerSelect;
    }

    /// Show an error message
    pub fn show_error(&mut self, msg: String) {
        self.ui_state.error_message = Some(msg);
    }

    /// Dismiss the error message
    pub fn dismiss_error(&mut self) {
        self.ui_state.error_message = None;
    }

    /// Start search input mode, keeping any existing text
    pub fn start_search(&mut self) {
        self.ui_state.search_active = true;
    }

    /// Stop taking input but keep filtering
    pub fn apply_search(&mut self) {
        self.ui_state.search_active = false;
    }

    /// Stop taking input and drop the filter
    pub fn cancel_search(&mut self) {
        self.ui_state.search_active = false;
        self.ui_state.search_input.clear();
        self.clamp_selection();
    }

    /// Add a character to search input
    pub fn search_input_char(&mut self, c: char) {
        self.ui_state.search_input.push(c);
        self.ui_state.list_state.select(Some(0));
    }

    /// Remove last character from search input
    pub fn search_input_backspace(&mut self) {
        self.ui_state.search_input.pop();
        self.clamp_selection();
    }

    /// Clear the search text
    pub fn search_clear(&mut self) {
        self.ui_state.search_input.clear();
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.current_list_len();
        let selected = match self.ui_state.list_state.selected() {
            Some(i) if i < len => i,
            _ => 0,
        };
        self.ui_state.list_state.select(Some(selected));
    }
}
