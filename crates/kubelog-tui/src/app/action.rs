/// All possible actions in the viewer (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    // Navigation
    GoBack,
    Quit,
    ToggleHelp,

    // List navigation
    ListUp,
    ListDown,
    ListSelect,
    RefreshContainers,

    // Search in the container list
    OpenSearch,
    ApplySearch,
    CloseSearch,
    SearchInput(char),
    SearchBackspace,
    SearchClear,

    // Log viewer actions
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,
    ToggleAutoScroll,
    ToggleTimestamps,
    ClearLogs,

    // Error handling
    DismissError,

    // Render request
    Render,
}
