mod container_select;
mod log_viewer;

pub use container_select::ContainerSelectScreen;
pub use log_viewer::LogViewerScreen;
