use ratatui::{
    Frame,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::app::Screen;
use crate::ui::Layout;

/// Help overlay showing keybindings for the current screen
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn render(frame: &mut Frame, screen: Screen) {
        let lines = match screen {
            Screen::ContainerSelect => Self::container_select_help(),
            Screen::LogViewer => Self::log_viewer_help(),
        };

        let popup_area = Layout::popup(frame.area(), 50, lines.len() as u16 + 2);
        frame.render_widget(Clear, popup_area);

        let help_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(Span::styled(
                    " Help ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );

        frame.render_widget(help_widget, popup_area);
    }

    fn container_select_help() -> Vec<Line<'static>> {
        vec![
            Self::section("Containers"),
            Self::key_line("j/↓", "Next container"),
            Self::key_line("k/↑", "Previous container"),
            Self::key_line("Enter", "Follow logs"),
            Self::key_line("/", "Search pods and containers"),
            Self::key_line("r", "Refresh list"),
            Line::from(""),
            Self::section("General"),
            Self::key_line("?", "Toggle this help"),
            Self::key_line("Esc", "Clear search"),
            Self::key_line("q", "Quit"),
        ]
    }

    fn log_viewer_help() -> Vec<Line<'static>> {
        vec![
            Self::section("Navigation"),
            Self::key_line("j/↓", "Scroll down"),
            Self::key_line("k/↑", "Scroll up"),
            Self::key_line("Ctrl+d", "Page down"),
            Self::key_line("Ctrl+u", "Page up"),
            Self::key_line("g", "Go to top"),
            Self::key_line("G", "Go to bottom"),
            Line::from(""),
            Self::section("Display"),
            Self::key_line("f", "Toggle follow mode"),
            Self::key_line("t", "Toggle timestamps"),
            Self::key_line("c", "Clear logs"),
            Line::from(""),
            Self::section("General"),
            Self::key_line("?", "Toggle this help"),
            Self::key_line("Esc", "Disconnect and go back"),
            Self::key_line("q", "Quit"),
        ]
    }

    fn section(title: &'static str) -> Line<'static> {
        Line::from(Span::styled(title, Style::default().fg(Color::Yellow)))
    }

    fn key_line(key: &'static str, desc: &'static str) -> Line<'static> {
        Line::from(vec![
            Span::styled(format!("  {:>8}", key), Style::default().fg(Color::Green)),
            Span::styled(format!("  {}", desc), Style::default().fg(Color::White)),
        ])
    }
}
