use chrono::Local;
use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};

use kubelog_logs::LogBuffer;
use kubelog_types::ViewLine;

use crate::app::AppState;
use crate::ui::{
    Layout, Theme,
    components::{StatusBar, log_viewer_hints},
};

/// Live log view for the followed container
pub struct LogViewerScreen;

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState, log_buffer: &LogBuffer) {
        let area = frame.area();
        let (header_area, content_area, status_area) = Layout::main(area);

        Self::render_header(frame, header_area, state);
        Self::render_logs(frame, content_area, state, log_buffer);
        Self::render_status_bar(frame, status_area, state, log_buffer);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let namespace = state.namespace.as_deref().unwrap_or("?");
        let target = state
            .selected
            .as_ref()
            .map(|t| format!("{}/{}", t.pod_name, t.container_name))
            .unwrap_or_else(|| "?".to_string());

        let title = Line::from(vec![
            Span::styled("kubelog", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(namespace, Theme::text()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(target, Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("● {}", state.connection.label()),
                Theme::connection(state.connection),
            ),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut AppState, log_buffer: &LogBuffer) {
        let total = log_buffer.len();
        let inner_height = area.height.saturating_sub(2) as usize;
        let max_scroll = total.saturating_sub(inner_height);

        if state.ui_state.auto_scroll {
            state.ui_state.log_scroll = max_scroll;
        }
        if state.ui_state.log_scroll > max_scroll {
            state.ui_state.log_scroll = max_scroll;
        }

        let lines: Vec<Line> = log_buffer
            .range(state.ui_state.log_scroll, inner_height)
            .iter()
            .map(|line| Self::format_line(line, state.ui_state.show_timestamps))
            .collect();

        let title = format!(" Logs ({}) ", log_buffer.log_count());
        let logs_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(logs_widget, area);

        if total > inner_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));
            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(state.ui_state.log_scroll);

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    /// Log lines are plain; errors and notices are bold in their own color
    fn format_line(line: &ViewLine, show_timestamps: bool) -> Line<'static> {
        let mut spans = Vec::new();

        if show_timestamps && let Some(ts) = line.timestamp() {
            let time_str = ts.with_timezone(&Local).format("%H:%M:%S").to_string();
            spans.push(Span::styled(time_str, Theme::text_dim()));
            spans.push(Span::styled(" │ ", Theme::text_dim()));
        }

        let style = if line.is_log() {
            Style::default().fg(line.color())
        } else {
            Theme::notice(line.color())
        };
        spans.push(Span::styled(line.text(), style));

        Line::from(spans)
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, log_buffer: &LogBuffer) {
        let follow = if state.ui_state.auto_scroll {
            "FOLLOW"
        } else {
            "PAUSED"
        };
        let right = format!("{} │ {}/{} lines", follow, log_buffer.len(), log_buffer.capacity());

        let status = StatusBar::new().hints(log_viewer_hints()).right(right);

        frame.render_widget(status, area);
    }
}
