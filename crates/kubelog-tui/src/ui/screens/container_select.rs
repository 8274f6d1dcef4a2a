use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::{
    app::AppState,
    ui::{
        Layout, Theme,
        components::{ListSelector, ListSelectorExt, StatusBar, list_nav_hints},
    },
};

/// Container selection screen
pub struct ContainerSelectScreen;

impl ContainerSelectScreen {
    pub fn render(frame: &mut Frame, state: &mut AppState) {
        let area = frame.area();
        let (header_area, content_area, status_area) = Layout::main(area);

        Self::render_header(frame, header_area, state);

        let show_search = state.ui_state.search_active || !state.ui_state.search_input.is_empty();
        if show_search {
            let (search_area, list_area) = Layout::with_search_bar(content_area);
            Self::render_search_bar(frame, search_area, state);
            Self::render_list(frame, list_area, state);
        } else {
            Self::render_list(frame, content_area, state);
        }

        Self::render_status_bar(frame, status_area, state);
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let namespace = state.namespace.as_deref().unwrap_or("?");

        let title = Line::from(vec![
            Span::styled("kubelog", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(state.gateway.as_str(), Theme::text()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(namespace, Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled("Select Container", Theme::text()),
        ]);

        let header = Paragraph::new(title).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_search_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        let active = state.ui_state.search_active;

        let mut spans = vec![if active {
            Span::styled(
                " /",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(" Search: ", Theme::text_dim())
        }];

        spans.push(Span::styled(
            state.ui_state.search_input.clone(),
            Theme::text_highlight(),
        ));

        if active {
            spans.push(Span::styled(
                "█",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::SLOW_BLINK),
            ));
            spans.push(Span::styled("  [Enter] Apply  [Esc] Cancel", Theme::text_dim()));
        } else {
            spans.push(Span::styled("  [/] Edit  [Esc] Clear", Theme::text_dim()));
        }

        let search_bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if active {
                    Style::default().fg(Color::Yellow)
                } else {
                    Theme::border()
                })
                .title(Span::styled(" Search ", Theme::title())),
        );

        frame.render_widget(search_bar, area);
    }

    fn render_list(frame: &mut Frame, area: Rect, state: &mut AppState) {
        let list_area = Layout::centered_list(area, 80);

        let items: Vec<(String, bool)> = state
            .filtered_containers()
            .into_iter()
            .map(|c| {
                let following = state
                    .selected
                    .as_ref()
                    .is_some_and(|s| s.pod_name == c.pod_name && s.container_name == c.container_name);
                (c.id.clone(), following)
            })
            .collect();

        let title = if state.ui_state.search_input.is_empty() {
            " Containers ".to_string()
        } else {
            format!(" Containers ({} matching) ", items.len())
        };

        let selector = ListSelector::new(title).items(items);

        frame.render_list_selector(list_area, selector, &mut state.ui_state.list_state);
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
        if let Some(err) = &state.ui_state.error_message {
            let line = Line::from(Span::styled(format!(" ⚠ {}", err), Theme::error()));
            frame.render_widget(Paragraph::new(line), area);
            return;
        }

        let count = format!("{} containers", state.containers.len());
        let status = StatusBar::new().hints(list_nav_hints()).right(count);

        frame.render_widget(status, area);
    }
}
