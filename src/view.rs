use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use crossterm::event::KeyEvent;
use tokio::sync::mpsc;
use tracing::info;

use kubelog_logs::LogBuffer;
use kubelog_tui::{
    Action, AppState, ChannelDriver, ChannelEvent, ConnectionManager, ContainerSelectScreen,
    Effect, Event, EventHandler, GatewayClient, HelpOverlay, KeyBindings, KeyContext,
    LogViewerScreen, ReconnectPolicy, Screen, Tui,
};
use kubelog_types::ContainerList;

#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Gateway base URL
    #[arg(long, env = "KUBELOG_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Shared secret configured on the gateway
    #[arg(long, env = "LOGKEY", hide_env_values = true)]
    key: Option<String>,

    /// Reconnection attempts before giving up on a channel
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// Delay unit between reconnection attempts; attempt n waits n units
    #[arg(long, default_value_t = 2)]
    base_delay_secs: u64,

    /// Seconds a log channel may take to open before it counts as lost
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Lines kept in the log view
    #[arg(long, default_value_t = 10000)]
    buffer_size: usize,

    /// Append diagnostics to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Internal actions for async operations
enum InternalAction {
    LoadContainers,
    ContainersLoaded(ContainerList),
    Error(String),
}

type Driver = ChannelDriver<GatewayClient>;

pub async fn run(args: ViewArgs) -> Result<()> {
    let client = GatewayClient::new(&args.url, args.key.clone())?;
    let policy = ReconnectPolicy::new(Duration::from_secs(args.base_delay_secs), args.max_attempts);

    // Fail before taking over the terminal if the gateway is unreachable
    // or rejects the key
    let directory = client.list_containers().await?;
    info!(
        namespace = %directory.namespace,
        containers = directory.containers.len(),
        "connected to gateway"
    );

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<InternalAction>();
    let (channel_tx, mut channel_rx) = mpsc::unbounded_channel::<ChannelEvent>();

    let mut state = AppState::new(client.base_url().as_str());
    state.set_containers(directory.namespace, directory.containers);

    let log_buffer = LogBuffer::new(args.buffer_size);
    let mut manager = ConnectionManager::new(policy);
    let mut driver = ChannelDriver::new(client.clone(), channel_tx)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout_secs));

    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(100));
    let keybindings = KeyBindings::new();

    render(&mut tui, &mut state, &log_buffer)?;

    loop {
        tokio::select! {
            // Handle terminal events
            Some(event) = events.next() => {
                match event {
                    Event::Key(key) => {
                        for action in key_actions(&state, &keybindings, &key) {
                            let _ = action_tx.send(action);
                        }
                    }
                    Event::Tick | Event::Resize(_, _) => {}
                    Event::Error(e) => state.show_error(e),
                }
            }

            // Handle log channel and retry timer events
            Some(event) = channel_rx.recv() => {
                let effects = match event {
                    ChannelEvent::Opened(generation) => manager.on_open(generation),
                    ChannelEvent::Message(generation, message) => {
                        manager.on_message(generation, message)
                    }
                    ChannelEvent::Closed(generation) => manager.on_closed(generation),
                    ChannelEvent::RetryDue(generation) => manager.on_retry_due(generation),
                };
                apply_effects(&mut driver, &log_buffer, effects);
            }

            // Handle user actions
            Some(action) = action_rx.recv() => {
                handle_action(
                    &mut state,
                    &mut manager,
                    &mut driver,
                    &log_buffer,
                    &internal_tx,
                    action,
                );
            }

            // Handle internal async actions
            Some(internal) = internal_rx.recv() => {
                match internal {
                    InternalAction::LoadContainers => {
                        let client = client.clone();
                        let tx = internal_tx.clone();
                        tokio::spawn(async move {
                            let msg = match client.list_containers().await {
                                Ok(list) => InternalAction::ContainersLoaded(list),
                                Err(e) => InternalAction::Error(
                                    format!("Failed to load containers: {}", e)
                                ),
                            };
                            let _ = tx.send(msg);
                        });
                    }
                    InternalAction::ContainersLoaded(list) => {
                        state.set_containers(list.namespace, list.containers);
                    }
                    InternalAction::Error(msg) => {
                        state.show_error(msg);
                    }
                }
            }
        }

        state.connection = manager.state();

        if state.should_quit {
            break;
        }

        render(&mut tui, &mut state, &log_buffer)?;
    }

    // Cleanup
    driver.shutdown();
    events.shutdown();
    tui.restore()?;

    Ok(())
}

/// Map a key press to actions for the current mode
fn key_actions(state: &AppState, keybindings: &KeyBindings, key: &KeyEvent) -> Vec<Action> {
    let mut actions = Vec::new();

    // Any key dismisses an error; the key still counts
    if state.ui_state.error_message.is_some() {
        actions.push(Action::DismissError);
    }

    if state.ui_state.help_visible {
        // Only closing the overlay or quitting works while it is up
        match keybindings.get_action(KeyContext::Global, key) {
            Some(Action::ToggleHelp | Action::GoBack) => actions.push(Action::ToggleHelp),
            Some(Action::Quit) => actions.push(Action::Quit),
            _ => {}
        }
        return actions;
    }

    let action = if state.ui_state.search_active && state.current_screen == Screen::ContainerSelect
    {
        keybindings.get_search_input_action(key)
    } else {
        let context = match state.current_screen {
            Screen::ContainerSelect => KeyContext::ListNavigation,
            Screen::LogViewer => KeyContext::LogViewer,
        };
        keybindings.get_action(context, key)
    };

    actions.extend(action);
    actions
}

/// Carry out effects, sending render effects to the view
fn apply_effects(driver: &mut Driver, log_buffer: &LogBuffer, effects: Vec<Effect>) {
    for line in driver.apply(effects) {
        log_buffer.push(line);
    }
}

fn handle_action(
    state: &mut AppState,
    manager: &mut ConnectionManager,
    driver: &mut Driver,
    log_buffer: &LogBuffer,
    internal_tx: &mpsc::UnboundedSender<InternalAction>,
    action: Action,
) {
    match action {
        Action::Quit => {
            apply_effects(driver, log_buffer, manager.deselect());
            state.should_quit = true;
        }
        Action::GoBack => match state.current_screen {
            Screen::LogViewer => {
                // Leaving the view ends the channel and any pending retry
                apply_effects(driver, log_buffer, manager.deselect());
                log_buffer.clear();
                state.close_log_view();
            }
            Screen::ContainerSelect => {
                if state.ui_state.search_input.is_empty() {
                    state.should_quit = true;
                } else {
                    state.cancel_search();
                }
            }
        },
        Action::ToggleHelp => {
            state.ui_state.help_visible = !state.ui_state.help_visible;
        }

        // Container list
        Action::ListUp => state.list_up(),
        Action::ListDown => state.list_down(),
        Action::ListSelect => {
            if let Some(container) = state.highlighted_container() {
                let target = container.to_ref();
                log_buffer.clear();
                state.open_log_view(target.clone());
                apply_effects(driver, log_buffer, manager.select(target));
            }
        }
        Action::RefreshContainers => {
            let _ = internal_tx.send(InternalAction::LoadContainers);
        }

        // Search
        Action::OpenSearch => state.start_search(),
        Action::ApplySearch => state.apply_search(),
        Action::CloseSearch => state.cancel_search(),
        Action::SearchInput(c) => state.search_input_char(c),
        Action::SearchBackspace => state.search_input_backspace(),
        Action::SearchClear => state.search_clear(),

        // Log viewer actions
        Action::ScrollUp(n) => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_sub(n);
        }
        Action::ScrollDown(n) => {
            state.ui_state.auto_scroll = false;
            // Clamped to the buffer on render
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_add(n);
        }
        Action::PageUp => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_sub(20);
        }
        Action::PageDown => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = state.ui_state.log_scroll.saturating_add(20);
        }
        Action::ScrollToTop => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = 0;
        }
        Action::ScrollToBottom => {
            state.ui_state.auto_scroll = false;
            state.ui_state.log_scroll = usize::MAX;
        }
        Action::ToggleAutoScroll => {
            state.ui_state.auto_scroll = !state.ui_state.auto_scroll;
        }
        Action::ToggleTimestamps => {
            state.ui_state.show_timestamps = !state.ui_state.show_timestamps;
        }
        Action::ClearLogs => {
            log_buffer.clear();
            state.ui_state.log_scroll = 0;
        }

        Action::DismissError => state.dismiss_error(),
        Action::Render => {}
    }
}

fn render(tui: &mut Tui, state: &mut AppState, log_buffer: &LogBuffer) -> Result<()> {
    tui.terminal().draw(|frame| {
        match state.current_screen {
            Screen::ContainerSelect => ContainerSelectScreen::render(frame, state),
            Screen::LogViewer => LogViewerScreen::render(frame, state, log_buffer),
        }

        if state.ui_state.help_visible {
            HelpOverlay::render(frame, state.current_screen);
        }
    })?;

    Ok(())
}
