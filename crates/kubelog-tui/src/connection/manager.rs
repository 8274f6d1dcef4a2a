use std::time::Duration;

use tracing::{debug, info, warn};

use kubelog_types::{ContainerRef, StatusNotice, StreamMessage, ViewLine};

/// Reconnection policy for a dropped log channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Wait before retry number `attempt` (1-based). Grows linearly.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Lifecycle of the log channel for the selected container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing selected
    Idle,
    /// Channel open requested
    Connecting,
    /// Channel open and delivering
    Streaming,
    /// Channel lost while a container is still selected
    Disconnected,
    /// Waiting for the retry timer
    Reconnecting,
    /// Out of attempts; only a new selection leaves this state
    Abandoned,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Abandoned => "disconnected",
        }
    }
}

/// Work the manager asks its driver to carry out.
///
/// Every channel and timer is tagged with the generation it was created
/// under; events reporting an older generation are ignored.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    OpenChannel {
        generation: u64,
        target: ContainerRef,
    },
    CloseChannel,
    ScheduleRetry {
        generation: u64,
        delay: Duration,
    },
    CancelRetry,
    /// Append a line to the log view
    Render(ViewLine),
}

/// Client-side state machine that keeps one log channel alive for the
/// selected container.
///
/// The manager performs no I/O. It consumes channel events and returns the
/// effects the driver should apply, in order.
#[derive(Debug)]
pub struct ConnectionManager {
    policy: ReconnectPolicy,
    state: ConnectionState,
    target: Option<ContainerRef>,
    attempt: u32,
    generation: u64,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
            target: None,
            attempt: 0,
            generation: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn target(&self) -> Option<&ContainerRef> {
        self.target.as_ref()
    }

    /// Retries spent since the last delivered log line
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Follow `target`, replacing whatever was selected before.
    ///
    /// The previous channel is closed and any pending retry cancelled before
    /// the new channel is opened.
    pub fn select(&mut self, target: ContainerRef) -> Vec<Effect> {
        let mut effects = self.teardown();

        info!(container = %target, "selecting container");
        self.target = Some(target.clone());
        self.attempt = 0;
        effects.push(self.open(target));
        effects
    }

    /// Stop following and return to `Idle`
    pub fn deselect(&mut self) -> Vec<Effect> {
        let effects = self.teardown();
        if let Some(target) = self.target.take() {
            debug!(container = %target, "deselected container");
        }
        self.attempt = 0;
        self.generation += 1;
        self.state = ConnectionState::Idle;
        effects
    }

    /// The channel of `generation` finished its handshake
    pub fn on_open(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.mark_streaming()
    }

    /// A message arrived on the channel of `generation`
    pub fn on_message(&mut self, generation: u64, message: StreamMessage) -> Vec<Effect> {
        if generation != self.generation {
            return Vec::new();
        }

        let mut effects = match (self.state, &message) {
            (ConnectionState::Streaming, _) => Vec::new(),
            (ConnectionState::Connecting, StreamMessage::Line(_)) => self.mark_streaming(),
            // An error as the first message is not a reconnect
            (ConnectionState::Connecting, StreamMessage::Error { .. }) => {
                self.state = ConnectionState::Streaming;
                Vec::new()
            }
            _ => return Vec::new(),
        };

        match message {
            StreamMessage::Line(line) => {
                self.attempt = 0;
                effects.push(Effect::Render(ViewLine::Log(line)));
            }
            StreamMessage::Error { error } => {
                warn!("log channel reported an error: {}", error);
                effects.push(Effect::Render(ViewLine::Error(error)));
                effects.push(Effect::CloseChannel);
                effects.extend(self.disconnected());
            }
        }

        effects
    }

    /// The channel of `generation` closed or failed to open
    pub fn on_closed(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.generation {
            return Vec::new();
        }
        match self.state {
            ConnectionState::Connecting | ConnectionState::Streaming => self.disconnected(),
            _ => Vec::new(),
        }
    }

    /// The retry timer scheduled under `generation` fired
    pub fn on_retry_due(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.generation || self.state != ConnectionState::Reconnecting {
            return Vec::new();
        }
        match self.target.clone() {
            Some(target) => vec![self.open(target)],
            None => Vec::new(),
        }
    }

    fn open(&mut self, target: ContainerRef) -> Effect {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        Effect::OpenChannel {
            generation: self.generation,
            target,
        }
    }

    fn mark_streaming(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Streaming;
        if self.attempt > 0 {
            info!(attempt = self.attempt, "log channel reconnected");
            vec![Effect::Render(ViewLine::Status(StatusNotice::Reconnected))]
        } else {
            Vec::new()
        }
    }

    fn disconnected(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Disconnected;

        if self.attempt >= self.policy.max_attempts {
            warn!(attempts = self.attempt, "giving up on log channel");
            self.state = ConnectionState::Abandoned;
            return vec![
                Effect::Render(ViewLine::Status(StatusNotice::Exhausted)),
                Effect::Render(ViewLine::Status(StatusNotice::ReselectHint)),
            ];
        }

        self.attempt += 1;
        let delay = self.policy.delay_for(self.attempt);
        self.state = ConnectionState::Reconnecting;
        info!(
            attempt = self.attempt,
            max_attempts = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "log channel lost, scheduling reconnect"
        );

        vec![
            Effect::Render(ViewLine::Status(StatusNotice::RetryScheduled {
                attempt: self.attempt,
                max_attempts: self.policy.max_attempts,
                delay,
            })),
            Effect::ScheduleRetry {
                generation: self.generation,
                delay,
            },
        ]
    }

    /// Effects that release the current channel and timer
    fn teardown(&self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Streaming => vec![Effect::CloseChannel],
            ConnectionState::Reconnecting => vec![Effect::CancelRetry],
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::Abandoned => {
                Vec::new()
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(container: &str) -> ContainerRef {
        ContainerRef::new("apps", "web-1", container)
    }

    fn opened_generation(effects: &[Effect]) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::OpenChannel { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("no OpenChannel effect")
    }

    fn scheduled(effects: &[Effect]) -> Option<(u64, Duration)> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleRetry { generation, delay } => Some((*generation, *delay)),
            _ => None,
        })
    }

    fn notices(effects: &[Effect]) -> Vec<StatusNotice> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Render(ViewLine::Status(n)) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_delay_is_linear() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=5).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_select_opens_channel() {
        let mut manager = ConnectionManager::default();
        assert_eq!(manager.state(), ConnectionState::Idle);

        let effects = manager.select(target("nginx"));

        assert_eq!(
            effects,
            vec![Effect::OpenChannel {
                generation: 1,
                target: target("nginx"),
            }]
        );
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.target(), Some(&target("nginx")));
    }

    #[test]
    fn test_first_open_has_no_notice() {
        let mut manager = ConnectionManager::default();
        let generation = opened_generation(&manager.select(target("nginx")));

        assert!(manager.on_open(generation).is_empty());
        assert_eq!(manager.state(), ConnectionState::Streaming);
    }

    #[test]
    fn test_retries_back_off_then_abandon() {
        let mut manager = ConnectionManager::default();
        let mut generation = opened_generation(&manager.select(target("nginx")));
        let mut delays = Vec::new();

        for attempt in 1..=5 {
            let effects = manager.on_closed(generation);
            let (retry_generation, delay) = scheduled(&effects).expect("retry scheduled");
            assert_eq!(manager.state(), ConnectionState::Reconnecting);
            assert_eq!(manager.attempt(), attempt);
            assert_eq!(
                notices(&effects),
                vec![StatusNotice::RetryScheduled {
                    attempt,
                    max_attempts: 5,
                    delay,
                }]
            );
            delays.push(delay.as_secs());

            generation = opened_generation(&manager.on_retry_due(retry_generation));
            assert_eq!(manager.state(), ConnectionState::Connecting);
        }
        assert_eq!(delays, vec![2, 4, 6, 8, 10]);

        // The fifth retry fails too: no sixth attempt
        let effects = manager.on_closed(generation);
        assert!(scheduled(&effects).is_none());
        assert_eq!(manager.state(), ConnectionState::Abandoned);
        assert_eq!(
            notices(&effects),
            vec![StatusNotice::Exhausted, StatusNotice::ReselectHint]
        );

        // Nothing moves it until the user selects again
        assert!(manager.on_retry_due(generation).is_empty());
        assert!(manager.on_closed(generation).is_empty());
        assert_eq!(manager.state(), ConnectionState::Abandoned);
    }

    #[test]
    fn test_reselect_after_abandon_resets_attempts() {
        let mut manager = ConnectionManager::new(ReconnectPolicy::new(Duration::from_secs(1), 1));
        let generation = opened_generation(&manager.select(target("nginx")));
        let (retry, _) = scheduled(&manager.on_closed(generation)).unwrap();
        let generation = opened_generation(&manager.on_retry_due(retry));
        manager.on_closed(generation);
        assert_eq!(manager.state(), ConnectionState::Abandoned);

        // No channel or timer is live, so there is nothing to tear down
        let effects = manager.select(target("nginx"));
        assert!(matches!(effects.as_slice(), [Effect::OpenChannel { .. }]));
        assert_eq!(manager.attempt(), 0);
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_delivered_line_resets_attempts() {
        let mut manager = ConnectionManager::default();
        let generation = opened_generation(&manager.select(target("nginx")));
        let (retry, _) = scheduled(&manager.on_closed(generation)).unwrap();
        let generation = opened_generation(&manager.on_retry_due(retry));
        assert_eq!(manager.attempt(), 1);

        let effects = manager.on_open(generation);
        assert_eq!(notices(&effects), vec![StatusNotice::Reconnected]);
        // Opening alone does not reset the count
        assert_eq!(manager.attempt(), 1);

        let effects = manager.on_message(generation, StreamMessage::line("hello"));
        assert_eq!(manager.attempt(), 0);
        assert!(matches!(
            effects.as_slice(),
            [Effect::Render(ViewLine::Log(line))] if line.text == "hello"
        ));

        // The next drop starts the schedule over
        let (_, delay) = scheduled(&manager.on_closed(generation)).unwrap();
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn test_error_message_disconnects() {
        let mut manager = ConnectionManager::default();
        let generation = opened_generation(&manager.select(target("nginx")));
        manager.on_open(generation);

        let effects = manager.on_message(generation, StreamMessage::error("pod not found"));

        assert_eq!(effects[0], Effect::Render(ViewLine::Error("pod not found".into())));
        assert_eq!(effects[1], Effect::CloseChannel);
        assert!(scheduled(&effects).is_some());
        assert_eq!(manager.state(), ConnectionState::Reconnecting);

        // The close that follows the error is not a second failure
        assert!(manager.on_closed(generation).is_empty());
        assert_eq!(manager.attempt(), 1);
    }

    #[test]
    fn test_select_while_streaming_closes_before_open() {
        let mut manager = ConnectionManager::default();
        let first = opened_generation(&manager.select(target("nginx")));
        manager.on_open(first);

        let effects = manager.select(target("sidecar"));

        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::CloseChannel);
        assert!(matches!(
            &effects[1],
            Effect::OpenChannel { target: t, generation } if *t == target("sidecar") && *generation > first
        ));
    }

    #[test]
    fn test_select_while_reconnecting_cancels_timer() {
        let mut manager = ConnectionManager::default();
        let generation = opened_generation(&manager.select(target("nginx")));
        let (stale_retry, _) = scheduled(&manager.on_closed(generation)).unwrap();

        let effects = manager.select(target("sidecar"));
        assert_eq!(effects[0], Effect::CancelRetry);
        assert!(matches!(effects[1], Effect::OpenChannel { .. }));

        // A timer that fired anyway belongs to the abandoned target
        assert!(manager.on_retry_due(stale_retry).is_empty());
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_stale_channel_events_ignored() {
        let mut manager = ConnectionManager::default();
        let old = opened_generation(&manager.select(target("nginx")));
        manager.on_open(old);
        let new = opened_generation(&manager.select(target("sidecar")));

        assert!(manager.on_message(old, StreamMessage::line("late")).is_empty());
        assert!(manager.on_closed(old).is_empty());
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.on_open(new);
        assert_eq!(manager.state(), ConnectionState::Streaming);
    }

    #[test]
    fn test_message_before_open_counts_as_open() {
        let mut manager = ConnectionManager::default();
        let generation = opened_generation(&manager.select(target("nginx")));

        let effects = manager.on_message(generation, StreamMessage::line("early"));

        assert_eq!(manager.state(), ConnectionState::Streaming);
        assert_eq!(effects.len(), 1);
    }

    #[test]
    fn test_error_as_first_message_after_retry_is_not_a_reconnect() {
        let mut manager = ConnectionManager::default();
        let generation = opened_generation(&manager.select(target("nginx")));
        let (retry, _) = scheduled(&manager.on_closed(generation)).unwrap();
        let generation = opened_generation(&manager.on_retry_due(retry));

        let effects = manager.on_message(generation, StreamMessage::error("container not found"));

        assert_eq!(
            effects[0],
            Effect::Render(ViewLine::Error("container not found".into()))
        );
        assert_eq!(
            notices(&effects),
            vec![StatusNotice::RetryScheduled {
                attempt: 2,
                max_attempts: 5,
                delay: Duration::from_secs(4),
            }]
        );
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_deselect_returns_to_idle() {
        let mut manager = ConnectionManager::default();
        let generation = opened_generation(&manager.select(target("nginx")));
        manager.on_open(generation);

        assert_eq!(manager.deselect(), vec![Effect::CloseChannel]);
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(manager.target().is_none());
        assert!(manager.on_closed(generation).is_empty());

        // Deselecting while waiting to retry cancels the timer
        let generation = opened_generation(&manager.select(target("nginx")));
        manager.on_closed(generation);
        assert_eq!(manager.deselect(), vec![Effect::CancelRetry]);
    }
}
