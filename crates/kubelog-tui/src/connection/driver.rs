use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kubelog_types::{ContainerRef, StreamMessage, ViewLine};

use super::Effect;

/// How long a channel may take to complete its handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What a log channel or retry timer reports back, tagged with the
/// generation it was started under
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    Opened(u64),
    Message(u64, StreamMessage),
    Closed(u64),
    RetryDue(u64),
}

/// Builds the push-channel address for a container
pub trait ChannelAddress: Send + Sync {
    fn stream_url(&self, target: &ContainerRef) -> String;
}

/// Applies [`Effect`]s: owns at most one live channel task and at most one
/// pending retry timer.
pub struct ChannelDriver<A> {
    address: A,
    events: mpsc::UnboundedSender<ChannelEvent>,
    connect_timeout: Duration,
    channel: Option<CancellationToken>,
    retry: Option<AbortHandle>,
}

impl<A: ChannelAddress> ChannelDriver<A> {
    pub fn new(address: A, events: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self {
            address,
            events,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            channel: None,
            retry: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Carry out `effects` in order and hand back the lines to display
    pub fn apply(&mut self, effects: Vec<Effect>) -> Vec<ViewLine> {
        let mut lines = Vec::new();

        for effect in effects {
            match effect {
                Effect::OpenChannel { generation, target } => self.open(generation, &target),
                Effect::CloseChannel => self.close(),
                Effect::ScheduleRetry { generation, delay } => self.schedule(generation, delay),
                Effect::CancelRetry => self.cancel_retry(),
                Effect::Render(line) => lines.push(line),
            }
        }

        lines
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Close the channel and drop the timer
    pub fn shutdown(&mut self) {
        self.close();
        self.cancel_retry();
    }

    fn open(&mut self, generation: u64, target: &ContainerRef) {
        // Never two producers for one view
        self.close();
        self.cancel_retry();

        let url = self.address.stream_url(target);
        let cancel = CancellationToken::new();
        debug!(container = %target, generation, "opening log channel");

        tokio::spawn(run_channel(
            url,
            generation,
            self.events.clone(),
            cancel.clone(),
            self.connect_timeout,
        ));
        self.channel = Some(cancel);
    }

    fn close(&mut self) {
        if let Some(cancel) = self.channel.take() {
            cancel.cancel();
        }
    }

    fn schedule(&mut self, generation: u64, delay: Duration) {
        self.cancel_retry();

        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ChannelEvent::RetryDue(generation));
        });
        self.retry = Some(handle.abort_handle());
    }

    fn cancel_retry(&mut self) {
        if let Some(handle) = self.retry.take() {
            handle.abort();
        }
    }
}

impl<A> Drop for ChannelDriver<A> {
    fn drop(&mut self) {
        if let Some(cancel) = self.channel.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.retry.take() {
            handle.abort();
        }
    }
}

async fn run_channel(
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<ChannelEvent>,
    cancel: CancellationToken,
    connect_timeout: Duration,
) {
    let connect = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url));

    let mut socket = tokio::select! {
        _ = cancel.cancelled() => return,
        connected = connect => match connected {
            Ok(Ok((socket, _))) => socket,
            Ok(Err(e)) => {
                warn!("log channel failed to open: {}", e);
                let _ = events.send(ChannelEvent::Closed(generation));
                return;
            }
            Err(_) => {
                warn!("log channel timed out after {:?}", connect_timeout);
                let _ = events.send(ChannelEvent::Closed(generation));
                return;
            }
        },
    };

    let _ = events.send(ChannelEvent::Opened(generation));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = socket.close(None).await;
                return;
            }
            msg = socket.next() => match msg {
                Some(Ok(Message::Text(text))) => match StreamMessage::from_json(text.as_str()) {
                    Ok(message) => {
                        let _ = events.send(ChannelEvent::Message(generation, message));
                    }
                    Err(e) => debug!("ignoring malformed message: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("log channel error: {}", e);
                    break;
                }
            },
        }
    }

    let _ = events.send(ChannelEvent::Closed(generation));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    impl ChannelAddress for Unreachable {
        fn stream_url(&self, _target: &ContainerRef) -> String {
            // Nothing listens on port 1
            "ws://127.0.0.1:1/ws/logs/p/c".to_string()
        }
    }

    fn driver() -> (ChannelDriver<Unreachable>, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelDriver::new(Unreachable, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fires_after_delay() {
        let (mut driver, mut rx) = driver();

        driver.apply(vec![Effect::ScheduleRetry {
            generation: 3,
            delay: Duration::from_secs(4),
        }]);
        assert!(driver.has_pending_retry());

        tokio::time::sleep(Duration::from_millis(3900)).await;
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await, Some(ChannelEvent::RetryDue(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_retry_never_fires() {
        let (mut driver, mut rx) = driver();

        driver.apply(vec![
            Effect::ScheduleRetry {
                generation: 1,
                delay: Duration::from_secs(2),
            },
            Effect::CancelRetry,
        ]);
        assert!(!driver.has_pending_retry());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_pending_retry() {
        let (mut driver, mut rx) = driver();

        driver.apply(vec![Effect::ScheduleRetry {
            generation: 1,
            delay: Duration::from_secs(2),
        }]);
        driver.apply(vec![Effect::ScheduleRetry {
            generation: 2,
            delay: Duration::from_secs(6),
        }]);

        assert_eq!(rx.recv().await, Some(ChannelEvent::RetryDue(2)));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_render_effects_are_returned() {
        let (mut driver, _rx) = driver();

        let lines = driver.apply(vec![
            Effect::Render(ViewLine::Error("boom".into())),
            Effect::CancelRetry,
        ]);

        assert_eq!(lines, vec![ViewLine::Error("boom".into())]);
    }

    #[tokio::test]
    async fn test_failed_open_reports_closed() {
        let (mut driver, mut rx) = driver();

        driver.apply(vec![Effect::OpenChannel {
            generation: 7,
            target: ContainerRef::new("apps", "p", "c"),
        }]);
        assert!(driver.has_channel());

        assert_eq!(rx.recv().await, Some(ChannelEvent::Closed(7)));
    }

    #[tokio::test]
    async fn test_second_open_cancels_first_channel() {
        let (mut driver, _rx) = driver();

        driver.apply(vec![Effect::OpenChannel {
            generation: 1,
            target: ContainerRef::new("apps", "web-1", "nginx"),
        }]);
        let first = driver.channel.clone().unwrap();

        driver.apply(vec![Effect::OpenChannel {
            generation: 2,
            target: ContainerRef::new("apps", "web-1", "sidecar"),
        }]);
        let second = driver.channel.clone().unwrap();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(driver.has_channel());

        driver.shutdown();
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_close_before_connect_is_silent() {
        let (mut driver, mut rx) = driver();

        driver.apply(vec![
            Effect::OpenChannel {
                generation: 1,
                target: ContainerRef::new("apps", "p", "c"),
            },
            Effect::CloseChannel,
        ]);
        assert!(!driver.has_channel());

        // Either the cancel wins and nothing is sent, or the refused connect
        // reports generation 1, which the manager treats as stale
        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(500), rx.recv()).await
        {
            assert_eq!(event, ChannelEvent::Closed(1));
        }
    }
}
