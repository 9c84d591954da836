use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wearlink_codec::{FrameKey, RawFrame};
use wearlink_transport::Transport;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

/// Deadline offset used when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Key a command is matched to its response by.
pub type CommandKey = FrameKey;

/// What happened to an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDisposition {
    /// The frame resolved the pending command with this key.
    Resolved(CommandKey),
    /// No command was waiting; the frame is streamed data.
    Unsolicited(RawFrame),
}

struct PendingCommand {
    token: u64,
    deadline: Instant,
    slot: oneshot::Sender<RawFrame>,
}

struct Shared {
    pending: Mutex<HashMap<CommandKey, PendingCommand>>,
    shutdown: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HashMap<CommandKey, PendingCommand>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove the entry only if it still belongs to the given send.
    fn remove_if_token(&self, key: &CommandKey, token: u64) -> bool {
        let mut pending = self.lock();
        match pending.get(key) {
            Some(cmd) if cmd.token == token => {
                pending.remove(key);
                true
            }
            _ => false,
        }
    }
}

/// Drop every entry whose deadline has passed. Their waiters observe a
/// closed slot and report a timeout.
fn purge_expired(pending: &mut HashMap<CommandKey, PendingCommand>, now: Instant) -> usize {
    let before = pending.len();
    pending.retain(|key, cmd| {
        if cmd.deadline <= now {
            tracing::warn!(key = %key, "command expired without response");
            false
        } else {
            true
        }
    });
    before - pending.len()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Sends commands and matches inbound frames to the commands awaiting them.
pub struct CommandChannel<T> {
    transport: T,
    shared: Arc<Shared>,
    next_token: AtomicU64,
    config: ChannelConfig,
}

impl<T: Transport> CommandChannel<T> {
    /// Create a channel with default configuration.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ChannelConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(transport: T, config: ChannelConfig) -> Self {
        Self {
            transport,
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
            next_token: AtomicU64::new(1),
            config,
        }
    }

    /// Register a pending command and emit its frame.
    ///
    /// Fails with [`ChannelError::DuplicateKey`] without sending anything if
    /// the key is already awaiting a response.
    pub fn send_command(
        &self,
        key: CommandKey,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<PendingResponse> {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (slot, rx) = oneshot::channel();

        {
            let mut pending = self.shared.lock();
            if self.shared.shutdown.is_cancelled() {
                return Err(ChannelError::Shutdown);
            }
            purge_expired(&mut pending, now);
            if pending.contains_key(&key) {
                return Err(ChannelError::DuplicateKey(key));
            }
            if pending.len() >= self.config.max_pending {
                return Err(ChannelError::TooManyPending(self.config.max_pending));
            }
            pending.insert(
                key,
                PendingCommand {
                    token,
                    deadline,
                    slot,
                },
            );
        }

        let frame = RawFrame::new(key, payload);
        if let Err(err) = self.transport.send_frame(&frame) {
            self.shared.remove_if_token(&key, token);
            return Err(err.into());
        }
        tracing::debug!(frame = %frame, timeout_ms = millis(timeout), "command sent");

        Ok(PendingResponse {
            key,
            token,
            deadline,
            timeout,
            rx,
            shared: Arc::clone(&self.shared),
        })
    }

    /// [`CommandChannel::send_command`] with the configured default timeout.
    pub fn send_command_default(
        &self,
        key: CommandKey,
        payload: impl Into<Bytes>,
    ) -> Result<PendingResponse> {
        self.send_command(key, payload, self.config.default_timeout)
    }

    /// Route an inbound frame.
    ///
    /// A frame whose key matches a live pending command resolves it; anything
    /// else comes back as [`FrameDisposition::Unsolicited`].
    pub fn on_frame_received(&self, frame: RawFrame) -> FrameDisposition {
        let key = frame.key();
        let mut pending = self.shared.lock();
        purge_expired(&mut pending, Instant::now());

        let Some(cmd) = pending.remove(&key) else {
            return FrameDisposition::Unsolicited(frame);
        };
        match cmd.slot.send(frame) {
            Ok(()) => {
                tracing::debug!(key = %key, "command resolved");
                FrameDisposition::Resolved(key)
            }
            // Waiter is gone; treat the frame as data.
            Err(frame) => FrameDisposition::Unsolicited(frame),
        }
    }

    /// Expire overdue commands now instead of on the next interaction.
    pub fn expire_overdue(&self) -> usize {
        purge_expired(&mut self.shared.lock(), Instant::now())
    }

    /// Stop the channel. Pending commands resolve with
    /// [`ChannelError::Shutdown`] and later sends are rejected.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let drained = {
            let mut pending = self.shared.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        tracing::debug!(pending = drained, "command channel shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Number of commands awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_pending(&self, key: &CommandKey) -> bool {
        self.shared.lock().contains_key(key)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

/// Single-assignment result of one [`CommandChannel::send_command`] call.
///
/// Await it (or call [`PendingResponse::wait`]) to get the response frame.
/// Dropping it unregisters the command.
pub struct PendingResponse {
    key: CommandKey,
    token: u64,
    deadline: Instant,
    timeout: Duration,
    rx: oneshot::Receiver<RawFrame>,
    shared: Arc<Shared>,
}

impl PendingResponse {
    pub fn key(&self) -> CommandKey {
        self.key
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the matching frame or the deadline, whichever wins the
    /// pending table first.
    pub async fn wait(mut self) -> Result<RawFrame> {
        tokio::select! {
            biased;
            received = &mut self.rx => match received {
                Ok(frame) => Ok(frame),
                Err(_) => Err(self.closed_error()),
            },
            _ = tokio::time::sleep_until(self.deadline) => {
                if self.shared.remove_if_token(&self.key, self.token) {
                    tracing::warn!(key = %self.key, timeout_ms = millis(self.timeout), "command timed out");
                    return Err(ChannelError::Timeout(self.timeout));
                }
                // Lost the race: the entry was already resolved or purged.
                match self.rx.try_recv() {
                    Ok(frame) => Ok(frame),
                    Err(_) => Err(self.closed_error()),
                }
            }
        }
    }

    fn closed_error(&self) -> ChannelError {
        if self.shared.shutdown.is_cancelled() {
            ChannelError::Shutdown
        } else {
            ChannelError::Timeout(self.timeout)
        }
    }
}

impl IntoFuture for PendingResponse {
    type Output = Result<RawFrame>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.shared.remove_if_token(&self.key, self.token);
    }
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("key", &self.key)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wearlink_transport::{MemoryTransport, TransportError};

    use super::*;

    fn key(module: u8, register: u8) -> CommandKey {
        FrameKey::new(module, register, None)
    }

    fn channel() -> CommandChannel<Arc<MemoryTransport>> {
        CommandChannel::new(Arc::new(MemoryTransport::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn response_resolves_pending_command() {
        let channel = channel();
        let pending = channel
            .send_command(key(5, 0x0e), vec![0xda], Duration::from_secs(1))
            .expect("send should succeed");

        let sent = channel.transport().last_frame().expect("frame should be sent");
        assert_eq!(sent.to_bytes().as_ref(), &[0x05, 0x0e, 0xda]);

        let response = RawFrame::new(key(5, 0x0e), vec![0x07, 0x30]);
        assert_eq!(
            channel.on_frame_received(response.clone()),
            FrameDisposition::Resolved(key(5, 0x0e))
        );
        assert_eq!(channel.pending_count(), 0);
        assert_eq!(pending.await.expect("should resolve"), response);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_key_is_rejected_without_sending() {
        let channel = channel();
        let _first = channel
            .send_command(key(5, 0x0e), vec![0xda], Duration::from_secs(1))
            .unwrap();

        let err = channel
            .send_command(key(5, 0x0e), vec![0xdb], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ChannelError::DuplicateKey(k) if k == key(5, 0x0e)));
        assert_eq!(channel.transport().frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_resolves_once_and_late_frame_is_unsolicited() {
        let channel = channel();
        let pending = channel
            .send_command(key(5, 0x0e), vec![0xda], Duration::from_secs(1))
            .unwrap();

        let started = Instant::now();
        let err = pending.wait().await.unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(t) if t == Duration::from_secs(1)));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert!(!channel.is_pending(&key(5, 0x0e)));

        tokio::time::advance(Duration::from_secs(2)).await;
        let late = RawFrame::new(key(5, 0x0e), vec![0x01]);
        assert_eq!(
            channel.on_frame_received(late.clone()),
            FrameDisposition::Unsolicited(late)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_purged_before_matching() {
        let channel = channel();
        let pending = channel
            .send_command(key(1, 2), vec![], Duration::from_millis(100))
            .unwrap();

        tokio::time::advance(Duration::from_millis(200)).await;
        let frame = RawFrame::new(key(1, 2), vec![0xff]);
        assert!(matches!(
            channel.on_frame_received(frame),
            FrameDisposition::Unsolicited(_)
        ));
        assert!(matches!(pending.wait().await, Err(ChannelError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_resolve_independently() {
        let channel = channel();
        let first = channel
            .send_command(key(1, 1), vec![0x01], Duration::from_secs(1))
            .unwrap();
        let second = channel
            .send_command(key(1, 2), vec![0x02], Duration::from_secs(1))
            .unwrap();

        channel.on_frame_received(RawFrame::new(key(1, 2), vec![0x22]));
        channel.on_frame_received(RawFrame::new(key(1, 1), vec![0x11]));

        assert_eq!(second.await.unwrap().payload.as_ref(), &[0x22]);
        assert_eq!(first.await.unwrap().payload.as_ref(), &[0x11]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_with_mixed_outcomes() {
        let channel = Arc::new(channel());
        let slow = channel
            .send_command(key(2, 1), vec![], Duration::from_millis(500))
            .unwrap();
        let fast = channel
            .send_command(key(2, 2), vec![], Duration::from_secs(5))
            .unwrap();

        let slow_task = tokio::spawn(slow.wait());
        let fast_task = tokio::spawn(fast.wait());

        tokio::time::advance(Duration::from_secs(1)).await;
        let responder = Arc::clone(&channel);
        responder.on_frame_received(RawFrame::new(key(2, 2), vec![0x42]));

        assert!(matches!(
            slow_task.await.unwrap(),
            Err(ChannelError::Timeout(_))
        ));
        assert_eq!(fast_task.await.unwrap().unwrap().payload.as_ref(), &[0x42]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_response_unregisters_key() {
        let channel = channel();
        let pending = channel
            .send_command(key(3, 3), vec![], Duration::from_secs(1))
            .unwrap();
        assert!(channel.is_pending(&key(3, 3)));

        drop(pending);
        assert!(!channel.is_pending(&key(3, 3)));
        assert!(channel
            .send_command(key(3, 3), vec![], Duration::from_secs(1))
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_resolves_pending_and_rejects_new_sends() {
        let channel = channel();
        let pending = channel
            .send_command(key(4, 4), vec![], Duration::from_secs(1))
            .unwrap();

        channel.shutdown();
        assert!(channel.is_shutdown());
        assert!(matches!(pending.await, Err(ChannelError::Shutdown)));
        assert!(matches!(
            channel.send_command(key(4, 5), vec![], Duration::from_secs(1)),
            Err(ChannelError::Shutdown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_unregisters_command() {
        let channel = channel();
        channel.transport().close();

        let err = channel
            .send_command(key(6, 1), vec![], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Transport(TransportError::Closed)
        ));
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_table_is_bounded() {
        let channel = CommandChannel::with_config(
            MemoryTransport::new(),
            ChannelConfig {
                max_pending: 1,
                ..ChannelConfig::default()
            },
        );
        let _held = channel.send_command_default(key(7, 1), vec![]).unwrap();
        assert!(matches!(
            channel.send_command_default(key(7, 2), vec![]),
            Err(ChannelError::TooManyPending(1))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn event_id_is_part_of_the_key() {
        let channel = channel();
        let with_event = FrameKey::new(0x0d, 0x82, Some(0x0f));
        let pending = channel
            .send_command(with_event, vec![0xda], Duration::from_secs(1))
            .unwrap();

        let other_event = RawFrame::new(FrameKey::new(0x0d, 0x82, Some(0x0e)), vec![0x01]);
        assert!(matches!(
            channel.on_frame_received(other_event),
            FrameDisposition::Unsolicited(_)
        ));

        channel.on_frame_received(RawFrame::new(with_event, vec![0x07, 0x30]));
        assert_eq!(pending.await.unwrap().payload.as_ref(), &[0x07, 0x30]);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_overdue_purges_without_traffic() {
        let channel = channel();
        let _pending = channel
            .send_command(key(8, 1), vec![], Duration::from_millis(10))
            .unwrap();
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(channel.expire_overdue(), 1);
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_still_resolves() {
        let channel = channel();
        let pending = channel
            .send_command(key(9, 1), vec![], Duration::MAX)
            .unwrap();
        assert!(pending.deadline() > Instant::now() + Duration::from_secs(86_400));

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(channel.expire_overdue(), 0);
        channel.on_frame_received(RawFrame::new(key(9, 1), vec![0x01]));
        assert_eq!(pending.await.unwrap().payload.as_ref(), &[0x01]);
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(250)), 250);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
