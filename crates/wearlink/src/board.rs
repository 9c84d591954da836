use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use wearlink_codec::{RawFrame, ValueDescriptor};
use wearlink_command::{
    ChannelConfig, ChannelError, CommandChannel, CommandKey, FrameDisposition, PendingResponse,
};
use wearlink_route::{RouteComponent, RouteError, RouteGraph, RouteHandle, RouteId};
use wearlink_transport::Transport;

/// What happened to an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The frame answered a pending command.
    Resolved(CommandKey),
    /// The frame was streamed data, delivered to this many routes.
    Dispatched(usize),
}

/// One device connection: a command channel and the routes fed by its
/// unsolicited frames.
///
/// Inbound frames must be passed to [`Board::on_frame_received`] from a
/// single delivery context to keep per-source ordering.
pub struct Board<T> {
    channel: CommandChannel<T>,
    routes: Arc<RouteGraph>,
}

impl<T: Transport> Board<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ChannelConfig::default())
    }

    pub fn with_config(transport: T, config: ChannelConfig) -> Self {
        Self {
            channel: CommandChannel::with_config(transport, config),
            routes: Arc::new(RouteGraph::new()),
        }
    }

    /// Share an existing route graph, for example one restored from a
    /// snapshot.
    pub fn with_routes(transport: T, config: ChannelConfig, routes: Arc<RouteGraph>) -> Self {
        Self {
            channel: CommandChannel::with_config(transport, config),
            routes,
        }
    }

    pub fn channel(&self) -> &CommandChannel<T> {
        &self.channel
    }

    pub fn routes(&self) -> &Arc<RouteGraph> {
        &self.routes
    }

    pub fn send_command(
        &self,
        key: CommandKey,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<PendingResponse, ChannelError> {
        self.channel.send_command(key, payload, timeout)
    }

    pub fn build_route<F>(
        &self,
        source: ValueDescriptor,
        configure: F,
    ) -> Result<RouteHandle, RouteError>
    where
        F: FnOnce(&mut RouteComponent<'_>),
    {
        self.routes.build_route(source, configure)
    }

    pub fn detach_route(&self, id: RouteId) -> bool {
        self.routes.detach(id)
    }

    /// Hand an inbound frame to the pending command it answers, or to the
    /// routes sourced at its key.
    pub fn on_frame_received(&self, frame: RawFrame) -> Delivery {
        self.on_frame_received_at(frame, SystemTime::now())
    }

    /// [`Board::on_frame_received`] with an explicit arrival time.
    pub fn on_frame_received_at(&self, frame: RawFrame, timestamp: SystemTime) -> Delivery {
        match self.channel.on_frame_received(frame) {
            FrameDisposition::Resolved(key) => Delivery::Resolved(key),
            FrameDisposition::Unsolicited(frame) => {
                let delivered = self.routes.dispatch_frame(&frame, timestamp);
                if delivered == 0 {
                    tracing::trace!(frame = %frame, "unsolicited frame matched no route");
                }
                Delivery::Dispatched(delivered)
            }
        }
    }

    /// Snapshot the route structure and environment data.
    #[cfg(feature = "state")]
    pub fn snapshot(&self) -> wearlink_state::BoardSnapshot {
        wearlink_state::serialize(&self.routes)
    }

    /// Commit the routes of a snapshot into this board's graph.
    #[cfg(feature = "state")]
    pub fn restore(
        &self,
        snapshot: &wearlink_state::BoardSnapshot,
    ) -> wearlink_state::Result<Vec<RouteHandle>> {
        wearlink_state::restore_into(snapshot, &self.routes)
    }

    /// Stop command resolution. Routes keep their state.
    pub fn shutdown(&self) {
        self.channel.shutdown();
    }
}

impl<T> std::fmt::Debug for Board<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use wearlink_codec::FrameKey;
    use wearlink_route::EnvValue;
    use wearlink_transport::MemoryTransport;

    use super::*;

    fn board() -> Board<Arc<MemoryTransport>> {
        Board::new(Arc::new(MemoryTransport::new()))
    }

    fn spi() -> ValueDescriptor {
        ValueDescriptor::new(5, 0x0e, 1, false)
            .unwrap()
            .with_samples(0, 5)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn response_resolves_command_instead_of_routes() {
        let board = board();
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        board
            .build_route(spi(), move |root| {
                root.stream(move |_, _| *counter.lock().unwrap() += 1);
            })
            .unwrap();

        let key = FrameKey::new(5, 0x0e, None);
        let pending = board
            .send_command(key, vec![0xda], Duration::from_secs(1))
            .unwrap();

        let reply = RawFrame::new(key, vec![0x07, 0x30, 0x81, 0x0b, 0xc0]);
        assert_eq!(board.on_frame_received(reply.clone()), Delivery::Resolved(key));
        assert_eq!(pending.await.unwrap(), reply);
        assert_eq!(*hits.lock().unwrap(), 0);

        assert_eq!(board.on_frame_received(reply), Delivery::Dispatched(1));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn streamed_frames_reach_subscribers_in_order() {
        let board = board();
        let route = board
            .build_route(spi(), |root| {
                root.stream(|value, env| {
                    let count = env.get(0).and_then(EnvValue::as_int).unwrap_or(0);
                    env.set(0, EnvValue::Int(count + 1));
                    env.set(1, EnvValue::Sample(value.clone()));
                });
            })
            .unwrap();

        let key = spi().key();
        board.on_frame_received(RawFrame::new(key, vec![1, 2, 3, 4, 5]));
        board.on_frame_received(RawFrame::new(key, vec![6, 7, 8, 9, 10]));

        let env = route.environment(0).unwrap();
        assert_eq!(env.get(0), Some(&EnvValue::Int(2)));
        let last = env.get(1).and_then(EnvValue::as_sample).unwrap();
        assert_eq!(last.as_bytes(), &[6, 7, 8, 9, 10]);
    }

    #[test]
    fn unmatched_frame_is_ignored() {
        let board = board();
        let frame = RawFrame::new(FrameKey::new(1, 2, Some(3)), vec![0]);
        assert_eq!(board.on_frame_received(frame), Delivery::Dispatched(0));
    }

    #[cfg(feature = "state")]
    #[test]
    fn snapshot_restores_into_another_board() {
        let source = board();
        source
            .build_route(spi(), |root| {
                root.accumulate().placeholder();
            })
            .unwrap();
        let snapshot = source.snapshot();

        let target = board();
        let restored = target.restore(&snapshot).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(target.snapshot(), snapshot);
    }
}
