//! # Advertisement Rotation
//!
//! Perpetual task that republishes every broadcast slot in turn, on a fixed
//! period, regardless of when the slots were last updated.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use super::payload::MAX_ADVERTISEMENT_SIZE;
use super::slots::BroadcastSlots;
use crate::error::{BeaconError, Result};

/// Default delay between two slots
pub const DEFAULT_SLOT_INTERVAL: Duration = Duration::from_millis(100);

/// Number of frames between status log messages
const LOG_INTERVAL_FRAMES: u64 = 600;

/// Connectionless, unacknowledged frame sink
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BroadcastTransport: Send {
    /// Push one advertisement frame
    async fn advertise(&mut self, frame: &[u8]) -> Result<()>;
}

/// Rotation events, delivered to an observer supplied at construction
pub trait BroadcastObserver: Send + Sync {
    fn advertising_started(&self, _num_slots: usize) {}

    fn frame_published(&self, _slot: usize, _frame: &[u8]) {}

    fn publish_failed(&self, _slot: usize, _error: &BeaconError) {}

    fn advertising_stopped(&self) {}
}

/// Observer that reports events through `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver {
    published: AtomicU64,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl BroadcastObserver for TracingObserver {
    fn advertising_started(&self, num_slots: usize) {
        info!("Advertising started, rotating {} slots", num_slots);
    }

    fn frame_published(&self, slot: usize, frame: &[u8]) {
        let count = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Slot {} published ({} bytes)", slot, frame.len());
        if count % LOG_INTERVAL_FRAMES == 0 {
            info!("Published {} advertisement frames", count);
        }
    }

    fn publish_failed(&self, slot: usize, error: &BeaconError) {
        warn!("Failed to publish slot {}: {}", slot, error);
    }

    fn advertising_stopped(&self) {
        info!("Advertising stopped after {} frames", self.published());
    }
}

/// UDP broadcast stand-in for the radio advertisement channel
#[derive(Debug)]
pub struct UdpBroadcaster {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpBroadcaster {
    /// Bind an ephemeral socket that sends to `target`
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the socket cannot be set up
    pub async fn bind(target: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| BeaconError::CollaboratorUnavailable(format!("broadcast socket: {}", e)))?;
        socket
            .set_broadcast(true)
            .map_err(|e| BeaconError::CollaboratorUnavailable(format!("broadcast socket: {}", e)))?;

        info!("Broadcasting advertisements to {}", target);
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl BroadcastTransport for UdpBroadcaster {
    async fn advertise(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > MAX_ADVERTISEMENT_SIZE {
            return Err(BeaconError::PayloadTooLarge {
                size: frame.len(),
                max: MAX_ADVERTISEMENT_SIZE,
            });
        }
        self.socket
            .send_to(frame, self.target)
            .await
            .map_err(|e| BeaconError::Transport(format!("Failed to send advertisement: {}", e)))?;
        Ok(())
    }
}

/// Cycles through all slots forever
pub struct Rotator<T: BroadcastTransport> {
    slots: Arc<BroadcastSlots>,
    transport: T,
    observer: Arc<dyn BroadcastObserver>,
    interval: Duration,
}

impl<T: BroadcastTransport> Rotator<T> {
    pub fn new(
        slots: Arc<BroadcastSlots>,
        transport: T,
        observer: Arc<dyn BroadcastObserver>,
        interval: Duration,
    ) -> Self {
        Self {
            slots,
            transport,
            observer,
            interval,
        }
    }

    /// Publish every slot once, waiting the slot interval after each
    ///
    /// Transport failures are reported to the observer and do not stop
    /// the rotation.
    pub async fn rotate_once(&mut self) -> Result<()> {
        if self.slots.is_empty() {
            sleep(self.interval).await;
            return Ok(());
        }

        for slot in 0..self.slots.len() {
            let frame = self.slots.snapshot(slot)?;
            match self.transport.advertise(&frame).await {
                Ok(()) => self.observer.frame_published(slot, &frame),
                Err(e) => self.observer.publish_failed(slot, &e),
            }
            sleep(self.interval).await;
        }
        Ok(())
    }

    /// Rotate until cancelled
    pub async fn run(mut self) -> Result<()> {
        self.observer.advertising_started(self.slots.len());
        loop {
            self.rotate_once().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::payload::{FRAME_SIZE, HEADER_SIZE, PAYLOAD_SIZE};
    use mockall::Sequence;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        published: Mutex<Vec<usize>>,
        failed: Mutex<Vec<usize>>,
    }

    impl BroadcastObserver for RecordingObserver {
        fn frame_published(&self, slot: usize, _frame: &[u8]) {
            self.published.lock().unwrap().push(slot);
        }

        fn publish_failed(&self, slot: usize, _error: &BeaconError) {
            self.failed.lock().unwrap().push(slot);
        }
    }

    fn slots() -> Arc<BroadcastSlots> {
        let slots = Arc::new(BroadcastSlots::new(2, 0x0606));
        slots.store(0, &[0x10; PAYLOAD_SIZE]).unwrap();
        slots.store(1, &[0x11; PAYLOAD_SIZE]).unwrap();
        slots
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotate_once_publishes_slots_in_order() {
        let mut transport = MockBroadcastTransport::new();
        let mut seq = Sequence::new();
        for fill in [0x10u8, 0x11] {
            transport
                .expect_advertise()
                .withf(move |frame| frame.len() == FRAME_SIZE && frame[HEADER_SIZE] == fill)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let observer = Arc::new(RecordingObserver::default());
        let mut rotator = Rotator::new(slots(), transport, observer.clone(), DEFAULT_SLOT_INTERVAL);

        let started = tokio::time::Instant::now();
        rotator.rotate_once().await.unwrap();

        assert_eq!(*observer.published.lock().unwrap(), vec![0, 1]);
        assert_eq!(started.elapsed(), DEFAULT_SLOT_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_continues_after_failure() {
        let mut transport = MockBroadcastTransport::new();
        transport
            .expect_advertise()
            .times(4)
            .returning(|frame| {
                if frame[HEADER_SIZE] == 0x10 {
                    Err(BeaconError::Transport("radio busy".into()))
                } else {
                    Ok(())
                }
            });

        let observer = Arc::new(RecordingObserver::default());
        let mut rotator = Rotator::new(slots(), transport, observer.clone(), DEFAULT_SLOT_INTERVAL);

        rotator.rotate_once().await.unwrap();
        rotator.rotate_once().await.unwrap();

        assert_eq!(*observer.failed.lock().unwrap(), vec![0, 0]);
        assert_eq!(*observer.published.lock().unwrap(), vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_sees_slot_updates() {
        let shared = slots();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut transport = MockBroadcastTransport::new();
        let sink = sent.clone();
        transport.expect_advertise().returning(move |frame| {
            sink.lock().unwrap().push(frame[HEADER_SIZE]);
            Ok(())
        });

        let mut rotator = Rotator::new(
            shared.clone(),
            transport,
            Arc::new(TracingObserver::new()),
            DEFAULT_SLOT_INTERVAL,
        );

        rotator.rotate_once().await.unwrap();
        shared.store(0, &[0x20; PAYLOAD_SIZE]).unwrap();
        rotator.rotate_once().await.unwrap();

        assert_eq!(*sent.lock().unwrap(), vec![0x10, 0x11, 0x20, 0x11]);
    }

    #[tokio::test]
    async fn test_udp_broadcaster_sends_frame() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();

        let mut broadcaster = UdpBroadcaster::bind(target).await.unwrap();
        assert_eq!(broadcaster.target(), target);

        let frame = slots().snapshot(1).unwrap();
        tokio_test::assert_ok!(broadcaster.advertise(&frame).await);

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &frame);
    }

    #[tokio::test]
    async fn test_udp_broadcaster_rejects_oversized_frame() {
        let mut broadcaster = UdpBroadcaster::bind("127.0.0.1:9".parse().unwrap()).await.unwrap();
        assert!(matches!(
            broadcaster.advertise(&[0u8; 32]).await,
            Err(BeaconError::PayloadTooLarge { size: 32, max: 31 })
        ));
    }

    #[test]
    fn test_tracing_observer_counts() {
        let observer = TracingObserver::new();
        observer.frame_published(0, &[0u8; FRAME_SIZE]);
        observer.frame_published(1, &[0u8; FRAME_SIZE]);
        assert_eq!(observer.published(), 2);
    }
}
