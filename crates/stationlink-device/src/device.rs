use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use stationlink_frame::{Frame, FrameAssembler, RoutingKey};
use stationlink_protocol::command::{self, SERIAL_EXTRA_REPLY, SERIAL_MAIN_REPLY};
use stationlink_protocol::parse::parse_serial;
use stationlink_protocol::{Command, Product, SerialInfo, Snapshot};
use stationlink_transport::{Link, LinkEvent, ReconnectingTransport, TransportConfig};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::DeviceConfig;
use crate::correlator::Correlator;
use crate::discovery::{Discovery, Observation};
use crate::error::{DeviceError, Result};
use crate::liveness::Liveness;
use crate::secondary::SecondaryDevice;
use crate::telemetry::{Routed, Telemetry};

/// Link-loss notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Disconnect {
    /// Affected pack, or `None` for every pack.
    pub pack: Option<u8>,
}

impl Disconnect {
    pub const ALL: Self = Self { pack: None };

    pub const fn pack(pack: u8) -> Self {
        Self { pack: Some(pack) }
    }

    pub fn affects(&self, pack: u8) -> bool {
        self.pack.is_none_or(|p| p == pack)
    }
}

/// A decoded frame and what telemetry routing made of it.
#[derive(Debug, Clone)]
pub struct Update {
    pub frame: Frame,
    pub routed: Routed,
}

/// Last snapshot of each table-backed channel, for support dumps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pd: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ems: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverter: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mppt: Option<Snapshot>,
    /// Per-pack battery statistics by pack index.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bms: BTreeMap<u8, Snapshot>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.pd.is_none()
            && self.ems.is_none()
            && self.inverter.is_none()
            && self.mppt.is_none()
            && self.bms.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

pub(crate) struct Shared {
    pub(crate) config: DeviceConfig,
    link: Arc<dyn Link>,
    correlator: Correlator,
    telemetry: Telemetry,
    discovery: Discovery,
    frames: broadcast::Sender<Frame>,
    updates: broadcast::Sender<Update>,
    disconnected: broadcast::Sender<Disconnect>,
    diagnostics: Mutex<Diagnostics>,
    closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeviceError::Closed);
        }
        Ok(())
    }

    pub(crate) async fn send(&self, command: &Command) -> Result<()> {
        self.ensure_open()?;
        let wire = command.encode(self.config.variant)?;
        trace!(key = %command.key, len = command.payload.len(), "sending command");
        self.link.write(wire).await?;
        Ok(())
    }

    pub(crate) async fn request(
        &self,
        command: &Command,
        replies: &[RoutingKey],
    ) -> Result<Frame> {
        self.ensure_open()?;
        let wire = command.encode(self.config.variant)?;
        trace!(key = %command.key, "sending request");
        self.correlator
            .request(replies, self.config.request_timeout, async {
                self.link.write(wire).await.map_err(DeviceError::from)
            })
            .await
    }

    fn handle_frame(self: &Arc<Self>, frame: Frame) {
        trace!(key = %frame.key, len = frame.payload.len(), "frame");
        self.correlator.dispatch(&frame);

        let routed = self.telemetry.route(&frame);
        match &routed {
            Routed::Pd(snapshot) => self.pd_updated(snapshot),
            Routed::Ems(snapshot) => self.diagnostics.lock().ems = Some((**snapshot).clone()),
            Routed::Inverter(snapshot) => {
                self.diagnostics.lock().inverter = Some((**snapshot).clone())
            }
            Routed::Mppt(snapshot) => self.diagnostics.lock().mppt = Some((**snapshot).clone()),
            Routed::Bms { pack, snapshot } => {
                self.diagnostics
                    .lock()
                    .bms
                    .insert(*pack, (**snapshot).clone());
                if *pack != 0 && self.discovery.is_enabled() {
                    self.pack_observed(*pack, Arc::clone(snapshot));
                }
            }
            Routed::Setting { .. } | Routed::Ignored => {}
        }

        let _ = self.updates.send(Update {
            frame: frame.clone(),
            routed,
        });
        let _ = self.frames.send(frame);
    }

    fn pd_updated(&self, snapshot: &Snapshot) {
        self.diagnostics.lock().pd = Some(snapshot.clone());

        let model = snapshot.u64("model");
        if self.discovery.has_secondaries()
            && self.config.product.has_extra_battery(model) == Some(false)
        {
            info!(?model, "model reports no extra battery, detaching");
            self.discovery.clear();
            let _ = self.disconnected.send(Disconnect::pack(1));
        }
    }

    fn pack_observed(self: &Arc<Self>, pack: u8, snapshot: Arc<Snapshot>) {
        match self.discovery.observe(pack, snapshot) {
            Observation::Resolve { epoch } => {
                debug!(pack, "unknown extra battery, resolving serial");
                tokio::spawn(resolve_pack(Arc::clone(self), pack, epoch));
            }
            Observation::Joined => trace!(pack, "resolution already in flight"),
            Observation::Delivered => {}
        }
    }

    /// Tear down per-connection state. `notify` broadcasts a disconnect for
    /// every pack.
    fn link_lost(&self, reason: &'static str, notify: bool) {
        *self.diagnostics.lock() = Diagnostics::default();
        let detached = self.discovery.clear();
        if notify || !detached.is_empty() {
            info!(reason, detached = detached.len(), "link lost");
        }
        if notify {
            let _ = self.disconnected.send(Disconnect::ALL);
        }
    }
}

async fn resolve_pack(shared: Arc<Shared>, pack: u8, epoch: u64) {
    let _turn = shared.discovery.turn().await;

    let resolved = match shared
        .request(&command::get_serial_extra(), &[SERIAL_EXTRA_REPLY])
        .await
    {
        Ok(frame) => parse_serial(&frame.payload).map_err(DeviceError::from),
        Err(err) => Err(err),
    };

    match resolved {
        Ok(info) => {
            shared.discovery.complete(pack, epoch, info.serial, &shared);
        }
        Err(err) => {
            warn!(pack, %err, "extra battery serial query failed");
            shared.discovery.abandon(pack, epoch);
        }
    }
}

async fn run_pipeline(shared: Arc<Shared>, mut events: mpsc::Receiver<LinkEvent>) {
    let mut assembler = FrameAssembler::new(shared.config.variant);
    let mut liveness = Liveness::new(shared.config.liveness_deadline());
    // Frames seen since the last link loss.
    let mut online = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(LinkEvent::Connected) => {
                    debug!(serial = %shared.config.serial, "session started");
                }
                Some(LinkEvent::Data(chunk)) => {
                    assembler.push(&chunk);
                    while let Some(frame) = assembler.next_frame() {
                        liveness.rearm();
                        online = true;
                        shared.handle_frame(frame);
                    }
                }
                Some(LinkEvent::SessionEnded) => {
                    assembler.reset();
                    liveness.disarm();
                    shared.link_lost("session ended", online);
                    online = false;
                }
                None => {
                    liveness.disarm();
                    shared.link_lost("link closed", true);
                    break;
                }
            },
            _ = liveness.expired() => {
                warn!(
                    serial = %shared.config.serial,
                    after = ?liveness.deadline(),
                    "telemetry silent, reconnecting"
                );
                shared.link_lost("telemetry silent", online);
                online = false;
                shared.link.reconnect();
            }
        }
    }

    debug!(serial = %shared.config.serial, "pipeline stopped");
}

/// A power station reached over one link.
///
/// Owns the pipeline task that turns link events into frames and fans them
/// out to the correlator, the telemetry channels, the liveness timer and
/// extra battery discovery, strictly in arrival order.
pub struct MainDevice {
    shared: Arc<Shared>,
    pipeline: Mutex<Option<JoinHandle<()>>>,
}

impl MainDevice {
    /// Connect over TCP. Must be called inside a tokio runtime.
    pub fn connect(config: DeviceConfig, transport: TransportConfig) -> Self {
        info!(host = %transport.host, product = %config.product, "connecting");
        let (link, events) = ReconnectingTransport::spawn(transport);
        Self::with_link(Arc::new(link), events, config)
    }

    /// Run over an existing link. Must be called inside a tokio runtime.
    pub fn with_link(
        link: Arc<dyn Link>,
        events: mpsc::Receiver<LinkEvent>,
        config: DeviceConfig,
    ) -> Self {
        let capacity = config.channel_capacity;
        let freshness = config.silence_window;
        let (frames, _) = broadcast::channel(capacity.max(1));
        let (updates, _) = broadcast::channel(capacity.max(1));
        let (disconnected, _) = broadcast::channel(capacity.max(1));

        let shared = Arc::new(Shared {
            telemetry: Telemetry::new(config.product, capacity, freshness),
            discovery: Discovery::new(config.product, capacity, freshness),
            config,
            link,
            correlator: Correlator::new(),
            frames,
            updates,
            disconnected,
            diagnostics: Mutex::new(Diagnostics::default()),
            closed: AtomicBool::new(false),
        });

        let pipeline = tokio::spawn(run_pipeline(Arc::clone(&shared), events));

        Self {
            shared,
            pipeline: Mutex::new(Some(pipeline)),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.shared.config
    }

    pub fn product(&self) -> Product {
        self.shared.config.product
    }

    pub fn serial(&self) -> &str {
        &self.shared.config.serial
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.shared.telemetry
    }

    /// Write a command without waiting for a reply.
    pub async fn send(&self, command: &Command) -> Result<()> {
        self.shared.send(command).await
    }

    /// Send a command and wait for the first frame on the same routing key.
    pub async fn request(&self, command: &Command) -> Result<Frame> {
        self.shared.request(command, &[command.key]).await
    }

    /// Send a command and wait for the first frame on any of `replies`.
    pub async fn request_with(
        &self,
        command: &Command,
        replies: &[RoutingKey],
    ) -> Result<Frame> {
        self.shared.request(command, replies).await
    }

    /// Identity of the main unit.
    pub async fn query_serial(&self) -> Result<SerialInfo> {
        let frame = self
            .shared
            .request(&command::get_serial_main(), &SERIAL_MAIN_REPLY)
            .await?;
        Ok(parse_serial(&frame.payload)?)
    }

    /// Every decoded frame, after it has been routed.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<Frame> {
        self.shared.frames.subscribe()
    }

    /// Every decoded frame with the snapshot it was parsed into.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Update> {
        self.shared.updates.subscribe()
    }

    pub fn subscribe_disconnect(&self) -> broadcast::Receiver<Disconnect> {
        self.shared.disconnected.subscribe()
    }

    /// Extra batteries registered for the first time.
    pub fn subscribe_added(&self) -> broadcast::Receiver<Arc<SecondaryDevice>> {
        self.shared.discovery.subscribe_added()
    }

    /// Extra batteries currently attached, by pack index.
    pub fn secondaries(&self) -> Vec<(u8, Arc<SecondaryDevice>)> {
        self.shared.discovery.secondaries()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.shared.diagnostics.lock().clone()
    }

    /// Close the link and stop the pipeline. Outstanding requests fail with
    /// [`DeviceError::Closed`]. Idempotent.
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.link.close().await;

        let pipeline = self.pipeline.lock().take();
        if let Some(pipeline) = pipeline {
            let _ = pipeline.await;
        }
        self.shared.correlator.cancel_all();
    }
}

impl Drop for MainDevice {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.lock().take() {
            pipeline.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use stationlink_frame::{decode_frame, encode, HeaderVariant};
    use stationlink_protocol::FieldValue;
    use stationlink_transport::{TransportError, TransportState};

    use super::*;

    struct MockLink {
        events: Mutex<Option<mpsc::Sender<LinkEvent>>>,
        written: mpsc::UnboundedSender<Bytes>,
        reconnects: AtomicUsize,
    }

    #[async_trait]
    impl Link for MockLink {
        async fn write(&self, data: Bytes) -> stationlink_transport::Result<()> {
            self.written.send(data).map_err(|_| TransportError::Closed)
        }

        fn reconnect(&self) {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
        }

        async fn close(&self) {
            self.events.lock().take();
        }

        fn state(&self) -> TransportState {
            TransportState::Connected
        }
    }

    struct Harness {
        device: MainDevice,
        link: Arc<MockLink>,
        written: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
    }

    impl Harness {
        fn new(product: Product) -> Self {
            let (events_tx, events_rx) = mpsc::channel(64);
            let (written_tx, written) = mpsc::unbounded_channel();
            let link = Arc::new(MockLink {
                events: Mutex::new(Some(events_tx)),
                written: written_tx,
                reconnects: AtomicUsize::new(0),
            });
            let device = MainDevice::with_link(
                link.clone(),
                events_rx,
                DeviceConfig::new(product, "MAIN00123456"),
            );
            Self {
                device,
                link,
                written: tokio::sync::Mutex::new(written),
            }
        }

        async fn push(&self, event: LinkEvent) {
            let tx = self.link.events.lock().clone().expect("link open");
            tx.send(event).await.expect("pipeline running");
        }

        /// Deliver `frames` in one chunk and wait until all are routed.
        async fn deliver(&self, frames: &[((u8, u8, u8), Vec<u8>)]) {
            let mut routed = self.device.subscribe_frames();
            let mut chunk = Vec::new();
            for (key, payload) in frames {
                let wire = encode(HeaderVariant::V2, (*key).into(), payload).unwrap();
                chunk.extend_from_slice(&wire);
            }
            self.push(LinkEvent::Data(Bytes::from(chunk))).await;
            for _ in frames {
                routed.recv().await.expect("frame routed");
            }
        }

        async fn next_written(&self) -> Frame {
            let wire = self.written.lock().await.recv().await.expect("command written");
            decode_frame(&wire).expect("valid command frame")
        }

        fn nothing_written(&self) -> bool {
            self.written
                .try_lock()
                .map(|mut rx| rx.try_recv().is_err())
                .unwrap_or(false)
        }

        fn reconnects(&self) -> usize {
            self.link.reconnects.load(Ordering::SeqCst)
        }

        /// Run discovery for pack 1 up to the registered device.
        async fn discover(&self, serial: &str) -> Arc<SecondaryDevice> {
            let mut added = self.device.subscribe_added();
            self.deliver(&[((6, 32, 2), extra_bms(90))]).await;
            let query = self.next_written().await;
            assert_eq!(query.key, SERIAL_EXTRA_REPLY);
            self.deliver(&[((6, 1, 65), serial_payload(serial))]).await;
            added.recv().await.expect("device added")
        }
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    async fn until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !cond() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition reached");
    }

    fn key(t: (u8, u8, u8)) -> RoutingKey {
        t.into()
    }

    fn river_pd(model: u8, level: u8) -> Vec<u8> {
        let mut p = vec![model, 0, 0, 0, 0, 4, 3, 2, 1, level];
        p.extend_from_slice(&150u16.to_le_bytes());
        p
    }

    fn serial_payload(serial: &str) -> Vec<u8> {
        let mut p = vec![0, 0, 0, 0, 5, 0, 1, 2];
        let mut text = serial.as_bytes().to_vec();
        text.resize(15, 0);
        p.extend_from_slice(&text);
        p
    }

    fn extra_bms(level: u8) -> Vec<u8> {
        vec![0, 0, 0, 0, 1, 0, 0, 1, level]
    }

    #[tokio::test]
    async fn pd_frame_updates_snapshot_and_replays_to_late_subscriber() {
        let h = Harness::new(Product::RIVER);
        let mut early = h.device.telemetry().pd().subscribe();

        let wire = encode(HeaderVariant::V2, key((2, 32, 2)), &river_pd(1, 81)).unwrap();
        h.push(LinkEvent::Data(wire.slice(..7))).await;
        h.push(LinkEvent::Data(wire.slice(7..))).await;

        let snapshot = early.recv().await.unwrap();
        assert_eq!(snapshot.u64("battery_level"), Some(81));
        assert_eq!(snapshot.text("pd_version"), Some("1.2.3.4"));
        assert_eq!(snapshot.u64("out_power"), Some(150));

        let mut late = h.device.telemetry().pd().subscribe();
        assert_eq!(late.try_recv(), Some(snapshot));
        assert_eq!(
            h.device.diagnostics().pd.and_then(|s| s.u64("battery_level")),
            Some(81)
        );
    }

    #[tokio::test]
    async fn updates_carry_the_snapshot_of_their_frame() {
        let h = Harness::new(Product::RIVER);
        let mut updates = h.device.subscribe_updates();

        let frames = [((2, 32, 2), river_pd(1, 81)), ((2, 32, 2), river_pd(1, 40))];
        h.deliver(&frames).await;

        let first = updates.recv().await.unwrap();
        let Routed::Pd(snapshot) = &first.routed else {
            panic!("expected pd, got {:?}", first.routed);
        };
        assert_eq!(first.frame.key, key((2, 32, 2)));
        assert_eq!(snapshot.u64("battery_level"), Some(81));

        let second = updates.recv().await.unwrap();
        let Routed::Pd(snapshot) = &second.routed else {
            panic!("expected pd, got {:?}", second.routed);
        };
        assert_eq!(snapshot.u64("battery_level"), Some(40));
        assert_eq!(h.device.telemetry().pd().latest().as_ref(), Some(snapshot));
    }

    #[tokio::test]
    async fn garbage_between_frames_is_skipped() {
        let h = Harness::new(Product::DELTA_MAX);
        let mut routed = h.device.subscribe_frames();

        let mut chunk = vec![0x00, 0xaa, 0x13, 0x37, 0xff];
        chunk.extend_from_slice(&encode(HeaderVariant::V2, key((4, 32, 74)), &[1]).unwrap());
        h.push(LinkEvent::Data(Bytes::from(chunk))).await;

        assert_eq!(routed.recv().await.unwrap().key, key((4, 32, 74)));
        assert_eq!(h.device.telemetry().fan_auto().latest(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_triggers_disconnect_and_reconnect() {
        let h = Harness::new(Product::RIVER);
        let mut disconnected = h.device.subscribe_disconnect();
        h.deliver(&[((2, 32, 2), river_pd(1, 50))]).await;

        tokio::time::advance(Duration::from_secs(15)).await;
        settle().await;
        assert!(disconnected.try_recv().is_err());
        assert_eq!(h.reconnects(), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(disconnected.try_recv().unwrap(), Disconnect::ALL);
        assert_eq!(h.reconnects(), 1);
        assert!(h.device.diagnostics().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn frame_inside_window_suppresses_disconnect() {
        let h = Harness::new(Product::RIVER);
        let mut disconnected = h.device.subscribe_disconnect();
        h.deliver(&[((2, 32, 2), river_pd(1, 50))]).await;

        tokio::time::advance(Duration::from_secs(14)).await;
        h.deliver(&[((2, 32, 2), river_pd(1, 51))]).await;

        tokio::time::advance(Duration::from_secs(15)).await;
        settle().await;
        assert!(disconnected.try_recv().is_err());
        assert_eq!(h.reconnects(), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(disconnected.try_recv().unwrap(), Disconnect::ALL);
    }

    #[tokio::test]
    async fn session_end_notifies_immediately_without_reconnect() {
        let h = Harness::new(Product::DELTA_PRO);
        let mut disconnected = h.device.subscribe_disconnect();
        h.deliver(&[((3, 32, 2), vec![1, 2, 3])]).await;
        assert!(h.device.diagnostics().ems.is_some());

        h.push(LinkEvent::SessionEnded).await;
        assert_eq!(disconnected.recv().await.unwrap(), Disconnect::ALL);
        assert_eq!(h.reconnects(), 0);
        assert!(h.device.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn session_end_before_any_frame_is_quiet() {
        let h = Harness::new(Product::RIVER);
        let mut disconnected = h.device.subscribe_disconnect();
        h.push(LinkEvent::Connected).await;
        h.push(LinkEvent::SessionEnded).await;
        h.deliver(&[((4, 32, 74), vec![1])]).await;
        assert!(disconnected.try_recv().is_err());
    }

    #[tokio::test]
    async fn partial_frame_is_dropped_on_session_end() {
        let h = Harness::new(Product::RIVER);
        let stale = encode(HeaderVariant::V2, key((4, 32, 74)), &[1]).unwrap();
        h.push(LinkEvent::Data(stale.slice(..10))).await;
        h.push(LinkEvent::SessionEnded).await;

        h.deliver(&[((4, 32, 74), vec![3])]).await;
        assert_eq!(h.device.telemetry().fan_auto().latest(), Some(false));
    }

    #[tokio::test]
    async fn request_resolves_with_matching_reply() {
        let h = Harness::new(Product::DELTA_MAX);
        let cmd = command::get_fan_auto();
        let (reply, ()) = tokio::join!(h.device.request(&cmd), async {
            let sent = h.next_written().await;
            assert_eq!(sent.key, key((4, 32, 74)));
            h.deliver(&[((2, 32, 2), vec![0; 4]), ((4, 32, 74), vec![1])])
                .await;
        });

        let reply = reply.unwrap();
        assert_eq!(reply.key, key((4, 32, 74)));
        assert_eq!(&reply.payload[..], &[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn request_times_out() {
        let h = Harness::new(Product::RIVER);
        let result = h.device.request(&command::get_fan_auto()).await;
        assert!(matches!(result, Err(DeviceError::Timeout(t)) if t == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn query_serial_accepts_either_reply_module() {
        let h = Harness::new(Product::DELTA_PRO);
        let (info, ()) = tokio::join!(h.device.query_serial(), async {
            assert_eq!(h.next_written().await.key, key((2, 1, 65)));
            h.deliver(&[((11, 1, 65), serial_payload("DCABZ5ZE1234567"))])
                .await;
        });

        let info = info.unwrap();
        assert_eq!(info.serial, "DCABZ5ZE1234567");
        assert_eq!(info.model, 2);
    }

    #[tokio::test]
    async fn extra_battery_is_discovered_once() {
        let h = Harness::new(Product::RIVER);
        let mut added = h.device.subscribe_added();

        h.deliver(&[((6, 32, 2), extra_bms(90)), ((6, 32, 2), extra_bms(91))])
            .await;
        let query = h.next_written().await;
        assert_eq!(query.key, SERIAL_EXTRA_REPLY);
        settle().await;
        assert!(h.nothing_written(), "one serial query per pack");

        h.deliver(&[((6, 1, 65), serial_payload("R611ZEB4ZE123456"))])
            .await;
        let extra = added.recv().await.unwrap();
        assert_eq!(extra.serial(), "R611ZEB4ZE123456");
        assert_eq!(extra.name(), "RIVER Extra 123456");
        assert_eq!(extra.parent_serial().as_deref(), Some("MAIN00123456"));
        assert_eq!(
            extra.bms().latest().and_then(|s| s.u64("battery_level")),
            Some(91)
        );

        h.deliver(&[((6, 32, 2), extra_bms(92))]).await;
        assert_eq!(
            extra.bms().latest().and_then(|s| s.u64("battery_level")),
            Some(92)
        );
        assert!(h.nothing_written());
        assert!(added.try_recv().is_err());
        assert_eq!(h.device.secondaries().len(), 1);
        assert_eq!(h.device.telemetry().bms().latest(), None);
    }

    #[tokio::test]
    async fn failed_serial_reply_allows_retry() {
        let h = Harness::new(Product::RIVER);
        h.deliver(&[((6, 32, 2), extra_bms(90))]).await;
        h.next_written().await;
        h.deliver(&[((6, 1, 65), vec![0; 4])]).await;
        settle().await;

        h.deliver(&[((6, 32, 2), extra_bms(90))]).await;
        assert_eq!(h.next_written().await.key, SERIAL_EXTRA_REPLY);
    }

    #[tokio::test]
    async fn link_loss_detaches_and_rediscovery_reuses_device() {
        let h = Harness::new(Product::RIVER);
        let extra = h.discover("R611ZEB4ZE123456").await;
        let mut extra_disconnected = extra.subscribe_disconnect();
        let mut added = h.device.subscribe_added();

        h.push(LinkEvent::SessionEnded).await;
        assert_eq!(extra_disconnected.recv().await.unwrap(), Disconnect::ALL);
        assert!(!extra.is_attached());
        assert!(matches!(
            extra.send(&command::get_ems_extra()).await,
            Err(DeviceError::Detached { .. })
        ));
        assert!(h.device.secondaries().is_empty());

        h.deliver(&[((6, 32, 2), extra_bms(70))]).await;
        assert_eq!(h.next_written().await.key, SERIAL_EXTRA_REPLY);
        h.deliver(&[((6, 1, 65), serial_payload("R611ZEB4ZE123456"))])
            .await;
        until(|| extra.is_attached()).await;

        let secondaries = h.device.secondaries();
        assert_eq!(secondaries.len(), 1);
        assert!(Arc::ptr_eq(&secondaries[0].1, &extra));
        assert!(added.try_recv().is_err());
    }

    #[tokio::test]
    async fn secondary_commands_go_through_main_link() {
        let h = Harness::new(Product::RIVER);
        let extra = h.discover("R611ZEB4ZE123456").await;

        extra.send(&command::get_ems_extra()).await.unwrap();
        assert_eq!(h.next_written().await.key, command::get_ems_extra().key);
    }

    #[tokio::test]
    async fn model_without_extra_battery_detaches_pack_one() {
        let h = Harness::new(Product::RIVER);
        let extra = h.discover("R611ZEB4ZE123456").await;
        let mut disconnected = h.device.subscribe_disconnect();

        h.deliver(&[((2, 32, 2), river_pd(2, 60))]).await;
        assert!(extra.is_attached());
        assert!(disconnected.try_recv().is_err());

        h.deliver(&[((2, 32, 2), river_pd(1, 60))]).await;
        assert_eq!(disconnected.try_recv().unwrap(), Disconnect::pack(1));
        assert!(!extra.is_attached());
        assert!(h.device.secondaries().is_empty());
    }

    #[tokio::test]
    async fn non_river_products_do_not_discover() {
        let h = Harness::new(Product::DELTA_MAX);
        let mut bms = vec![1u8];
        bms.extend_from_slice(&[0; 8]);
        h.deliver(&[((3, 32, 50), bms)]).await;
        settle().await;
        assert!(h.nothing_written());
        assert!(h.device.diagnostics().bms.contains_key(&1));
    }

    #[tokio::test]
    async fn close_fails_pending_and_later_calls() {
        let h = Harness::new(Product::RIVER);
        let mut disconnected = h.device.subscribe_disconnect();

        let cmd = command::get_fan_auto();
        let (pending, ()) = tokio::join!(h.device.request(&cmd), async {
            h.next_written().await;
            h.device.close().await;
        });
        assert!(matches!(pending, Err(DeviceError::Closed)));
        assert_eq!(disconnected.try_recv().unwrap(), Disconnect::ALL);
        assert!(matches!(
            h.device.send(&command::get_pd()).await,
            Err(DeviceError::Closed)
        ));

        h.device.close().await;
    }

    #[test]
    fn disconnect_scope() {
        assert!(Disconnect::ALL.affects(3));
        assert!(Disconnect::pack(1).affects(1));
        assert!(!Disconnect::pack(1).affects(0));
    }

    #[test]
    fn diagnostics_json_omits_empty_sections() {
        let mut diagnostics = Diagnostics::default();
        assert!(diagnostics.is_empty());
        let pack = [("battery_level", FieldValue::Int(90))].into_iter().collect();
        diagnostics.bms.insert(1, pack);
        let json = diagnostics.to_json().unwrap();
        assert!(json.get("pd").is_none());
        assert_eq!(json["bms"]["1"]["battery_level"], 90);
    }
}
