//! Session coordination state machine.
//!
//! One coordinator drives one [`Session`]. Channel events, sensor reports,
//! user actions and telemetry ticks all funnel into a single processing
//! point ([`SessionCoordinator::run`], or the individual `handle_*` calls),
//! so at most one transition happens per event. The launch latch, not event
//! order, guarantees a single call start.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::latch::Latch;
use super::types::{
    CallInvitation, Capabilities, Notice, Session, SessionState, SessionType, UserAction,
};
use crate::channel::{
    room_available_event, ChannelError, ChannelMessage, EventChannel, InboundEvent, ListenerId,
    OutboundEvent, INCOMING_CALL, PRESENCE_CONFIRMED,
};
use crate::config::Config;
use crate::core::{
    format_elapsed, HeartRateEstimator, SessionTimer, TelemetryFrame, WaveformBuffer,
};
use crate::sensor::{Sample, SampleBatch, SensorError, SensorGateway, SensorStatus};
use crate::stats::SharedSessionStats;

const MIN_TELEMETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Tunables taken from the configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub name_filter: String,
    pub telemetry_interval: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            name_filter: "Movesense".to_string(),
            telemetry_interval: Duration::from_secs(1),
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            name_filter: config.sensor.name_filter.clone(),
            telemetry_interval: config.telemetry_interval,
        }
    }
}

/// Changes pushed to a screen watching the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    State(SessionState),
    Notice(Notice),
    Sensor(SensorStatus),
    Vitals {
        heart_rate: Option<u32>,
        elapsed: String,
    },
}

#[derive(Debug)]
enum SensorReport {
    Status(SensorStatus),
    Batch(SampleBatch),
}

enum Step {
    Action(UserAction),
    Message(ChannelMessage),
    Report(SensorReport),
    Telemetry,
}

/// Drives one session from entry to teardown.
///
/// Call [`leave`](Self::leave) or [`teardown`](Self::teardown) before
/// dropping the coordinator ([`run`](Self::run) only returns after leaving). Dropping
/// it early only cancels sensor work: listeners stay registered until the
/// channel prunes them, and the tone and video call are left as they are.
pub struct SessionCoordinator {
    session: Session,
    channel: Arc<dyn EventChannel>,
    capabilities: Capabilities,
    settings: CoordinatorSettings,
    stats: SharedSessionStats,

    state: SessionState,
    launch: Latch,
    call_launched: bool,
    tone_playing: bool,
    listeners: Vec<ListenerId>,
    entered: bool,
    torn_down: bool,

    inbound_tx: mpsc::UnboundedSender<ChannelMessage>,
    inbound_rx: mpsc::UnboundedReceiver<ChannelMessage>,
    reports_tx: mpsc::UnboundedSender<SensorReport>,
    reports_rx: mpsc::UnboundedReceiver<SensorReport>,
    /// Cancelled on teardown; in-flight sensor work checks it before acting.
    liveness: CancellationToken,
    sensor_task: Option<JoinHandle<()>>,

    timer: SessionTimer,
    waveform: WaveformBuffer,
    heart_rate: HeartRateEstimator,
    sensor_status: SensorStatus,
    /// Samples not yet sent in a telemetry frame.
    pending_samples: Vec<Sample>,
    notices: Vec<Notice>,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
}

impl SessionCoordinator {
    pub fn new(
        session: Session,
        channel: Arc<dyn EventChannel>,
        capabilities: Capabilities,
        settings: CoordinatorSettings,
        stats: SharedSessionStats,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let sensor_status = if session.session_type.uses_sensor() {
            SensorStatus::Idle
        } else {
            SensorStatus::NotApplicable
        };

        Self {
            state: SessionState::initial(session.session_type),
            session,
            channel,
            capabilities,
            settings,
            stats,
            launch: Latch::new(),
            call_launched: false,
            tone_playing: false,
            listeners: Vec::new(),
            entered: false,
            torn_down: false,
            inbound_tx,
            inbound_rx,
            reports_tx,
            reports_rx,
            liveness: CancellationToken::new(),
            sensor_task: None,
            timer: SessionTimer::new(),
            waveform: WaveformBuffer::new(),
            heart_rate: HeartRateEstimator::new(),
            sensor_status,
            pending_samples: Vec::new(),
            notices: Vec::new(),
            updates: None,
        }
    }

    /// Receive state changes, notices and vitals as they happen.
    pub fn watch(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.updates = Some(tx);
        rx
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn heart_rate(&self) -> Option<u32> {
        self.heart_rate.estimate()
    }

    pub fn waveform(&self) -> &WaveformBuffer {
        &self.waveform
    }

    pub fn elapsed(&self) -> u64 {
        self.timer.elapsed()
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.timer.elapsed())
    }

    pub fn sensor_status(&self) -> &SensorStatus {
        &self.sensor_status
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Channel listeners currently registered for this session.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Register the session's listeners and announce the patient.
    ///
    /// On failure the session stays in its waiting state and a notice is
    /// raised; the only way out is to leave.
    pub async fn enter(&mut self) -> Result<(), ChannelError> {
        if self.entered || self.torn_down {
            return Ok(());
        }
        self.entered = true;

        tracing::info!(
            "Entering {} session {} for patient {}",
            self.session.session_type,
            self.session.id,
            self.session.patient_id
        );
        let result = match self.session.session_type {
            SessionType::Consultation => self.enter_consultation().await,
            _ => self.enter_activity().await,
        };

        if let Err(e) = &result {
            tracing::warn!("Session remains {}: {e}", self.state.label());
            self.notify(Notice::ChannelUnreachable(e.to_string()));
        }
        result
    }

    async fn enter_activity(&mut self) -> Result<(), ChannelError> {
        if let Some(activity_id) = self.session.activity_id().map(str::to_string) {
            self.listen(&room_available_event(&activity_id)).await?;
        }
        self.channel
            .send(&OutboundEvent::JoinActivityRoom {
                group_id: self.session.group_id.clone(),
                patient_id: self.session.patient_id.clone(),
            })
            .await
    }

    async fn enter_consultation(&mut self) -> Result<(), ChannelError> {
        self.listen(PRESENCE_CONFIRMED).await?;
        self.listen(INCOMING_CALL).await?;

        let room = self.consultation_room();
        self.channel
            .send(&OutboundEvent::JoinRoom { room: room.clone() })
            .await?;
        self.channel
            .send(&OutboundEvent::ConfirmArrival { room })
            .await
    }

    async fn listen(&mut self, event: &str) -> Result<(), ChannelError> {
        let id = self.channel.listen(event, self.inbound_tx.clone()).await?;
        tracing::debug!("Listening for '{event}' ({id})");
        self.listeners.push(id);
        Ok(())
    }

    fn consultation_room(&self) -> String {
        self.session
            .room_id
            .clone()
            .unwrap_or_else(|| super::types::consultation_room(&self.session.patient_id))
    }

    /// Drive the session until the user leaves (or the action sender is
    /// dropped, which counts as leaving).
    pub async fn run(&mut self, mut actions: mpsc::Receiver<UserAction>) {
        // A channel failure is already surfaced as a notice.
        let _ = self.enter().await;

        let period = self.settings.telemetry_interval.max(MIN_TELEMETRY_INTERVAL);
        let mut telemetry = tokio::time::interval(period);
        telemetry.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.state.is_ended() {
            let step = tokio::select! {
                action = actions.recv() => Step::Action(action.unwrap_or(UserAction::Leave)),
                Some(message) = self.inbound_rx.recv() => Step::Message(message),
                Some(report) = self.reports_rx.recv() => Step::Report(report),
                _ = telemetry.tick() => Step::Telemetry,
            };

            match step {
                Step::Action(action) => self.handle_action(action).await,
                Step::Message(message) => self.handle_message(message).await,
                Step::Report(report) => self.handle_report(report),
                Step::Telemetry => self.flush_telemetry().await,
            }
        }
    }

    /// Handle everything already queued, without waiting.
    pub async fn process_pending(&mut self) {
        while let Ok(report) = self.reports_rx.try_recv() {
            self.handle_report(report);
        }
        while let Ok(message) = self.inbound_rx.try_recv() {
            self.handle_message(message).await;
        }
    }

    pub async fn handle_message(&mut self, message: ChannelMessage) {
        if self.torn_down {
            return;
        }
        self.stats.record_event();

        let Some(event) = InboundEvent::parse(&message) else {
            tracing::debug!("Ignoring event '{}'", message.event);
            return;
        };
        match event {
            InboundEvent::RoomAvailable { activity_id, room } => {
                self.on_room_available(&activity_id, room).await
            }
            InboundEvent::PresenceConfirmed => self.on_presence_confirmed().await,
            InboundEvent::IncomingCall(invitation) => self.on_incoming_call(invitation).await,
        }
    }

    pub async fn handle_action(&mut self, action: UserAction) {
        match action {
            UserAction::Accept => self.accept_call().await,
            UserAction::Reject => self.reject_call().await,
            UserAction::Leave => self.leave().await,
        }
    }

    async fn on_room_available(&mut self, activity_id: &str, room: String) {
        if self.session.activity_id() != Some(activity_id) {
            tracing::debug!("Room announcement for another activity ({activity_id})");
            return;
        }
        if self.state != SessionState::AwaitingRoom || !self.launch.trigger() {
            tracing::debug!("Session already active, ignoring room {room}");
            return;
        }

        tracing::info!("Room {room} available");
        self.session.room_id = Some(room.clone());
        self.transition(SessionState::Active { room: room.clone() });
        self.timer.start();
        if self.session.session_type.uses_sensor() {
            self.start_sensor();
        }
        self.start_call(&room).await;
    }

    async fn on_presence_confirmed(&mut self) {
        if !matches!(
            self.state,
            SessionState::AwaitingProfessional | SessionState::RingingIncoming(_)
        ) {
            tracing::debug!("Presence confirmation while {}", self.state.label());
            return;
        }

        tracing::info!("Professional joined the waiting room");
        let room = self.consultation_room();
        self.launch_visio(room).await;
    }

    async fn on_incoming_call(&mut self, invitation: CallInvitation) {
        if invitation.target_patient_id != self.session.patient_id {
            tracing::debug!("Incoming call for another patient");
            return;
        }
        if !matches!(
            self.state,
            SessionState::AwaitingProfessional | SessionState::RingingIncoming(_)
        ) {
            tracing::debug!("Incoming call ignored while {}", self.state.label());
            return;
        }

        tracing::info!("Incoming call for room {}", invitation.room);
        self.stats.record_ring();
        self.transition(SessionState::RingingIncoming(invitation));
        self.play_tone().await;
    }

    async fn accept_call(&mut self) {
        let SessionState::RingingIncoming(invitation) = &self.state else {
            tracing::debug!("No incoming call to accept");
            return;
        };
        let invitation = invitation.clone();

        self.respond(&invitation, true).await;
        self.launch_visio(invitation.room).await;
    }

    async fn reject_call(&mut self) {
        let SessionState::RingingIncoming(invitation) = &self.state else {
            tracing::debug!("No incoming call to reject");
            return;
        };
        let invitation = invitation.clone();

        self.stop_tone().await;
        self.respond(&invitation, false).await;
        tracing::info!("Incoming call declined");
        self.transition(SessionState::AwaitingProfessional);
        self.notify(Notice::CallDeclined);
    }

    async fn respond(&self, invitation: &CallInvitation, accepted: bool) {
        let response = OutboundEvent::CallResponse {
            room: invitation.room.clone(),
            patient_id: self.session.patient_id.clone(),
            accepted,
        };
        if let Err(e) = self.channel.send(&response).await {
            tracing::warn!("Call response not delivered: {e}");
        }
    }

    /// Move to `VisioActive` and start the call, at most once per session.
    async fn launch_visio(&mut self, room: String) {
        if !self.launch.trigger() {
            tracing::debug!("Call already launched, ignoring launch for {room}");
            return;
        }

        self.stop_tone().await;
        self.transition(SessionState::VisioActive { room: room.clone() });
        self.start_call(&room).await;
    }

    async fn start_call(&mut self, room: &str) {
        let Some(video) = self.capabilities.video.clone() else {
            tracing::warn!("No video capability; continuing without a call");
            self.notify(Notice::VideoUnavailable);
            return;
        };

        // Set before the attempt so teardown always ends the call.
        self.call_launched = true;
        match video.start(room, &self.session.identity()).await {
            Ok(()) => {
                self.stats.record_call_started();
                tracing::info!("Video call started in {room}");
            }
            Err(e) => {
                tracing::warn!("{e}");
                self.notify(Notice::CallFailed(e.to_string()));
            }
        }
    }

    async fn play_tone(&mut self) {
        if self.tone_playing {
            return;
        }
        let Some(tone) = self.capabilities.tone.clone() else {
            tracing::debug!("No ringtone capability");
            return;
        };

        self.tone_playing = true;
        if let Err(e) = tone.play_looped().await {
            tracing::warn!("{e}");
            self.notify(Notice::ToneFailed(e.to_string()));
        }
    }

    async fn stop_tone(&mut self) {
        if !self.tone_playing {
            return;
        }
        self.tone_playing = false;

        if let Some(tone) = self.capabilities.tone.clone() {
            if let Err(e) = tone.stop().await {
                tracing::warn!("Ringtone stop failed: {e}");
            }
        }
    }

    fn start_sensor(&mut self) {
        if self.sensor_task.is_some() {
            return;
        }
        let Some(provider) = self.capabilities.sensor.clone() else {
            tracing::warn!("No biosensor capability; session continues without telemetry");
            self.set_sensor_status(SensorStatus::Unavailable);
            return;
        };

        self.set_sensor_status(SensorStatus::Searching);
        let gateway = SensorGateway::new(
            provider,
            self.settings.name_filter.clone(),
            self.stats.clone(),
        );
        self.sensor_task = Some(tokio::spawn(run_sensor_chain(
            gateway,
            self.reports_tx.clone(),
            self.liveness.clone(),
        )));
    }

    fn handle_report(&mut self, report: SensorReport) {
        if self.torn_down {
            return;
        }

        match report {
            SensorReport::Status(status) => {
                tracing::info!("Sensor: {}", status.message());
                self.set_sensor_status(status);
            }
            SensorReport::Batch(batch) => {
                self.waveform.push(&batch);
                self.heart_rate.update(&batch);
                tracing::trace!(
                    "Batch of {} samples, estimate {:?}",
                    batch.len(),
                    self.heart_rate.estimate()
                );
                self.pending_samples.extend_from_slice(&batch.samples);
            }
        }
    }

    /// Send one telemetry frame carrying every sample received since the
    /// previous frame, if the exercise session is active and any arrived.
    pub async fn flush_telemetry(&mut self) {
        if !self.session.session_type.uses_sensor()
            || !matches!(self.state, SessionState::Active { .. })
            || self.pending_samples.is_empty()
        {
            return;
        }

        let heart_rate = self.heart_rate.estimate();
        let frame = TelemetryFrame::new(
            self.session.group_id.clone(),
            self.session.patient_id.clone(),
            std::mem::take(&mut self.pending_samples),
            heart_rate,
        );

        match self.channel.send(&OutboundEvent::Telemetry(frame)).await {
            Ok(()) => self.stats.record_frame_sent(),
            Err(e) => tracing::warn!("Telemetry frame not sent: {e}"),
        }
        self.publish(SessionUpdate::Vitals {
            heart_rate,
            elapsed: self.elapsed_display(),
        });
    }

    /// Leave the session screen.
    pub async fn leave(&mut self) {
        if self.torn_down {
            return;
        }
        self.teardown().await;
        self.notify(Notice::SessionFinished(self.session.session_type));
    }

    /// Release everything the session holds: listeners, ringtone, timer,
    /// sensor link and video call. Runs regardless of state; a second call
    /// does nothing. Failures are logged and swallowed.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.liveness.cancel();

        self.timer.stop();

        for id in std::mem::take(&mut self.listeners) {
            if let Err(e) = self.channel.unlisten(id).await {
                tracing::warn!("Failed to remove listener {id}: {e}");
            }
        }

        self.stop_tone().await;

        if let Some(task) = self.sensor_task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Sensor task ended abnormally: {e}");
            }
        }

        if self.call_launched {
            self.call_launched = false;
            if let Some(video) = self.capabilities.video.clone() {
                if let Err(e) = video.end().await {
                    tracing::warn!("Failed to end video call: {e}");
                }
            }
        }

        self.pending_samples.clear();
        self.transition(SessionState::Ended);
        tracing::info!(
            "Session {} ended after {}",
            self.session.id,
            self.elapsed_display()
        );
    }

    fn transition(&mut self, state: SessionState) {
        tracing::debug!("{} -> {}", self.state.label(), state.label());
        self.state = state.clone();
        self.publish(SessionUpdate::State(state));
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice.clone());
        self.publish(SessionUpdate::Notice(notice));
    }

    fn set_sensor_status(&mut self, status: SensorStatus) {
        self.sensor_status = status.clone();
        self.publish(SessionUpdate::Sensor(status));
    }

    fn publish(&self, update: SessionUpdate) {
        if let Some(updates) = &self.updates {
            let _ = updates.send(update);
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if !self.torn_down {
            tracing::warn!(
                "Session {} dropped without teardown; only the sensor link is released",
                self.session.id
            );
        }
        // The sensor task disconnects on its own once cancelled.
        self.liveness.cancel();
    }
}

/// Scan, connect and subscribe, then hold the link until the session ends.
async fn run_sensor_chain(
    mut gateway: SensorGateway,
    reports: mpsc::UnboundedSender<SensorReport>,
    liveness: CancellationToken,
) {
    if let Err(status) = establish(&mut gateway, &reports, &liveness).await {
        let _ = reports.send(SensorReport::Status(status));
    }

    liveness.cancelled().await;
    gateway.disconnect().await;
}

async fn establish(
    gateway: &mut SensorGateway,
    reports: &mpsc::UnboundedSender<SensorReport>,
    liveness: &CancellationToken,
) -> Result<(), SensorStatus> {
    // Abandoning the scan leaves it running; `disconnect` stops it.
    let scanned = tokio::select! {
        _ = liveness.cancelled() => return Ok(()),
        result = gateway.scan() => result,
    };
    if liveness.is_cancelled() {
        tracing::debug!("Session ended during scan, discarding result");
        return Ok(());
    }
    let device = scanned.map_err(|e| sensor_failure(&e))?;

    // Not abandoned: the radio may finish it anyway. The caller disconnects
    // whatever link it produced.
    let connected = gateway.connect(&device).await;
    if liveness.is_cancelled() {
        tracing::debug!("Session ended during connect, releasing link");
        return Ok(());
    }
    connected.map_err(|e| sensor_failure(&e))?;
    let _ = reports.send(SensorReport::Status(SensorStatus::Connected(
        device.display_name().to_string(),
    )));

    let batches = reports.clone();
    gateway
        .subscribe(move |batch| {
            let _ = batches.send(SensorReport::Batch(batch));
        })
        .await
        .map_err(|e| sensor_failure(&e))?;
    let _ = reports.send(SensorReport::Status(SensorStatus::Streaming));
    Ok(())
}

fn sensor_failure(error: &SensorError) -> SensorStatus {
    if error.is_capability_absent() {
        tracing::warn!("{error}; continuing without live telemetry");
        SensorStatus::Unavailable
    } else {
        tracing::warn!("{error}");
        SensorStatus::Failed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalEventHub;
    use crate::sensor::SimulatedBiosensor;
    use crate::stats::create_shared_stats;
    use serde_json::json;

    fn coordinator(
        session: Session,
        hub: &Arc<LocalEventHub>,
        caps: Capabilities,
    ) -> SessionCoordinator {
        SessionCoordinator::new(
            session,
            hub.clone(),
            caps,
            CoordinatorSettings::default(),
            create_shared_stats(),
        )
    }

    #[tokio::test]
    async fn test_group_entry_announces_patient() {
        let hub = Arc::new(LocalEventHub::new());
        let mut coord = coordinator(Session::group("p-1", "g-5"), &hub, Capabilities::none());
        coord.enter().await.unwrap();

        assert_eq!(coord.state(), &SessionState::AwaitingRoom);
        assert_eq!(hub.listener_count("room-available-for-activity-g-5"), 1);
        let joins = hub.emitted_named("join-activity-room");
        assert_eq!(joins[0].data, json!({ "groupId": "g-5", "patientId": "p-1" }));
    }

    #[tokio::test]
    async fn test_consultation_entry_joins_and_confirms() {
        let hub = Arc::new(LocalEventHub::new());
        let mut coord = coordinator(Session::consultation("p-1"), &hub, Capabilities::none());
        coord.enter().await.unwrap();
        coord.enter().await.unwrap();

        let names: Vec<String> = hub.emitted().into_iter().map(|m| m.event).collect();
        assert_eq!(names, vec!["join-room", "confirm-arrival"]);
        assert_eq!(coord.listener_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_channel_keeps_waiting() {
        let hub = Arc::new(LocalEventHub::new());
        hub.set_reachable(false);
        let mut coord = coordinator(Session::solo("p-1"), &hub, Capabilities::none());

        assert!(coord.enter().await.is_err());
        hub.inject("room-available-for-activity-p-1", json!({ "room": "r" }));
        coord.process_pending().await;

        assert_eq!(coord.state(), &SessionState::AwaitingRoom);
        assert!(matches!(coord.notices(), [Notice::ChannelUnreachable(_)]));
    }

    #[tokio::test]
    async fn test_room_for_other_activity_is_ignored() {
        let hub = Arc::new(LocalEventHub::new());
        let mut coord = coordinator(Session::solo("p-1"), &hub, Capabilities::none());
        coord.enter().await.unwrap();

        coord
            .handle_message(ChannelMessage::new(
                room_available_event("p-2"),
                json!({ "room": "r" }),
            ))
            .await;
        assert_eq!(coord.state(), &SessionState::AwaitingRoom);
    }

    #[tokio::test]
    async fn test_missing_sensor_capability_degrades() {
        let hub = Arc::new(LocalEventHub::new());
        let mut coord = coordinator(Session::solo("p-1"), &hub, Capabilities::none());
        coord.enter().await.unwrap();

        hub.inject("room-available-for-activity-p-1", json!({ "room": "velo-1" }));
        coord.process_pending().await;

        assert_eq!(
            coord.state(),
            &SessionState::Active {
                room: "velo-1".to_string()
            }
        );
        assert_eq!(coord.sensor_status(), &SensorStatus::Unavailable);
        assert!(coord.notices().contains(&Notice::VideoUnavailable));
        coord.leave().await;
    }

    #[tokio::test]
    async fn test_sensor_without_radio_reports_unavailable() {
        let hub = Arc::new(LocalEventHub::new());
        let sensor = Arc::new(SimulatedBiosensor::new("Movesense").without_radio());
        let mut coord = coordinator(
            Session::solo("p-1"),
            &hub,
            Capabilities::none().with_sensor(sensor),
        );
        coord.enter().await.unwrap();
        hub.inject("room-available-for-activity-p-1", json!({ "room": "velo-1" }));
        coord.process_pending().await;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            coord.process_pending().await;
            if coord.sensor_status() == &SensorStatus::Unavailable {
                break;
            }
        }
        assert_eq!(coord.sensor_status(), &SensorStatus::Unavailable);
        coord.leave().await;
        assert_eq!(coord.state(), &SessionState::Ended);
    }

    #[tokio::test]
    async fn test_watch_reports_transitions() {
        let hub = Arc::new(LocalEventHub::new());
        let mut coord = coordinator(Session::consultation("p-1"), &hub, Capabilities::none());
        let mut updates = coord.watch();
        coord.enter().await.unwrap();

        hub.inject("incoming-call", json!({ "targetPatientId": "p-1", "room": "r-9" }));
        coord.process_pending().await;
        coord.handle_action(UserAction::Reject).await;

        let mut seen = Vec::new();
        while let Ok(update) = updates.try_recv() {
            seen.push(update);
        }
        assert!(seen.contains(&SessionUpdate::State(SessionState::AwaitingProfessional)));
        assert!(seen.contains(&SessionUpdate::Notice(Notice::CallDeclined)));
    }
}
