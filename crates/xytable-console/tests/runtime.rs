//! Console runtime scenarios against an in-process backend

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use xytable_communication::{
    CommandResponse, ControlApi, HealthConfig, JogCommand, JogTransport, LimitsResponse,
    LinkEvent, LinkEventKind, LinkHandle, LinkId, Program, ProgramList, StatusResponse,
};
use xytable_console::{Console, ConsoleConfig, ConsoleHandle, ConsoleInput};
use xytable_core::{
    Axis, CommandError, ConnectionError, ConnectionState, DigitalOutput, Direction, Error,
    Position, QuickMoveIncrement, Result,
};
use xytable_input::{Key, KeyInput};

/// Control API double recording every call
#[derive(Default)]
struct MockApi {
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    reject_moves: Mutex<Option<String>>,
}

impl MockApi {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn reply(&self) -> Result<CommandResponse> {
        Ok(CommandResponse {
            status: "success".into(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ControlApi for MockApi {
    async fn status(&self) -> Result<StatusResponse> {
        self.record("status".into());
        if self.offline.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport {
                reason: "connection refused".into(),
            }
            .into());
        }
        Ok(StatusResponse {
            connected: true,
            current_position: Position::new(1.0, 2.0),
            ..Default::default()
        })
    }

    async fn limits(&self) -> Result<LimitsResponse> {
        self.record("limits".into());
        serde_json::from_str(
            r#"{"x_axis":{"min":0.0,"max":10.0},"y_axis":{"min":0.0,"max":5.0}}"#,
        )
        .map_err(Error::from)
    }

    async fn move_relative(
        &self,
        axis: Axis,
        distance: f64,
        _speed: Option<f64>,
    ) -> Result<CommandResponse> {
        self.record(format!("move {} {}", axis.as_str(), distance));
        if let Some(reason) = self.reject_moves.lock().unwrap().clone() {
            return Err(CommandError::Rejected {
                status: 400,
                reason,
            }
            .into());
        }
        self.reply()
    }

    async fn move_absolute(&self, x: f64, y: f64, _speed: Option<f64>) -> Result<CommandResponse> {
        self.record(format!("move_to {} {}", x, y));
        self.reply()
    }

    async fn emergency_stop(&self) -> Result<CommandResponse> {
        self.record("emergency_stop".into());
        self.reply()
    }

    async fn clear_emergency_stop(&self) -> Result<CommandResponse> {
        self.record("clear_emergency_stop".into());
        self.reply()
    }

    async fn home(&self) -> Result<CommandResponse> {
        self.record("home".into());
        self.reply()
    }

    async fn set_output(&self, output: DigitalOutput, state: bool) -> Result<CommandResponse> {
        self.record(format!("set_io {} {}", output, state));
        self.reply()
    }

    async fn list_programs(&self) -> Result<ProgramList> {
        Ok(ProgramList::default())
    }

    async fn load_program(&self, name: &str) -> Result<Program> {
        Err(Error::other(format!("no program {}", name)))
    }

    async fn save_program(&self, _program: &Program) -> Result<CommandResponse> {
        self.reply()
    }

    async fn update_program(&self, _name: &str, _program: &Program) -> Result<CommandResponse> {
        self.reply()
    }

    async fn delete_program(&self, _name: &str) -> Result<CommandResponse> {
        self.reply()
    }
}

#[derive(Default)]
struct FakeLinks {
    opened: Vec<(LinkId, Instant)>,
    frames: Vec<String>,
    events: Option<mpsc::UnboundedSender<LinkEvent>>,
}

/// Jog transport that opens instantly and records outbound frames
#[derive(Clone, Default)]
struct FakeTransport {
    links: Arc<Mutex<FakeLinks>>,
}

impl FakeTransport {
    fn opened(&self) -> Vec<(LinkId, Instant)> {
        self.links.lock().unwrap().opened.clone()
    }

    fn jogs(&self) -> Vec<JogCommand> {
        self.links
            .lock()
            .unwrap()
            .frames
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    fn close_current(&self) {
        let links = self.links.lock().unwrap();
        let (id, _) = *links.opened.last().unwrap();
        let events = links.events.as_ref().unwrap();
        events.send(LinkEvent::new(id, LinkEventKind::Closed)).unwrap();
    }
}

impl JogTransport for FakeTransport {
    fn open(&self, id: LinkId, events: mpsc::UnboundedSender<LinkEvent>) -> LinkHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        {
            let mut links = self.links.lock().unwrap();
            links.opened.push((id, Instant::now()));
            links.events = Some(events.clone());
        }
        events.send(LinkEvent::new(id, LinkEventKind::Opened)).unwrap();

        let links = Arc::clone(&self.links);
        let task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                links.lock().unwrap().frames.push(text);
            }
        });
        LinkHandle::new(id, tx).with_task(task)
    }
}

struct Harness {
    api: Arc<MockApi>,
    transport: FakeTransport,
    handle: ConsoleHandle,
    task: tokio::task::JoinHandle<()>,
}

fn config() -> ConsoleConfig {
    ConsoleConfig {
        health: HealthConfig::default(),
        hold_delay: Duration::from_millis(400),
        reopen_delay: Duration::from_secs(2),
        increment: QuickMoveIncrement::Hundredth,
        output: DigitalOutput::Down,
    }
}

async fn start(offline: bool) -> Harness {
    let api = Arc::new(MockApi::default());
    api.offline.store(offline, Ordering::SeqCst);
    let transport = FakeTransport::default();
    let (console, handle) = Console::new(api.clone(), transport.clone(), config());
    let task = tokio::spawn(console.run());
    settle().await;
    Harness {
        api,
        transport,
        handle,
        task,
    }
}

/// Let spawned requests and link events reach the runtime
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

fn key_down(h: &Harness, key: Key) {
    assert!(h.handle.send(ConsoleInput::Key(KeyInput::down(key))));
}

fn key_up(h: &Harness, key: Key) {
    assert!(h.handle.send(ConsoleInput::Key(KeyInput::up(key))));
}

#[tokio::test(start_paused = true)]
async fn test_connects_and_opens_link() {
    let h = start(false).await;
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.connection, ConnectionState::Connected);
    assert!(snapshot.link_ready);
    assert_eq!(snapshot.position, Position::new(1.0, 2.0));
    assert_eq!(snapshot.limits.map(|l| l.x_axis.max), Some(10.0));
    assert_eq!(h.transport.opened().len(), 1);
    assert_eq!(h.api.calls_starting_with("limits").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_arrow_tap_moves_once_without_jog() {
    let h = start(false).await;
    key_down(&h, Key::ArrowRight);
    sleep(Duration::from_millis(100)).await;
    key_up(&h, Key::ArrowRight);
    settle().await;

    assert_eq!(h.api.calls_starting_with("move"), vec!["move x 0.01"]);
    assert!(h.transport.jogs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hold_starts_and_stops_jog() {
    let h = start(false).await;
    key_down(&h, Key::char('w'));
    sleep(Duration::from_millis(500)).await;
    assert!(h.handle.snapshot().is_jogging(Axis::Y));

    key_up(&h, Key::char('w'));
    settle().await;

    let jogs = h.transport.jogs();
    assert_eq!(
        jogs,
        vec![
            JogCommand::start(Axis::Y, Direction::Positive, 0.01),
            JogCommand::stop(Axis::Y),
        ]
    );
    assert!(!h.handle.snapshot().is_jogging(Axis::Y));
}

#[tokio::test(start_paused = true)]
async fn test_link_close_clears_jog_and_reopens_after_delay() {
    let h = start(false).await;
    key_down(&h, Key::char('d'));
    sleep(Duration::from_millis(500)).await;
    assert!(h.handle.snapshot().is_jogging(Axis::X));

    let closed_at = Instant::now();
    h.transport.close_current();
    settle().await;
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.jogging, [false, false]);
    assert!(!snapshot.link_ready);

    sleep(Duration::from_millis(1900)).await;
    assert_eq!(h.transport.opened().len(), 1);

    sleep(Duration::from_millis(200)).await;
    let opened = h.transport.opened();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[1].1 - closed_at, Duration::from_secs(2));
    assert!(h.handle.snapshot().link_ready);

    // Releasing the key after the reset sends nothing.
    key_up(&h, Key::char('d'));
    settle().await;
    assert_eq!(h.transport.jogs().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_link_while_disconnected() {
    let h = start(true).await;
    key_down(&h, Key::ArrowLeft);
    sleep(Duration::from_millis(500)).await;
    key_up(&h, Key::ArrowLeft);
    settle().await;

    assert!(h.transport.opened().is_empty());
    assert!(h.transport.jogs().is_empty());
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.connection, ConnectionState::Disconnected);
    assert!(snapshot
        .banner
        .as_deref()
        .is_some_and(|b| b.starts_with("Connection error:")));
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_backend_returns() {
    let h = start(true).await;
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(h.handle.snapshot().connection, ConnectionState::Reconnecting);
    assert!(h.transport.opened().is_empty());

    h.api.offline.store(false, Ordering::SeqCst);
    sleep(Duration::from_millis(2000)).await;
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.connection, ConnectionState::Connected);
    assert_eq!(snapshot.attempts, 0);
    assert_eq!(h.transport.opened().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_tears_down_link() {
    let h = start(false).await;
    key_down(&h, Key::ArrowUp);
    sleep(Duration::from_millis(500)).await;
    assert!(h.handle.snapshot().is_jogging(Axis::Y));

    h.api.offline.store(true, Ordering::SeqCst);
    sleep(Duration::from_secs(5)).await;
    let snapshot = h.handle.snapshot();
    assert_ne!(snapshot.connection, ConnectionState::Connected);
    assert_eq!(snapshot.jogging, [false, false]);
    assert!(!snapshot.link_ready);
}

#[tokio::test(start_paused = true)]
async fn test_rejection_surfaces_verbatim() {
    let h = start(false).await;
    *h.api.reject_moves.lock().unwrap() =
        Some("Target position out of bounds: x=10.01".to_string());
    let mut events = h.handle.subscribe();

    key_down(&h, Key::ArrowRight);
    key_up(&h, Key::ArrowRight);
    settle().await;

    assert_eq!(
        h.handle.snapshot().banner.as_deref(),
        Some("Target position out of bounds: x=10.01")
    );
    let mut rejected = None;
    while let Ok(event) = events.try_recv() {
        if let xytable_core::ConsoleEvent::CommandRejected(reason) = event {
            rejected = Some(reason);
        }
    }
    assert_eq!(
        rejected.as_deref(),
        Some("Target position out of bounds: x=10.01")
    );
}

#[tokio::test(start_paused = true)]
async fn test_emergency_stop_while_jogging() {
    let h = start(false).await;
    key_down(&h, Key::ArrowDown);
    sleep(Duration::from_millis(500)).await;

    assert!(h.handle.send(ConsoleInput::EmergencyStop));
    settle().await;

    let jogs = h.transport.jogs();
    assert_eq!(jogs.last(), Some(&JogCommand::stop(Axis::Y)));
    assert_eq!(h.api.calls_starting_with("emergency_stop").len(), 1);
    let snapshot = h.handle.snapshot();
    assert!(snapshot.emergency_stop);
    assert!(!snapshot.is_jogging(Axis::Y));

    // The key is still physically down; its release must not send a second stop.
    key_up(&h, Key::ArrowDown);
    settle().await;
    assert_eq!(h.transport.jogs().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_increment_and_output_keys() {
    let h = start(false).await;
    assert!(h.handle.send(ConsoleInput::CoarserIncrement));
    settle().await;
    assert_eq!(h.handle.snapshot().increment, QuickMoveIncrement::Tenth);

    key_down(&h, Key::ArrowLeft);
    key_up(&h, Key::ArrowLeft);
    key_down(&h, Key::char('.'));
    key_up(&h, Key::char('.'));
    settle().await;

    assert_eq!(h.api.calls_starting_with("move"), vec!["move x -0.1"]);
    assert_eq!(h.api.calls_starting_with("set_io"), vec!["set_io down true"]);
    assert_eq!(
        h.handle.snapshot().last_output,
        Some((DigitalOutput::Down, true))
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_jogging_and_ends() {
    let h = start(false).await;
    key_down(&h, Key::ArrowRight);
    sleep(Duration::from_millis(500)).await;

    assert!(h.handle.send(ConsoleInput::Shutdown));
    h.task.await.unwrap();

    assert_eq!(h.transport.jogs().last(), Some(&JogCommand::stop(Axis::X)));
    let snapshot = h.handle.snapshot();
    assert!(!snapshot.running);
    assert!(!snapshot.link_ready);
    assert!(!h.handle.send(ConsoleInput::Home));
}
