//! Console runtime
//!
//! One task owns the health monitor, the jog link manager and the key
//! translator. Timer ticks, key events, link events and completed HTTP
//! requests all arrive through one `tokio::select!` loop; requests run in
//! spawned tasks and report back over an internal channel.

use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use xytable_communication::{
    CommandResponse, ControlApi, FetchOrigin, HealthConfig, HealthInput, HealthMonitor,
    JogLinkManager, JogTransport, LimitsResponse, LinkEvent, StatusResponse,
};
use xytable_core::{
    Axis, ConnectionState, ConsoleEvent, DigitalOutput, EventDispatcher, Position,
    QuickMoveIncrement, Result,
};
use xytable_input::{HoldElapsed, KeyInput, KeyMap, KeyTranslator, MotionCommand, TokioHoldTimers};
use xytable_settings::Config;

/// Time given to the jog link to flush stop commands on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Runtime parameters of the console
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsoleConfig {
    pub health: HealthConfig,
    pub hold_delay: Duration,
    pub reopen_delay: Duration,
    pub increment: QuickMoveIncrement,
    pub output: DigitalOutput,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self::from_settings(&Config::default())
    }
}

impl ConsoleConfig {
    pub fn from_settings(config: &Config) -> Self {
        Self {
            health: HealthConfig {
                poll_interval: config.health.poll_interval(),
                reconnect_interval: config.health.reconnect_interval(),
                cooldown: config.health.cooldown(),
                max_attempts: config.health.max_attempts,
            },
            hold_delay: config.jog.hold_delay(),
            reopen_delay: config.jog.reopen_delay(),
            increment: config.jog.default_increment,
            output: config.jog.output,
        }
    }
}

/// Operator input to the console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// A key press, repeat or release
    Key(KeyInput),
    SetIncrement(QuickMoveIncrement),
    CoarserIncrement,
    FinerIncrement,
    /// Absolute move to a position
    MoveTo { x: f64, y: f64 },
    EmergencyStop,
    ClearEmergencyStop,
    Home,
    /// Stop jogging, close the link and end the runtime
    Shutdown,
}

/// State rendered by frontends
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsoleSnapshot {
    pub connection: ConnectionState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub position: Position,
    pub emergency_stop: bool,
    /// Jogging flags indexed by [`Axis::index`]
    pub jogging: [bool; 2],
    pub increment: QuickMoveIncrement,
    pub limits: Option<LimitsResponse>,
    pub link_ready: bool,
    pub last_output: Option<(DigitalOutput, bool)>,
    /// Last message for the operator
    pub banner: Option<String>,
    /// Whether the runtime loop is still running
    pub running: bool,
}

impl ConsoleSnapshot {
    pub fn is_jogging(&self, axis: Axis) -> bool {
        self.jogging[axis.index()]
    }
}

/// Frontend side of a running console
#[derive(Clone)]
pub struct ConsoleHandle {
    inputs: mpsc::UnboundedSender<ConsoleInput>,
    snapshot: Arc<RwLock<ConsoleSnapshot>>,
    events: EventDispatcher,
}

impl ConsoleHandle {
    /// Queue an input; false once the runtime has ended
    pub fn send(&self, input: ConsoleInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        self.snapshot.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }
}

/// One-shot command issued through the control API
#[derive(Debug, Clone, Copy, PartialEq)]
enum CommandKind {
    TapMove(Axis),
    MoveTo,
    EmergencyStop,
    ClearEmergencyStop,
    Home,
    Output { output: DigitalOutput, state: bool },
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::TapMove(axis) => write!(f, "Move {}", axis),
            CommandKind::MoveTo => write!(f, "Move to position"),
            CommandKind::EmergencyStop => write!(f, "Emergency stop"),
            CommandKind::ClearEmergencyStop => write!(f, "Clear emergency stop"),
            CommandKind::Home => write!(f, "Home"),
            CommandKind::Output { output, .. } => write!(f, "Output {}", output),
        }
    }
}

/// Completion of a spawned request
enum Internal {
    Status {
        origin: FetchOrigin,
        result: Result<StatusResponse>,
    },
    Limits(Result<LimitsResponse>),
    Command {
        kind: CommandKind,
        result: Result<CommandResponse>,
    },
}

/// The console runtime
pub struct Console<T: JogTransport> {
    api: Arc<dyn ControlApi>,
    health: HealthMonitor,
    link: JogLinkManager<T>,
    translator: KeyTranslator<TokioHoldTimers>,
    events: EventDispatcher,
    snapshot: Arc<RwLock<ConsoleSnapshot>>,

    inputs: mpsc::UnboundedReceiver<ConsoleInput>,
    hold_rx: mpsc::UnboundedReceiver<HoldElapsed>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    reopen_at: Option<Instant>,

    position: Position,
    emergency_stop: bool,
    limits: Option<LimitsResponse>,
    last_output: Option<(DigitalOutput, bool)>,
    banner: Option<String>,
}

impl<T: JogTransport> Console<T> {
    /// Create the runtime and the handle frontends drive it with
    pub fn new(api: Arc<dyn ControlApi>, transport: T, config: ConsoleConfig) -> (Self, ConsoleHandle) {
        let (input_tx, inputs) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (timers, hold_rx) = TokioHoldTimers::new();

        let mut translator =
            KeyTranslator::new(KeyMap::new(config.output), timers, config.hold_delay);
        translator.set_increment(config.increment);

        let events = EventDispatcher::default();
        let snapshot = Arc::new(RwLock::new(ConsoleSnapshot {
            max_attempts: config.health.max_attempts,
            increment: config.increment,
            running: true,
            ..Default::default()
        }));

        let handle = ConsoleHandle {
            inputs: input_tx,
            snapshot: Arc::clone(&snapshot),
            events: events.clone(),
        };

        let console = Self {
            api,
            health: HealthMonitor::new(config.health),
            link: JogLinkManager::new(transport, link_tx, config.reopen_delay),
            translator,
            events,
            snapshot,
            inputs,
            hold_rx,
            link_rx,
            internal_tx,
            internal_rx,
            reopen_at: None,
            position: Position::default(),
            emergency_stop: false,
            limits: None,
            last_output: None,
            banner: None,
        };
        (console, handle)
    }

    /// Run until [`ConsoleInput::Shutdown`] arrives or every handle is dropped
    pub async fn run(mut self) {
        let health = *self.health.config();
        let mut poll = tokio::time::interval(health.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reconnect = tokio::time::interval_at(
            Instant::now() + health.reconnect_interval,
            health.reconnect_interval,
        );
        reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Console runtime started");
        loop {
            tokio::select! {
                _ = poll.tick() => self.apply_health(HealthInput::PollTick),
                _ = reconnect.tick() => self.apply_health(HealthInput::ReconnectTick),
                input = self.inputs.recv() => match input {
                    Some(ConsoleInput::Shutdown) | None => break,
                    Some(input) => self.handle_input(input),
                },
                Some(fired) = self.hold_rx.recv() => {
                    let commands = self.translator.hold_elapsed(fired.axis, fired.token);
                    self.dispatch(commands);
                }
                Some(event) = self.link_rx.recv() => self.handle_link_event(event),
                Some(message) = self.internal_rx.recv() => self.handle_internal(message),
                _ = sleep_until(self.reopen_at) => {
                    self.reopen_at = None;
                    self.link.ensure_link(self.health.is_connected());
                }
            }
            self.publish_snapshot();
        }

        self.shutdown().await;
    }

    fn handle_input(&mut self, input: ConsoleInput) {
        match input {
            ConsoleInput::Key(key) => {
                let commands = self.translator.handle_key(key);
                self.dispatch(commands);
            }
            ConsoleInput::SetIncrement(increment) => self.set_increment(increment),
            ConsoleInput::CoarserIncrement => {
                self.set_increment(self.translator.increment().coarser())
            }
            ConsoleInput::FinerIncrement => self.set_increment(self.translator.increment().finer()),
            ConsoleInput::MoveTo { x, y } => {
                self.spawn_command(CommandKind::MoveTo, move |api| async move {
                    api.move_absolute(x, y, None).await
                })
            }
            ConsoleInput::EmergencyStop => {
                tracing::warn!("Emergency stop requested");
                self.clear_jog_state(true);
                self.spawn_command(CommandKind::EmergencyStop, |api| async move {
                    api.emergency_stop().await
                });
            }
            ConsoleInput::ClearEmergencyStop => {
                self.spawn_command(CommandKind::ClearEmergencyStop, |api| async move {
                    api.clear_emergency_stop().await
                })
            }
            ConsoleInput::Home => {
                self.spawn_command(CommandKind::Home, |api| async move { api.home().await })
            }
            ConsoleInput::Shutdown => {}
        }
    }

    fn set_increment(&mut self, increment: QuickMoveIncrement) {
        if increment != self.translator.increment() {
            self.translator.set_increment(increment);
            self.events.publish(ConsoleEvent::IncrementChanged(increment));
        }
    }

    fn dispatch(&mut self, commands: Vec<MotionCommand>) {
        for command in commands {
            match command {
                MotionCommand::TapMove { axis, distance } => {
                    self.spawn_command(CommandKind::TapMove(axis), move |api| async move {
                        api.move_relative(axis, distance, None).await
                    })
                }
                MotionCommand::Jog(jog) => {
                    if !self.link.send_jog(&jog) {
                        tracing::debug!("Jog {:?} for {} not sent", jog.action, jog.axis);
                    }
                    self.events.publish(ConsoleEvent::JogStateChanged {
                        axis: jog.axis,
                        jogging: jog.is_start(),
                    });
                }
                MotionCommand::SetOutput { output, state } => {
                    self.spawn_command(CommandKind::Output { output, state }, move |api| async move {
                        api.set_output(output, state).await
                    })
                }
            }
        }
    }

    /// Return both axes to idle, optionally sending stops over the link
    fn clear_jog_state(&mut self, send_stops: bool) {
        for command in self.translator.release_all() {
            if let MotionCommand::Jog(stop) = command {
                if send_stops {
                    self.link.send_jog(&stop);
                }
                self.events.publish(ConsoleEvent::JogStateChanged {
                    axis: stop.axis,
                    jogging: false,
                });
            }
        }
    }

    fn apply_health(&mut self, input: HealthInput) {
        let outcome = self.health.update(input, Instant::now());

        if let Some(origin) = outcome.fetch {
            self.spawn_status(origin);
        }
        if let Some(state) = outcome.state_changed {
            self.events.publish(ConsoleEvent::ConnectionChanged(state));
        }
        if let Some(banner) = outcome.banner {
            self.set_banner(banner);
        }

        match outcome.connected_changed {
            Some(true) => {
                self.banner = None;
                self.link.ensure_link(true);
                self.spawn_limits();
            }
            Some(false) => {
                self.reopen_at = None;
                self.link.ensure_link(false);
                self.clear_jog_state(false);
            }
            None => {}
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        let outcome = self.link.handle_event(event, self.health.is_connected());
        if outcome.clear_jog_state {
            self.clear_jog_state(false);
        }
        if let Some(delay) = outcome.reopen_after {
            tracing::info!("Reopening jog link in {:?}", delay);
            self.reopen_at = Some(Instant::now() + delay);
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Status { origin, result } => {
                let reported = result
                    .as_ref()
                    .ok()
                    .map(|s| (s.current_position, s.emergency_stop));
                self.apply_health(HealthInput::StatusResult { origin, result });
                if let Some((position, emergency_stop)) = reported {
                    self.set_position(position);
                    self.emergency_stop = emergency_stop;
                }
            }
            Internal::Limits(Ok(limits)) => self.limits = Some(limits),
            Internal::Limits(Err(e)) => tracing::warn!("Failed to load table limits: {}", e),
            Internal::Command { kind, result } => self.command_finished(kind, result),
        }
    }

    fn command_finished(&mut self, kind: CommandKind, result: Result<CommandResponse>) {
        match result {
            Ok(reply) => {
                tracing::debug!("{}: {}", kind, reply.message);
                if let Some(position) = reply.position {
                    self.set_position(position);
                }
                match kind {
                    CommandKind::EmergencyStop => self.emergency_stop = true,
                    CommandKind::ClearEmergencyStop => self.emergency_stop = false,
                    CommandKind::Output { output, state } => {
                        self.last_output = Some((output, state));
                        self.events
                            .publish(ConsoleEvent::OutputChanged { output, state });
                    }
                    _ => {}
                }
            }
            Err(e) if e.is_rejection() => {
                let reason = e.to_string();
                tracing::warn!("{} rejected: {}", kind, reason);
                self.banner = Some(reason.clone());
                self.events.publish(ConsoleEvent::CommandRejected(reason));
            }
            Err(e) => {
                if self.health.is_reconnecting() {
                    tracing::debug!("{} failed while reconnecting: {}", kind, e);
                } else {
                    self.set_banner(format!("{} failed: {}", kind, e));
                }
            }
        }
    }

    fn set_position(&mut self, position: Position) {
        if position != self.position {
            self.position = position;
            self.events.publish(ConsoleEvent::PositionChanged(position));
        }
    }

    fn set_banner(&mut self, message: String) {
        self.banner = Some(message.clone());
        self.events.publish(ConsoleEvent::Banner(message));
    }

    fn spawn_status(&self, origin: FetchOrigin) {
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = api.status().await;
            let _ = tx.send(Internal::Status { origin, result });
        });
    }

    fn spawn_limits(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = api.limits().await;
            let _ = tx.send(Internal::Limits(result));
        });
    }

    fn spawn_command<F, Fut>(&self, kind: CommandKind, call: F)
    where
        F: FnOnce(Arc<dyn ControlApi>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<CommandResponse>> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = call(api).await;
            let _ = tx.send(Internal::Command { kind, result });
        });
    }

    fn publish_snapshot(&self) {
        let status = self.health.status();
        let mut snapshot = self.snapshot.write();
        snapshot.connection = status.state();
        snapshot.attempts = status.attempts;
        snapshot.max_attempts = status.max_attempts;
        snapshot.position = self.position;
        snapshot.emergency_stop = self.emergency_stop;
        snapshot.jogging = [
            self.translator.is_jogging(Axis::X),
            self.translator.is_jogging(Axis::Y),
        ];
        snapshot.increment = self.translator.increment();
        snapshot.limits = self.limits;
        snapshot.link_ready = self.link.is_ready();
        snapshot.last_output = self.last_output;
        snapshot.banner = self.banner.clone();
    }

    async fn shutdown(&mut self) {
        tracing::info!("Console shutting down");
        self.clear_jog_state(true);
        self.reopen_at = None;
        self.link.shutdown(SHUTDOWN_GRACE).await;
        self.publish_snapshot();
        self.snapshot.write().running = false;
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
