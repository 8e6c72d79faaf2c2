// Control loop at LOOP_HZ with a concurrent liveness supervisor
// Each cycle pulls the latest inputs, runs the active controller once and
// writes one command through the governor. The supervisor runs on its own
// timer and can override the actuator at any point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::actuator::{Actuator, LogSink, MotorSink, ZenohSink};
use crate::config::{
    CMD_TIMEOUT, DriveParams, FRAME_TIMEOUT, HEARTBEAT_PERIOD, LOOP_HZ, TOPIC_CMD_AXES,
    TOPIC_CMD_MODE, TOPIC_CONFIG_DRIVE, TOPIC_DETECTION, TOPIC_HEARTBEAT, TOPIC_RT_MOTORS,
    TOPIC_STATE_AXES, TOPIC_STATE_HEALTH, TOPIC_STATE_MOTORS, TOPIC_STATE_SEARCH,
};
use crate::control::{ManualController, TargetTracker, TrackerState};
use crate::drive::{DriveError, Governor};
use crate::messages::{
    AxisCommand, ControlMode, Detection, Heartbeat, ModeCommand, MotorCommand, RuntimeHealth,
    SearchStatus,
};
use crate::supervisor::{LINK_AXIS_DISPLAY, LINK_COMMAND_DISPLAY, LinkSet, LivenessSupervisor};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What one control cycle did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Command written to the actuator, `None` if interlocked or faulted
    pub dispatched: Option<MotorCommand>,
    pub health: RuntimeHealth,
    /// New search hand-off state, if it changed this cycle
    pub search_changed: Option<bool>,
}

pub struct Runtime<S> {
    mode: ControlMode,
    params: DriveParams,
    pending_params: Option<DriveParams>,
    pending_mode: Option<ControlMode>,
    manual: ManualController,
    tracker: TargetTracker,
    frames: Vec<Detection>,
    last_frame_at: Instant,
    search_active: bool,
    governor: Governor,
    actuator: Arc<Actuator<S>>,
}

impl<S: MotorSink> Runtime<S> {
    pub fn new(
        mode: ControlMode,
        params: DriveParams,
        actuator: Arc<Actuator<S>>,
        now: Instant,
    ) -> Self {
        Self {
            mode,
            params,
            pending_params: None,
            pending_mode: None,
            manual: ManualController::new(CMD_TIMEOUT, now),
            tracker: TargetTracker::new(now),
            frames: Vec::new(),
            last_frame_at: now,
            search_active: false,
            governor: Governor::new(),
            actuator,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn params(&self) -> &DriveParams {
        &self.params
    }

    /// Process incoming axes (kept even while tracking)
    pub fn on_axes(&mut self, axes: AxisCommand, now: Instant) {
        debug!("Received axes: {:?}", axes);
        self.manual.on_axes(axes, now);
    }

    /// Queue one detector frame; unparsable frames become misses
    pub fn on_detection_payload(&mut self, payload: &[u8]) {
        let frame = serde_json::from_slice::<Detection>(payload).unwrap_or_else(|e| {
            warn!("Failed to parse detection, counting as miss: {}", e);
            Detection::miss()
        });
        self.frames.push(frame);
    }

    /// Request a mode switch, applied at the start of the next cycle
    pub fn on_mode(&mut self, mode: ControlMode) {
        self.pending_mode = Some(mode);
    }

    /// Stage new drive params, applied at the start of the next cycle
    pub fn on_params(&mut self, params: DriveParams) {
        match params.validate() {
            Ok(()) => self.pending_params = Some(params),
            Err(e) => warn!("Rejected drive params: {}", e),
        }
    }

    /// Run one control cycle
    pub fn cycle(&mut self, now: Instant) -> CycleReport {
        if let Some(params) = self.pending_params.take() {
            info!("Applying drive params: {:?}", params);
            self.params = params;
        }

        let switched = match self.pending_mode.take() {
            Some(mode) if mode != self.mode => {
                info!("Control mode {:?} -> {:?}", self.mode, mode);
                self.mode = mode;
                self.manual.reset();
                self.tracker.reset(now);
                self.governor.reset();
                self.last_frame_at = now;
                true
            }
            _ => false,
        };

        let frames = std::mem::take(&mut self.frames);
        let mixed = if switched {
            Ok(MotorCommand::stop())
        } else {
            match self.mode {
                ControlMode::Manual => self.manual.compute(&self.params, now),
                ControlMode::Tracking => self.track(&frames, now),
            }
        };

        let dispatched = self.governor.dispatch(mixed, &self.params, &self.actuator);
        let (dispatched, fault) = match dispatched {
            Ok(Some(cmd)) => (Some(cmd), false),
            Ok(None) => {
                // Nothing held across a liveness loss
                self.governor.reset();
                self.tracker.reset(now);
                (None, false)
            }
            Err(e) => {
                error!("Actuator write failed: {}", e);
                (None, true)
            }
        };

        let search = self.mode == ControlMode::Tracking && self.tracker.search_active();
        let search_changed = (search != self.search_active).then_some(search);
        self.search_active = search;

        CycleReport {
            dispatched,
            health: self.health(fault),
            search_changed,
        }
    }

    fn track(&mut self, frames: &[Detection], now: Instant) -> Result<MotorCommand, DriveError> {
        if frames.is_empty() {
            // A stalled detector counts as one miss per frame timeout
            if now.saturating_duration_since(self.last_frame_at) >= FRAME_TIMEOUT {
                self.last_frame_at = now;
                return self.tracker.step(None, &self.params, now);
            }
            return Ok(self.tracker.current());
        }

        self.last_frame_at = now;
        let mut result = Ok(self.tracker.current());
        for frame in frames {
            result = self.tracker.step(Some(frame), &self.params, now);
        }
        result
    }

    fn health(&self, fault: bool) -> RuntimeHealth {
        if fault {
            RuntimeHealth::ActuatorFault
        } else if self.actuator.is_tripped() {
            RuntimeHealth::LivenessDead
        } else {
            match self.mode {
                ControlMode::Manual if self.manual.is_stale() => RuntimeHealth::CmdStale,
                ControlMode::Tracking if self.tracker.state() == TrackerState::Stopped => {
                    RuntimeHealth::TargetLost
                }
                _ => RuntimeHealth::Ok,
            }
        }
    }
}

/// Startup options from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub params: DriveParams,
    pub mode: ControlMode,
    pub dry_run: bool,
}

pub async fn run(opts: RunOptions) -> Result<(), BoxError> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    if opts.dry_run {
        info!("Dry run: motor commands are logged, not published");
        serve(session, LogSink::default(), opts).await
    } else {
        let pub_actuation = session.declare_publisher(TOPIC_RT_MOTORS).await?;
        serve(session, ZenohSink::new(pub_actuation), opts).await
    }
}

async fn serve<S: MotorSink + 'static>(
    session: zenoh::Session,
    sink: S,
    opts: RunOptions,
) -> Result<(), BoxError> {
    info!("Setting up publishers and subscribers...");
    let sub_axes = session.declare_subscriber(TOPIC_CMD_AXES).await?;
    let sub_mode = session.declare_subscriber(TOPIC_CMD_MODE).await?;
    let sub_detection = session.declare_subscriber(TOPIC_DETECTION).await?;
    let sub_config = session.declare_subscriber(TOPIC_CONFIG_DRIVE).await?;
    let sub_heartbeat = session.declare_subscriber(TOPIC_HEARTBEAT).await?;
    let pub_motors = session.declare_publisher(TOPIC_STATE_MOTORS).await?;
    let pub_axes = session.declare_publisher(TOPIC_STATE_AXES).await?;
    let pub_health = session.declare_publisher(TOPIC_STATE_HEALTH).await?;
    let pub_search = session.declare_publisher(TOPIC_STATE_SEARCH).await?;

    let actuator = Arc::new(Actuator::new(sink));
    let mut links = LinkSet::new();
    let command_display = links.register(LINK_COMMAND_DISPLAY);
    let axis_display = links.register(LINK_AXIS_DISPLAY);
    let mut supervisor = LivenessSupervisor::new(actuator.clone(), links);

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let supervisor_task = tokio::spawn(async move {
        let mut period = interval(HEARTBEAT_PERIOD);
        period.set_missed_tick_behavior(MissedTickBehavior::Delay);
        period.tick().await; // first tick fires immediately
        let mut heartbeats_open = true;

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => {
                    if let Err(e) = supervisor.shutdown() {
                        error!("Final stop failed: {}", e);
                    }
                    break;
                }
                _ = period.tick() => {
                    if let Err(e) = supervisor.on_period() {
                        error!("Emergency stop failed: {}", e);
                    }
                }
                sample = sub_heartbeat.recv_async(), if heartbeats_open => match sample {
                    Ok(sample) => {
                        let payload = sample.payload().to_bytes();
                        match serde_json::from_slice::<Heartbeat>(&payload) {
                            Ok(_) => supervisor.on_heartbeat(Instant::now()),
                            Err(e) => warn!("Ignoring malformed heartbeat: {}", e),
                        }
                    }
                    Err(e) => {
                        warn!("Heartbeat subscriber closed: {}", e);
                        heartbeats_open = false;
                    }
                },
            }
        }
    });

    let mut runtime = Runtime::new(opts.mode, opts.params, actuator, Instant::now());
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Runtime started: {}Hz loop, {}ms heartbeat period, mode {:?}",
        LOOP_HZ,
        HEARTBEAT_PERIOD.as_millis(),
        runtime.mode()
    );
    info!(
        "Subscribed to: {}, {}, {}, {}, {}",
        TOPIC_CMD_AXES, TOPIC_CMD_MODE, TOPIC_DETECTION, TOPIC_CONFIG_DRIVE, TOPIC_HEARTBEAT
    );

    let result: Result<(), BoxError> = async {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received");
                    return Ok(());
                }
                _ = tick.tick() => {}
            }
            let now = Instant::now();

            // 1. Drain all pending inputs (non-blocking)
            while let Ok(Some(sample)) = sub_config.try_recv() {
                match DriveParams::from_json(&sample.payload().to_bytes()) {
                    Ok(params) => runtime.on_params(params),
                    Err(e) => warn!("Rejected drive params: {}", e),
                }
            }
            while let Ok(Some(sample)) = sub_mode.try_recv() {
                match serde_json::from_slice::<ModeCommand>(&sample.payload().to_bytes()) {
                    Ok(cmd) => runtime.on_mode(cmd.mode),
                    Err(e) => warn!("Failed to parse mode command: {}", e),
                }
            }
            let echo_axes = *axis_display.borrow();
            while let Ok(Some(sample)) = sub_axes.try_recv() {
                match serde_json::from_slice::<AxisCommand>(&sample.payload().to_bytes()) {
                    Ok(axes) => {
                        runtime.on_axes(axes, now);
                        if echo_axes {
                            pub_axes.put(serde_json::to_string(&axes)?).await?;
                        }
                    }
                    Err(e) => warn!("Failed to parse axes: {}", e),
                }
            }
            while let Ok(Some(sample)) = sub_detection.try_recv() {
                runtime.on_detection_payload(&sample.payload().to_bytes());
            }

            // 2. Run the active controller and dispatch
            let report = runtime.cycle(now);

            // 3. Publish diagnostics
            let show_command = *command_display.borrow();
            if let Some(cmd) = report.dispatched
                && show_command
            {
                pub_motors.put(serde_json::to_string(&cmd)?).await?;
            }
            if let Some(search_active) = report.search_changed {
                pub_search
                    .put(serde_json::to_string(&SearchStatus { search_active })?)
                    .await?;
            }
            pub_health.put(serde_json::to_string(&report.health)?).await?;
        }
    }
    .await;

    // Motors stop before links are torn down, then the task exits
    drop(stop_tx);
    supervisor_task.await?;
    result
}
