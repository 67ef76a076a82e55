//! The `rover run` control loop

use crate::config::RoverConfig;
use crate::controller::{Clock, ModeController, SystemClock};
use intent_parser::IntentParser;
use motion_policy::{DriveMode, MotorDirective, MovementPolicy};
use perception::{spawn_capture_loop, CameraSource, DetectorChain, Perception, PerceptionSnapshot};
use robot_link::{LinkMetrics, MotorLink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use std::io::BufRead;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Voice, vision and motor link wired together. Every method is synchronous
/// and returns promptly apart from link I/O.
pub struct Rover<C: Clock = SystemClock> {
    parser: IntentParser,
    policy: MovementPolicy,
    controller: ModeController<C>,
    link: Box<dyn MotorLink + Send>,
    snapshot: Arc<PerceptionSnapshot>,
    threshold: f32,
    reconnect_interval: Duration,
    next_reconnect: Instant,
}

impl<C: Clock> Rover<C> {
    pub fn new(
        config: &RoverConfig,
        link: Box<dyn MotorLink + Send>,
        snapshot: Arc<PerceptionSnapshot>,
        clock: C,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            parser: IntentParser::new(config.intent.clone())?,
            policy: MovementPolicy::new(config.policy.clone()),
            controller: ModeController::new(clock, config.control.command_timeout()),
            link,
            snapshot,
            threshold: config.intent.confidence_threshold,
            reconnect_interval: config.control.reconnect_interval(),
            next_reconnect: Instant::now(),
        })
    }

    pub fn mode(&self) -> DriveMode {
        self.controller.mode()
    }

    /// Resolve one transcribed utterance and act on it
    pub fn handle_utterance(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        info!("Received voice command: '{}'", text);
        self.controller.resume_manual();

        let command = self.parser.parse(text);
        if !command.is_actionable(self.threshold) {
            warn!("Low confidence command ignored: {}", text);
            return;
        }
        info!("Executing command: {}", command.describe());
        self.controller.accept(&command);

        let snapshot = self.snapshot.latest();
        if let Some(directive) = self
            .policy
            .decide(DriveMode::Manual, Some(&command), &snapshot)
        {
            self.dispatch(directive);
        }
    }

    /// One control-loop step: mode timeout, then the vision behaviour in force
    pub fn tick(&mut self) {
        self.controller.check_timeout();
        if self.controller.is_busy() {
            return;
        }

        let snapshot = self.snapshot.latest();
        let directive = match self.controller.mode() {
            DriveMode::Autonomous => self.policy.decide(DriveMode::Autonomous, None, &snapshot),
            DriveMode::Manual => match self.controller.active_command() {
                Some(command) => self.policy.decide(DriveMode::Manual, Some(command), &snapshot),
                None => None,
            },
        };
        if let Some(directive) = directive {
            self.dispatch(directive);
        }
    }

    /// One-line summary of mode, objects in view and link state
    pub fn log_status(&self) {
        let objects = self.snapshot.latest().objects.len();
        info!(
            "Status: mode={} objects={} connected={}",
            self.controller.mode().as_str(),
            objects,
            self.link.is_connected()
        );
    }

    /// Zero the wheels before exit
    pub fn shutdown(&mut self) {
        self.next_reconnect = Instant::now();
        if !self.ensure_connected() {
            warn!("Robot not connected, emergency stop not sent");
            return;
        }
        match self.link.emergency_stop() {
            Ok(()) => info!("Emergency stop sent"),
            Err(e) => error!("Failed to send emergency stop: {}", e),
        }
    }

    fn calibrate(&mut self, speed: i32) {
        if !self.ensure_connected() {
            warn!("Robot not connected, skipping calibration");
            return;
        }
        if let Err(e) = self.link.calibrate(speed) {
            error!("Motor calibration failed: {}", e);
        }
    }

    fn dispatch(&mut self, directive: MotorDirective) {
        if !self.controller.should_send(&directive) {
            debug!("robot already stopped, {} not resent", directive.source_action);
            return;
        }
        if !self.ensure_connected() {
            warn!("Robot not connected, dropping {}", directive.source_action);
            return;
        }
        debug!(
            "{} L={} R={} for {:.1}s",
            directive.source_action, directive.left_power, directive.right_power, directive.duration_s
        );
        if let Err(e) = self.link.send_directive(&directive) {
            error!("Failed to send {}: {}", directive.source_action, e);
        }
    }

    fn ensure_connected(&mut self) -> bool {
        if self.link.is_connected() {
            return true;
        }
        let now = Instant::now();
        if now < self.next_reconnect {
            return false;
        }
        self.next_reconnect = now + self.reconnect_interval;
        match self.link.connect() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to connect to robot: {}", e);
                false
            }
        }
    }
}

/// A running capture thread and the snapshot it feeds
pub struct Capture {
    pub snapshot: Arc<PerceptionSnapshot>,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Capture {
    pub fn start<Cam>(camera: Cam, detector: DetectorChain, interval: Duration) -> anyhow::Result<Self>
    where
        Cam: CameraSource + Send + 'static,
    {
        let perception = Perception::new(detector);
        let snapshot = perception.snapshot();
        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_capture_loop(camera, perception, Arc::clone(&running), interval)?;
        Ok(Self {
            snapshot,
            running,
            handle,
        })
    }

    pub fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        if self.handle.join().is_err() {
            error!("Capture thread panicked");
        }
    }
}

/// Forward lines from `input` on a plain OS thread. The sender drops at EOF.
/// A blocked read here never holds up runtime shutdown.
fn spawn_line_reader<R>(input: R, tx: mpsc::Sender<String>) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("utterance-reader".into())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })
}

/// Drive the rover until Ctrl-C or until stdin closes.
/// Utterances are read one per line from stdin.
pub async fn run(
    config: RoverConfig,
    link: Box<dyn MotorLink + Send>,
    capture: Capture,
    metrics: Option<LinkMetrics>,
) -> anyhow::Result<()> {
    let mut rover = Rover::new(&config, link, Arc::clone(&capture.snapshot), SystemClock)?;
    if config.control.calibrate_on_start {
        tokio::task::block_in_place(|| rover.calibrate(config.policy.base_speed));
    }

    let (tx, mut rx) = mpsc::channel::<String>(16);
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()), tx)?;

    info!("Starting main control loop (say or type commands, Ctrl-C to quit)");
    let mut ticker = tokio::time::interval(config.control.tick());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown signal received");
                break;
            }
            _ = status.tick() => rover.log_status(),
            _ = ticker.tick() => {
                let mut closed = false;
                loop {
                    match rx.try_recv() {
                        Ok(text) => tokio::task::block_in_place(|| rover.handle_utterance(&text)),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            closed = true;
                            break;
                        }
                    }
                }
                tokio::task::block_in_place(|| rover.tick());
                if closed {
                    info!("Utterance source closed");
                    break;
                }
            }
        }
    }

    info!("Stopping rover");
    tokio::task::block_in_place(|| {
        rover.shutdown();
        capture.stop();
    });
    if let Some(metrics) = metrics {
        info!("Link metrics:\n{}", metrics.encode_text());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ManualClock;
    use perception::{BoundingBox, DetectedObject, Frame, PixelFormat};
    use robot_link::MockLink;

    fn rover(link: MockLink) -> (ManualClock, Arc<PerceptionSnapshot>, Rover<ManualClock>) {
        let clock = ManualClock::new();
        let snapshot = Arc::new(PerceptionSnapshot::new());
        let rover = Rover::new(
            &RoverConfig::default(),
            Box::new(link),
            Arc::clone(&snapshot),
            clock.clone(),
        )
        .unwrap();
        (clock, snapshot, rover)
    }

    fn show(snapshot: &PerceptionSnapshot, name: &str, center_x: u32, side: u32) {
        let bbox = BoundingBox {
            x: center_x - side / 2,
            y: 200,
            width: side,
            height: side,
        };
        let frame = Frame {
            width: 640,
            height: 480,
            pixel_format: PixelFormat::Rgb8,
            data: Vec::new(),
            ts: None,
        };
        let area = u64::from(side) * u64::from(side);
        snapshot.publish(vec![DetectedObject::new(name, 0.7, bbox, area)], &frame);
    }

    #[test]
    fn test_locomotion_command_is_sent_once() {
        let link = MockLink::new();
        let (_clock, _snapshot, mut rover) = rover(link.clone());
        rover.handle_utterance("turn left quickly");
        rover.tick();
        rover.tick();

        let sent = link.sent();
        assert_eq!(sent.len(), 1);
        let line: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(line["action"], "turn_left");
        assert_eq!(line["left_motor"], -210);
    }

    #[test]
    fn test_unrecognised_speech_is_ignored() {
        let link = MockLink::new();
        let (_clock, _snapshot, mut rover) = rover(link.clone());
        rover.handle_utterance("what a lovely day");
        rover.handle_utterance("   ");
        rover.tick();
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_follow_is_reevaluated_after_each_directive() {
        let link = MockLink::new();
        let (clock, snapshot, mut rover) = rover(link.clone());
        show(&snapshot, "red_ball", 600, 40);

        rover.handle_utterance("follow the ball");
        rover.tick();
        assert_eq!(link.sent_actions(), vec!["turn_right"]);

        show(&snapshot, "red_ball", 320, 40);
        clock.advance(Duration::from_millis(300));
        rover.tick();
        assert_eq!(link.sent_actions(), vec!["turn_right", "move_forward"]);

        show(&snapshot, "red_ball", 320, 100);
        clock.advance(Duration::from_millis(500));
        rover.tick();
        clock.advance(Duration::from_millis(100));
        rover.tick();
        assert_eq!(
            link.sent_actions(),
            vec!["turn_right", "move_forward", "stop"]
        );
    }

    #[test]
    fn test_timeout_enters_autonomous_and_speech_leaves_it() {
        let link = MockLink::new();
        let (clock, snapshot, mut rover) = rover(link.clone());

        clock.advance(Duration::from_secs(30));
        rover.tick();
        assert_eq!(rover.mode(), DriveMode::Autonomous);
        assert_eq!(link.sent_actions(), vec!["turn_right"]);

        show(&snapshot, "person", 50, 80);
        clock.advance(Duration::from_millis(300));
        rover.tick();
        assert_eq!(link.sent_actions(), vec!["turn_right", "turn_left"]);

        rover.handle_utterance("mumble");
        assert_eq!(rover.mode(), DriveMode::Manual);
        clock.advance(Duration::from_secs(1));
        rover.tick();
        assert_eq!(link.sent().len(), 2);
    }

    #[test]
    fn test_ignored_speech_does_not_delay_autonomous() {
        let link = MockLink::new();
        let (clock, _snapshot, mut rover) = rover(link.clone());
        clock.advance(Duration::from_secs(20));
        rover.handle_utterance("what a lovely day");
        clock.advance(Duration::from_secs(15));
        rover.tick();
        assert_eq!(rover.mode(), DriveMode::Autonomous);
    }

    #[test]
    fn test_line_reader_forwards_until_eof() {
        let (tx, mut rx) = mpsc::channel(4);
        let input = std::io::Cursor::new(b"turn left\nstop\n".to_vec());
        let handle = spawn_line_reader(input, tx).unwrap();
        handle.join().unwrap();

        assert_eq!(rx.blocking_recv().as_deref(), Some("turn left"));
        assert_eq!(rx.blocking_recv().as_deref(), Some("stop"));
        assert_eq!(rx.blocking_recv(), None);
    }

    #[test]
    fn test_status_line_does_not_touch_link() {
        let link = MockLink::new();
        let (_clock, snapshot, rover) = rover(link.clone());
        show(&snapshot, "person", 320, 50);
        rover.log_status();
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_shutdown_sends_emergency_stop() {
        let link = MockLink::new();
        let (_clock, _snapshot, mut rover) = rover(link.clone());
        rover.shutdown();
        assert_eq!(link.sent_actions(), vec!["emergency_stop"]);
    }

    #[test]
    fn test_link_failures_do_not_stop_the_loop() {
        let (_clock, _snapshot, mut rover) = rover(MockLink::failing());
        rover.handle_utterance("move forward");
        rover.handle_utterance("move backward");
        rover.tick();
        rover.shutdown();
    }
}
