//! Manual / autonomous mode switching for the control loop

use intent_parser::Command;
use motion_policy::{DriveMode, MotorDirective};
use std::time::{Duration, Instant};
use tracing::info;

pub trait Clock {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for tests
#[cfg(test)]
#[derive(Clone)]
pub(crate) struct ManualClock(std::rc::Rc<std::cell::Cell<Instant>>);

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self(std::rc::Rc::new(std::cell::Cell::new(Instant::now())))
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}

/// Tracks the drive mode, the vision behaviour currently in force, and when
/// the robot will be done with the last directive.
///
/// Manual mode falls back to autonomous once no command has been accepted
/// for `timeout`. Any accepted command returns to manual.
pub struct ModeController<C: Clock = SystemClock> {
    clock: C,
    timeout: Duration,
    mode: DriveMode,
    last_command_at: Instant,
    active: Option<Command>,
    busy_until: Option<Instant>,
    last_was_stop: bool,
}

impl<C: Clock> ModeController<C> {
    pub fn new(clock: C, timeout: Duration) -> Self {
        let now = clock.now();
        Self {
            clock,
            timeout,
            mode: DriveMode::Manual,
            last_command_at: now,
            active: None,
            busy_until: None,
            last_was_stop: false,
        }
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    /// The object-bearing command being re-evaluated every tick, if any
    pub fn active_command(&self) -> Option<&Command> {
        self.active.as_ref()
    }

    /// Record an accepted command. Object-bearing commands stay active until
    /// replaced; locomotion commands clear the active behaviour.
    pub fn accept(&mut self, command: &Command) {
        self.resume_manual();
        self.last_command_at = self.clock.now();
        self.busy_until = None;
        self.last_was_stop = false;
        self.active = command
            .action
            .is_object_bearing()
            .then(|| command.clone());
    }

    /// Leave autonomous mode on any utterance. In manual mode only an
    /// accepted command restarts the timeout.
    pub fn resume_manual(&mut self) {
        if self.mode != DriveMode::Autonomous {
            return;
        }
        info!("Voice command received, switching back to manual mode");
        self.mode = DriveMode::Manual;
        self.last_command_at = self.clock.now();
    }

    /// Switch to autonomous when the command timeout has run out.
    /// Returns true on the tick the switch happens.
    pub fn check_timeout(&mut self) -> bool {
        if self.mode != DriveMode::Manual {
            return false;
        }
        if self.clock.now().saturating_duration_since(self.last_command_at) < self.timeout {
            return false;
        }
        info!("No voice commands received, switching to autonomous mode");
        self.mode = DriveMode::Autonomous;
        self.active = None;
        self.busy_until = None;
        true
    }

    /// The previous directive is still running on the robot
    pub fn is_busy(&self) -> bool {
        self.busy_until
            .is_some_and(|until| self.clock.now() < until)
    }

    /// Decide whether `directive` goes on the wire, and if so note how long
    /// it keeps the robot busy. A stop right after a stop is dropped.
    pub fn should_send(&mut self, directive: &MotorDirective) -> bool {
        let stop = directive.is_stop();
        if stop && self.last_was_stop {
            return false;
        }
        self.last_was_stop = stop;
        let busy = Duration::from_secs_f32(directive.duration_s.max(0.0));
        self.busy_until = Some(self.clock.now() + busy);
        true
    }
}
