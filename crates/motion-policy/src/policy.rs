//! Command + snapshot -> motor directive

use crate::profiles::{
    Steer, VisionProfile, AUTONOMOUS_PROFILE, AVOID_PROFILE, FIND_PROFILE, FOLLOW_PROFILE,
};
use crate::{DriveMode, Maneuver, MotorDirective, PolicyConfig};
use intent_parser::{Action, Command, DurationUnit, SpeedQualifier};
use perception::{DetectedObject, Detections, Direction};
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Stateless decision maker. Safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct MovementPolicy {
    config: PolicyConfig,
}

impl MovementPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Decide the next directive, stamped with the current time.
    pub fn decide(
        &self,
        mode: DriveMode,
        command: Option<&Command>,
        snapshot: &Detections,
    ) -> Option<MotorDirective> {
        self.decide_at(mode, command, snapshot, OffsetDateTime::now_utc())
    }

    /// Decide the next directive.
    ///
    /// Returns `None` when there is nothing to do: manual mode without a
    /// command, or a command whose action is `Unknown`.
    pub fn decide_at(
        &self,
        mode: DriveMode,
        command: Option<&Command>,
        snapshot: &Detections,
        at: OffsetDateTime,
    ) -> Option<MotorDirective> {
        if mode == DriveMode::Autonomous {
            let target = snapshot.largest(None);
            return Some(self.steer(
                &AUTONOMOUS_PROFILE,
                target,
                snapshot,
                self.config.base_speed,
                at,
            ));
        }

        let command = command?;
        let speed = self.speed_for(command);
        match command.action {
            Action::FindObject => Some(self.track(&FIND_PROFILE, command, snapshot, speed, at)),
            Action::FollowObject => Some(self.track(&FOLLOW_PROFILE, command, snapshot, speed, at)),
            Action::AvoidObstacle => Some(self.track(&AVOID_PROFILE, command, snapshot, speed, at)),
            Action::Unknown => {
                warn!("Cannot execute unknown command");
                None
            }
            action => {
                let maneuver = Maneuver::from_action(action)?;
                let duration = self.duration_for(maneuver, command);
                Some(MotorDirective::new(maneuver, speed, duration, at))
            }
        }
    }

    /// Base PWM scaled by the spoken speed qualifier, truncated toward zero
    pub fn speed_for(&self, command: &Command) -> i32 {
        let factor = match command.speed() {
            Some(SpeedQualifier::Slow) => self.config.slow_factor,
            Some(SpeedQualifier::Fast) => self.config.fast_factor,
            None => 1.0,
        };
        let speed = (f64::from(self.config.base_speed) * factor) as i32;
        speed.min(self.config.max_power).max(0)
    }

    /// Spoken duration in seconds (minutes scaled), or the maneuver default.
    /// A spoken zero falls back to the default as well.
    fn duration_for(&self, maneuver: Maneuver, command: &Command) -> f32 {
        let spoken = command.duration().and_then(|(amount, unit)| {
            let seconds = match unit {
                DurationUnit::Minute => amount.saturating_mul(60),
                DurationUnit::Second | DurationUnit::Meter | DurationUnit::Step => amount,
            };
            (seconds > 0).then_some(seconds as f32)
        });

        match maneuver {
            Maneuver::Stop => 0.0,
            Maneuver::MoveForward | Maneuver::MoveBackward => {
                spoken.unwrap_or(self.config.move_duration_s)
            }
            Maneuver::TurnLeft | Maneuver::TurnRight => {
                spoken.unwrap_or(self.config.turn_duration_s)
            }
        }
    }

    fn track(
        &self,
        profile: &VisionProfile,
        command: &Command,
        snapshot: &Detections,
        speed: i32,
        at: OffsetDateTime,
    ) -> MotorDirective {
        let target = match command.object() {
            Some(name) => snapshot.find(name),
            // No name: whatever is first in view
            None => snapshot.find(""),
        };
        self.steer(profile, target, snapshot, speed, at)
    }

    fn steer(
        &self,
        profile: &VisionProfile,
        target: Option<&DetectedObject>,
        snapshot: &Detections,
        speed: i32,
        at: OffsetDateTime,
    ) -> MotorDirective {
        let Some(target) = target else {
            debug!("{}: target not in view, searching", profile.name);
            return MotorDirective::new(Maneuver::TurnRight, speed, profile.search_s, at);
        };

        let direction = snapshot.direction_of(target);
        let near = target.area >= profile.proximity_area;
        debug!(
            "{}: {} to the {} (area {})",
            profile.name, target.name, direction, target.area
        );

        let (maneuver, duration) = match (profile.steer, direction) {
            (Steer::Toward, Direction::Left) => (Maneuver::TurnLeft, profile.turn_s),
            (Steer::Toward, Direction::Right) => (Maneuver::TurnRight, profile.turn_s),
            (Steer::Toward, Direction::Center) => match profile.approach_s {
                Some(approach) if !near => (Maneuver::MoveForward, approach),
                _ => (Maneuver::Stop, 0.0),
            },
            (Steer::Away, Direction::Left) => (Maneuver::TurnRight, profile.turn_s),
            (Steer::Away, Direction::Right) => (Maneuver::TurnLeft, profile.turn_s),
            (Steer::Away, Direction::Center) => match profile.approach_s {
                Some(approach) if !near => (Maneuver::MoveForward, approach),
                _ => (Maneuver::TurnRight, profile.turn_s),
            },
        };
        MotorDirective::new(maneuver, speed, duration, at)
    }
}
