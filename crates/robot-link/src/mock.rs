use crate::wire::{self, DriveMessage, StatusRequest};
use crate::{LinkError, MotorLink, Result};
use motion_policy::MotorDirective;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// In-process link that records every line it would have sent.
///
/// Clones share the same log, so a test can keep one clone and hand the other
/// to the code under test.
#[derive(Clone, Default)]
pub struct MockLink {
    sent: Arc<Mutex<Vec<String>>>,
    connected: bool,
    fail_sends: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail with an I/O error and drop the connection
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// Lines sent so far, newline stripped
    pub fn sent(&self) -> Vec<String> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// `action` field of each line sent so far
    pub fn sent_actions(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
            .filter_map(|v| v["action"].as_str().map(str::to_string))
            .collect()
    }

    fn record(&mut self, line: String) -> Result<()> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if self.fail_sends {
            self.connected = false;
            return Err(LinkError::Io("mock send failure".into()));
        }
        let mut guard = match self.sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(line.trim_end().to_string());
        Ok(())
    }
}

impl MotorLink for MockLink {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_directive(&mut self, directive: &MotorDirective) -> Result<()> {
        self.record(wire::encode_line(&DriveMessage::from_directive(directive))?)
    }

    fn emergency_stop(&mut self) -> Result<()> {
        self.record(wire::encode_line(&DriveMessage::emergency_stop(
            OffsetDateTime::now_utc(),
        ))?)
    }

    fn request_status(&mut self) -> Result<serde_json::Value> {
        self.record(wire::encode_line(&StatusRequest::new(OffsetDateTime::now_utc()))?)?;
        Ok(serde_json::json!({ "state": "mock", "connected": true }))
    }

    fn calibrate(&mut self, speed: i32) -> Result<()> {
        for msg in wire::calibration_sequence(speed) {
            self.record(wire::encode_line(&msg)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motion_policy::Maneuver;

    #[test]
    fn test_records_through_clone() {
        let probe = MockLink::new();
        let mut link = probe.clone();
        assert!(matches!(link.emergency_stop(), Err(LinkError::NotConnected)));

        link.connect().unwrap();
        let d = MotorDirective::new(Maneuver::TurnRight, 150, 0.3, OffsetDateTime::UNIX_EPOCH);
        link.send_directive(&d).unwrap();
        link.calibrate(150).unwrap();
        link.emergency_stop().unwrap();

        assert_eq!(
            probe.sent_actions(),
            vec!["turn_right", "calibrate", "calibrate", "calibrate", "emergency_stop"]
        );
    }

    #[test]
    fn test_failing_link_disconnects() {
        let mut link = MockLink::failing();
        link.connect().unwrap();
        assert!(link.emergency_stop().is_err());
        assert!(!link.is_connected());
        assert!(link.sent().is_empty());
    }
}
