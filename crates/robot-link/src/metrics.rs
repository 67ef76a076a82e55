use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Counters for traffic on the motor link.
#[derive(Clone)]
pub struct LinkMetrics {
    pub registry: Registry,
    pub lines_sent: IntCounter,
    pub send_failures: IntCounter,
    pub connects: IntCounter,
    pub connected: IntGauge,
}

impl LinkMetrics {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let lines_sent = IntCounter::new("rover_link_lines_sent", "JSON lines written to the robot")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let send_failures =
            IntCounter::new("rover_link_send_failures", "Writes that failed or had no link")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let connects = IntCounter::new("rover_link_connects", "Successful connections")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let connected = IntGauge::new("rover_link_connected", "1 while the link is up")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let _ = registry.register(Box::new(lines_sent.clone()));
        let _ = registry.register(Box::new(send_failures.clone()));
        let _ = registry.register(Box::new(connects.clone()));
        let _ = registry.register(Box::new(connected.clone()));
        Ok(Self {
            registry,
            lines_sent,
            send_failures,
            connects,
            connected,
        })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
