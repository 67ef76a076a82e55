use crate::wire::{self, DriveMessage, StatusRequest};
use crate::{LinkError, LinkMetrics, MotorLink, Result};
use motion_policy::MotorDirective;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Where the drive controller listens, and how patient to be with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub status_timeout_ms: u64,
    /// Pause between calibration steps
    pub calibrate_step_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 8080,
            connect_timeout_ms: 5000,
            status_timeout_ms: 2000,
            calibrate_step_ms: 500,
        }
    }
}

impl LinkConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Connection {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

/// Motor link over a plain TCP stream.
pub struct TcpLink {
    config: LinkConfig,
    conn: Option<Connection>,
    metrics: Option<LinkMetrics>,
}

impl TcpLink {
    /// Create an unconnected link; call [`MotorLink::connect`] before use.
    pub fn new(config: LinkConfig) -> Self {
        info!("Robot link configured for {}", config.address());
        Self {
            config,
            conn: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: LinkMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            info!("Disconnected from robot");
        }
        if let Some(m) = &self.metrics {
            m.connected.set(0);
        }
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let Some(conn) = self.conn.as_mut() else {
            if let Some(m) = &self.metrics {
                m.send_failures.inc();
            }
            return Err(LinkError::NotConnected);
        };
        let written = conn
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| conn.writer.flush());
        match written {
            Ok(()) => {
                debug!("sent {}", line.trim_end());
                if let Some(m) = &self.metrics {
                    m.lines_sent.inc();
                }
                Ok(())
            }
            Err(e) => {
                error!("Failed to send to robot: {e}");
                if let Some(m) = &self.metrics {
                    m.send_failures.inc();
                }
                self.disconnect();
                Err(e.into())
            }
        }
    }
}

impl MotorLink for TcpLink {
    fn connect(&mut self) -> Result<()> {
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let addrs = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| LinkError::Io(format!("resolve {}: {e}", self.config.address())))?;

        let mut last_err = LinkError::Io(format!("no address for {}", self.config.address()));
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    let reader = BufReader::new(stream.try_clone()?);
                    self.conn = Some(Connection {
                        writer: stream,
                        reader,
                    });
                    if let Some(m) = &self.metrics {
                        m.connects.inc();
                        m.connected.set(1);
                    }
                    info!("Connected to robot at {}", addr);
                    return Ok(());
                }
                Err(e) => last_err = e.into(),
            }
        }
        warn!("Failed to connect to robot at {}: {}", self.config.address(), last_err);
        Err(last_err)
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn send_directive(&mut self, directive: &MotorDirective) -> Result<()> {
        let line = wire::encode_line(&DriveMessage::from_directive(directive))?;
        self.write_line(&line)
    }

    fn emergency_stop(&mut self) -> Result<()> {
        let line = wire::encode_line(&DriveMessage::emergency_stop(OffsetDateTime::now_utc()))?;
        self.write_line(&line)
    }

    fn request_status(&mut self) -> Result<serde_json::Value> {
        let line = wire::encode_line(&StatusRequest::new(OffsetDateTime::now_utc()))?;
        self.write_line(&line)?;

        let timeout = Duration::from_millis(self.config.status_timeout_ms);
        let conn = self.conn.as_mut().ok_or(LinkError::NotConnected)?;
        conn.reader.get_ref().set_read_timeout(Some(timeout))?;
        let mut reply = String::new();
        let read = conn.reader.read_line(&mut reply);
        let _ = conn.reader.get_ref().set_read_timeout(None);
        match read {
            Ok(0) => {
                self.disconnect();
                Err(LinkError::Io("connection closed by robot".into()))
            }
            Ok(_) => wire::decode_reply(&reply),
            Err(e) => {
                // A late reply would otherwise be read as the answer to the next request
                self.disconnect();
                Err(e.into())
            }
        }
    }

    fn calibrate(&mut self, speed: i32) -> Result<()> {
        let step = Duration::from_millis(self.config.calibrate_step_ms);
        for msg in wire::calibration_sequence(speed) {
            self.write_line(&wire::encode_line(&msg)?)?;
            thread::sleep(step);
        }
        info!("Motor calibration completed");
        Ok(())
    }
}
