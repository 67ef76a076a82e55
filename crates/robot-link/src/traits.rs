use crate::Result;
use motion_policy::MotorDirective;

/// A blocking link to the rover's motor controller.
pub trait MotorLink {
    /// (Re)establish the connection.
    fn connect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Send one drive instruction.
    fn send_directive(&mut self, directive: &MotorDirective) -> Result<()>;

    /// Zero both wheels immediately.
    fn emergency_stop(&mut self) -> Result<()>;

    /// Ask the robot for its status and wait for the one-line reply.
    fn request_status(&mut self) -> Result<serde_json::Value>;

    /// Run the left / right / both calibration sequence at `speed`.
    fn calibrate(&mut self, speed: i32) -> Result<()>;
}
