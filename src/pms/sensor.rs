//! # Particulate Sensor Driver
//!
//! Command/response handling for a PMS-series sensor over a [`SensorPort`].

use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use super::parser::FrameParser;
use super::protocol::*;
use crate::error::{BeaconError, Result};
use crate::serial::SensorPort;

/// Default time the sensor needs to answer a read request
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(600);

/// Particulate sensor driver
///
/// Owns the port and a fixed receive buffer. Methods take `&mut self`, so
/// at most one transaction is in flight.
pub struct ParticulateSensor<P: SensorPort> {
    port: P,
    parser: FrameParser,
    response_delay: Duration,
}

impl<P: SensorPort> std::fmt::Debug for ParticulateSensor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticulateSensor")
            .field("parser", &self.parser)
            .field("response_delay", &self.response_delay)
            .finish_non_exhaustive()
    }
}

impl<P: SensorPort> ParticulateSensor<P> {
    pub fn new(port: P) -> Self {
        Self::with_response_delay(port, DEFAULT_RESPONSE_DELAY)
    }

    pub fn with_response_delay(port: P, response_delay: Duration) -> Self {
        Self {
            port,
            parser: FrameParser::new(),
            response_delay,
        }
    }

    /// Switch between passive (polled) and active (streaming) reporting
    pub async fn set_work_mode(&mut self, mode: WorkMode) -> Result<()> {
        let argument = match mode {
            WorkMode::Passive => 0,
            WorkMode::Active => 1,
        };
        self.send_command(CMD_SET_MODE, argument).await?;
        self.discard_input().await?;
        info!("Particulate sensor set to {:?} mode", mode);
        Ok(())
    }

    /// Start the fan and laser
    pub async fn wake(&mut self) -> Result<()> {
        self.send_command(CMD_SLEEP, 1).await?;
        debug!("Particulate sensor woken");
        Ok(())
    }

    /// Stop the fan and laser
    pub async fn sleep(&mut self) -> Result<()> {
        self.send_command(CMD_SLEEP, 0).await?;
        debug!("Particulate sensor put to sleep");
        Ok(())
    }

    /// Request one measurement and parse the answer (passive mode)
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent (`Transport`), too few
    /// bytes arrive (`InsufficientData`), or parsing fails.
    pub async fn request_read(&mut self) -> Result<ParticulateSample> {
        self.discard_input().await?;
        self.send_command(CMD_READ, 0).await?;
        sleep(self.response_delay).await;
        self.read_from_buffer().await
    }

    /// Parse whatever the sensor has already sent (active mode)
    pub async fn read_from_buffer(&mut self) -> Result<ParticulateSample> {
        self.parser.clear();
        loop {
            let spare = self.parser.spare_capacity();
            if spare.is_empty() {
                break;
            }
            let count = self
                .port
                .read_available(spare)
                .await
                .map_err(|e| BeaconError::Transport(format!("Failed to read sensor: {}", e)))?;
            if count == 0 {
                break;
            }
            self.parser.commit(count);
        }

        let result = self.parser.parse();
        self.discard_input().await?;
        result
    }

    async fn send_command(&mut self, command: u8, argument: u16) -> Result<()> {
        let frame = encode_command(command, argument);
        let written = self
            .port
            .write(&frame)
            .await
            .map_err(|e| BeaconError::Transport(format!("Failed to send command 0x{:02X}: {}", command, e)))?;

        if written != frame.len() {
            return Err(BeaconError::Transport(format!(
                "Short write for command 0x{:02X}: {} of {} bytes",
                command,
                written,
                frame.len()
            )));
        }
        Ok(())
    }

    async fn discard_input(&mut self) -> Result<()> {
        self.port
            .flush()
            .await
            .map_err(|e| BeaconError::Transport(format!("Failed to flush sensor port: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::mocks::MockSensorPort;

    fn sample() -> ParticulateSample {
        ParticulateSample::from_fields([3, 7, 9, 3, 7, 9, 600, 180, 40, 4, 1, 0])
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_read_sends_command_and_parses() {
        let port = MockSensorPort::new();
        port.queue_response(&encode_frame(&sample()));
        let mut sensor = ParticulateSensor::new(port.clone());

        assert_eq!(sensor.request_read().await.unwrap(), sample());
        assert_eq!(port.get_written_data(), vec![encode_command(CMD_READ, 0).to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_read_with_garbage_prefix() {
        let port = MockSensorPort::new();
        let mut response = vec![0x00, 0xFF, 0x42];
        response.extend_from_slice(&encode_frame(&sample()));
        port.queue_response(&response);
        let mut sensor = ParticulateSensor::new(port);

        assert_eq!(sensor.request_read().await.unwrap(), sample());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_read_no_answer() {
        let port = MockSensorPort::new();
        let mut sensor = ParticulateSensor::new(port);
        assert!(matches!(sensor.request_read().await, Err(BeaconError::InsufficientData(0))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_read_corrupt_answer() {
        let port = MockSensorPort::new();
        let mut frame = encode_frame(&sample());
        frame[5] ^= 0x10;
        port.queue_response(&frame);
        let mut sensor = ParticulateSensor::new(port);

        assert!(matches!(sensor.request_read().await, Err(BeaconError::Checksum { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_read_short_write() {
        let port = MockSensorPort::new();
        port.set_short_write(true);
        let mut sensor = ParticulateSensor::new(port);

        match sensor.request_read().await {
            Err(BeaconError::Transport(msg)) => assert!(msg.contains("Short write")),
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_read_write_error() {
        let port = MockSensorPort::new();
        port.set_write_error(std::io::ErrorKind::BrokenPipe);
        let mut sensor = ParticulateSensor::new(port);

        assert!(matches!(sensor.request_read().await, Err(BeaconError::Transport(_))));
    }

    #[tokio::test]
    async fn test_wake_sleep_and_mode_commands() {
        let port = MockSensorPort::new();
        let mut sensor = ParticulateSensor::new(port.clone());

        sensor.set_work_mode(WorkMode::Passive).await.unwrap();
        sensor.wake().await.unwrap();
        sensor.sleep().await.unwrap();
        sensor.set_work_mode(WorkMode::Active).await.unwrap();

        assert_eq!(
            port.get_written_data(),
            vec![
                encode_command(CMD_SET_MODE, 0).to_vec(),
                encode_command(CMD_SLEEP, 1).to_vec(),
                encode_command(CMD_SLEEP, 0).to_vec(),
                encode_command(CMD_SET_MODE, 1).to_vec(),
            ]
        );
        assert_eq!(port.flush_count(), 2);
    }

    #[tokio::test]
    async fn test_read_from_buffer_in_active_mode() {
        let port = MockSensorPort::new();
        port.rx_buffer.lock().unwrap().extend_from_slice(&encode_frame(&sample()));
        let mut sensor = ParticulateSensor::new(port);

        assert_eq!(sensor.read_from_buffer().await.unwrap(), sample());
    }
}
