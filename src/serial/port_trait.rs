//! Trait abstraction for the sensor byte stream to enable testing

use async_trait::async_trait;
use std::io;

/// Trait for byte-stream I/O with a serial sensor
#[async_trait]
pub trait SensorPort: Send {
    /// Write data, returning the number of bytes accepted
    async fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Copy whatever is already buffered into `buf` without waiting
    async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Discard any pending received bytes
    async fn flush(&mut self) -> io::Result<()>;
}

/// Wrapper around tokio_serial::SerialStream that implements SensorPort
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self { port }
    }
}

#[async_trait]
impl SensorPort for TokioSerialPort {
    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await?;
        self.port.flush().await?;
        Ok(data.len())
    }

    async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        use tokio_serial::SerialPort;

        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))? as usize;
        let count = pending.min(buf.len());
        if count == 0 {
            return Ok(0);
        }
        self.port.read_exact(&mut buf[..count]).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio_serial::{ClearBuffer, SerialPort};
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock sensor port for testing
    ///
    /// Each write of a command pops the next queued response into the
    /// receive buffer, mimicking a sensor that answers requests.
    #[derive(Clone)]
    pub struct MockSensorPort {
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub responses: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub rx_buffer: Arc<Mutex<Vec<u8>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        pub short_write: Arc<Mutex<bool>>,
        pub flush_count: Arc<Mutex<usize>>,
    }

    impl MockSensorPort {
        pub fn new() -> Self {
            Self {
                written_data: Arc::new(Mutex::new(Vec::new())),
                responses: Arc::new(Mutex::new(VecDeque::new())),
                rx_buffer: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
                short_write: Arc::new(Mutex::new(false)),
                flush_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn queue_response(&self, bytes: &[u8]) {
            self.responses.lock().unwrap().push_back(bytes.to_vec());
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        pub fn set_short_write(&self, short: bool) {
            *self.short_write.lock().unwrap() = short;
        }

        pub fn flush_count(&self) -> usize {
            *self.flush_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl SensorPort for MockSensorPort {
        async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            if *self.short_write.lock().unwrap() {
                return Ok(data.len() / 2);
            }
            if let Some(response) = self.responses.lock().unwrap().pop_front() {
                self.rx_buffer.lock().unwrap().extend_from_slice(&response);
            }
            Ok(data.len())
        }

        async fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut rx = self.rx_buffer.lock().unwrap();
            let count = rx.len().min(buf.len());
            buf[..count].copy_from_slice(&rx[..count]);
            rx.drain(..count);
            Ok(count)
        }

        async fn flush(&mut self) -> io::Result<()> {
            self.rx_buffer.lock().unwrap().clear();
            *self.flush_count.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mock_answers_each_write() {
        let mut port = MockSensorPort::new();
        port.queue_response(&[1, 2, 3]);

        assert_eq!(port.write(&[0xAA]).await.unwrap(), 1);
        let mut buf = [0u8; 8];
        assert_eq!(port.read_available(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(port.read_available(&mut buf).await.unwrap(), 0);
    }
}
