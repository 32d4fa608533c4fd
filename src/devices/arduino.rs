use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{SerialPort, SerialPortType};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Byte sent to the board to ask for its buffered readings
pub const REQUEST_MARKER: &[u8] = b"T";

/// Line the board sends after the last reading
pub const END_OF_TRANSMISSION: &str = "#";

#[derive(Error, Debug)]
pub enum ArduinoError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("No end of transmission within {0:?}")]
    Timeout(Duration),

    #[error("Received data is not valid UTF-8")]
    Decode,

    #[error("Connection closed before end of transmission")]
    Disconnected,

    #[error("Device not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ArduinoError>;

/// Line settings and timing for one fetch
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub read_timeout: Duration,  // bound on each individual read
    pub settle_delay: Duration,  // the board resets when the port opens
    pub transmission_deadline: Duration,
}

/// A serial port as shown to the user when picking one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub name: String,
    pub description: String,
}

pub struct Arduino {
    connection: Option<Box<dyn SerialPort>>,
    port_name: String,
    settings: SerialSettings,
}

impl Arduino {
    pub fn new(port_name: &str, settings: SerialSettings) -> Self {
        info!("Initializing Arduino on port {} at {} baud", port_name, settings.baud_rate);
        Arduino {
            connection: None,
            port_name: port_name.to_string(),
            settings,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        info!("Opening serial port {}", self.port_name);
        let port = serialport::new(&self.port_name, self.settings.baud_rate)
            .timeout(self.settings.read_timeout)
            .open()?;

        // Opening the port toggles DTR, which resets the board
        debug!("Waiting {:?} for the board to come out of reset", self.settings.settle_delay);
        std::thread::sleep(self.settings.settle_delay);

        self.connection = Some(port);
        info!("Arduino connected on {}", self.port_name);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!("Closed serial port {}", self.port_name);
        }
    }

    /// Ask the board for its readings and return them as newline separated text
    pub fn fetch_readings(&mut self) -> Result<String> {
        let deadline = self.settings.transmission_deadline;
        if let Some(port) = &mut self.connection {
            request_transmission(port, deadline)
        } else {
            error!("Attempted to fetch readings but Arduino is not connected");
            Err(ArduinoError::NotConnected)
        }
    }
}

/// Open `port_name`, run one request/response exchange and close the port again.
pub fn fetch_from_port(port_name: &str, settings: SerialSettings) -> Result<String> {
    let mut arduino = Arduino::new(port_name, settings);
    arduino.connect()?;
    let result = arduino.fetch_readings();
    arduino.disconnect();
    result
}

/// Send the request marker over `stream` and collect lines until the sentinel.
///
/// Every collected line is trimmed and terminated with `\n`. Anything the
/// board sends after the sentinel is left unread.
pub fn request_transmission<S: Read + Write>(stream: &mut S, deadline: Duration) -> Result<String> {
    stream.write_all(REQUEST_MARKER)?;
    stream.flush()?;
    debug!("Sent request marker");

    let started = Instant::now();
    let mut reader = BufReader::new(stream);
    let mut received = String::new();
    let mut raw = Vec::new();
    let mut lines = 0usize;

    loop {
        raw.clear();
        let n = match reader.read_until(b'\n', &mut raw) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                warn!("Serial read timed out after {} lines", lines);
                return Err(ArduinoError::Timeout(started.elapsed()));
            }
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            warn!("Serial stream ended after {} lines without end of transmission", lines);
            return Err(ArduinoError::Disconnected);
        }

        let line = std::str::from_utf8(&raw).map_err(|_| ArduinoError::Decode)?.trim();
        if line == END_OF_TRANSMISSION {
            break;
        }
        received.push_str(line);
        received.push('\n');
        lines += 1;

        if started.elapsed() >= deadline {
            warn!("Transmission exceeded {:?} after {} lines", deadline, lines);
            return Err(ArduinoError::Timeout(started.elapsed()));
        }
    }

    info!("Received {} lines from Arduino", lines);
    Ok(received)
}

/// List serial ports the OS knows about
pub fn list_ports() -> Result<Vec<PortEntry>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(info) => {
                    let mut d = format!("USB {:04x}:{:04x}", info.vid, info.pid);
                    if let Some(product) = info.product {
                        d.push(' ');
                        d.push_str(&product);
                    }
                    d
                }
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::Unknown => String::new(),
            };
            PortEntry { name: p.port_name, description }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggerConfig;
    use std::io::Cursor;

    struct MockPort {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
        time_out_when_drained: bool,
    }

    impl MockPort {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                written: Vec::new(),
                time_out_when_drained: false,
            }
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.input.read(buf)?;
            if n == 0 && self.time_out_when_drained {
                return Err(std::io::Error::new(ErrorKind::TimedOut, "Operation timed out"));
            }
            Ok(n)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    const DEADLINE: Duration = Duration::from_secs(5);

    #[test]
    fn test_collects_lines_until_sentinel() {
        let mut port = MockPort::new(b"2024,05,01,10,30,00,22.5,55\r\n2024,05,01,10,30,05,22.7,54\r\n#\r\n");
        let data = request_transmission(&mut port, DEADLINE).unwrap();

        assert_eq!(port.written, b"T");
        assert_eq!(data, "2024,05,01,10,30,00,22.5,55\n2024,05,01,10,30,05,22.7,54\n");
    }

    #[test]
    fn test_ignores_bytes_after_sentinel() {
        let mut port = MockPort::new(b"a\n#\nb\n");
        assert_eq!(request_transmission(&mut port, DEADLINE).unwrap(), "a\n");
    }

    #[test]
    fn test_sentinel_without_newline() {
        let mut port = MockPort::new(b"a\n  #");
        assert_eq!(request_transmission(&mut port, DEADLINE).unwrap(), "a\n");
    }

    #[test]
    fn test_empty_transmission() {
        let mut port = MockPort::new(b"#\n");
        assert_eq!(request_transmission(&mut port, DEADLINE).unwrap(), "");
    }

    #[test]
    fn test_stream_closed_before_sentinel() {
        let mut port = MockPort::new(b"2024,05,01,10,30,00,22.5,55\n");
        let err = request_transmission(&mut port, DEADLINE).unwrap_err();
        assert!(matches!(err, ArduinoError::Disconnected));
    }

    #[test]
    fn test_read_timeout() {
        let mut port = MockPort::new(b"partial line");
        port.time_out_when_drained = true;
        let err = request_transmission(&mut port, DEADLINE).unwrap_err();
        assert!(matches!(err, ArduinoError::Timeout(_)));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut port = MockPort::new(b"\xff\xfe\n#\n");
        let err = request_transmission(&mut port, DEADLINE).unwrap_err();
        assert!(matches!(err, ArduinoError::Decode));
    }

    #[test]
    fn test_deadline_exceeded() {
        let mut port = MockPort::new(b"noise\nnoise\n#\n");
        let err = request_transmission(&mut port, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ArduinoError::Timeout(_)));
    }

    #[test]
    fn test_fetch_without_connection() {
        let mut arduino = Arduino::new("/dev/null-port", LoggerConfig::default().serial_settings());
        assert!(matches!(arduino.fetch_readings(), Err(ArduinoError::NotConnected)));
    }
}
