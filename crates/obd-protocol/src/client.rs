//! OBD-II Client for ELM327 Adapters
//!
//! Provides async communication with OBD-II adapters over a serial port,
//! or over TCP for Wi-Fi adapters (`tcp://192.168.0.10:35000`).

use crate::error::ObdError;
use crate::mode;
use crate::pid::{decode_supported, Pid, PidResponse};
use crate::protocol::ObdProtocol;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default timeout for OBD commands
const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// ELM327 prompt terminating every reply
const PROMPT: u8 = b'>';

/// Device prefix selecting a Wi-Fi adapter
const TCP_SCHEME: &str = "tcp://";

/// Replies that answer any request
const NON_DATA_REPLIES: [&str; 4] = ["NODATA", "UNABLETOCONNECT", "ERROR", "?"];

/// Byte stream to an adapter
trait AdapterIo: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> AdapterIo for T {}

type AdapterPort = BufReader<Box<dyn AdapterIo>>;

/// Simulated adapter used instead of a serial port
#[derive(Debug, Default)]
struct MockAdapter {
    /// PIDs answered with NO DATA
    unsupported: HashSet<Pid>,
    /// PIDs that never answer
    stalled: HashSet<Pid>,
    /// Query counter driving the generated values
    queries: u64,
}

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient {
    /// Serial port device path (e.g., "/dev/ttyUSB0") or `tcp://host:port`
    device: String,
    /// Serial baud rate
    baud_rate: u32,
    /// OBD protocol to use
    protocol: ObdProtocol,
    /// Command timeout
    timeout: Duration,
    /// Whether the client is connected
    connected: bool,
    /// Open adapter stream, if any
    port: Option<AdapterPort>,
    /// Present in mock mode
    mock: Option<MockAdapter>,
}

impl ObdClient {
    /// Create a new OBD client
    ///
    /// # Arguments
    /// * `device` - Serial port device path
    /// * `baud_rate` - Baud rate for serial communication
    pub fn new(device: &str, baud_rate: u32) -> Self {
        info!("Creating OBD client for device: {} @ {} baud", device, baud_rate);

        Self {
            device: device.to_string(),
            baud_rate,
            protocol: ObdProtocol::Auto,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            connected: false,
            port: None,
            mock: None,
        }
    }

    /// Create a mock OBD client for testing (no hardware required)
    pub fn mock() -> Self {
        info!("Creating mock OBD client");
        Self {
            device: "mock".to_string(),
            baud_rate: 0,
            protocol: ObdProtocol::Can11Bit500,
            timeout: Duration::from_millis(100),
            connected: true,
            port: None,
            mock: Some(MockAdapter::default()),
        }
    }

    /// Bus protocol selected during [`initialize`](Self::initialize)
    pub fn with_protocol(mut self, protocol: ObdProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Make the mock adapter answer NO DATA for `pid`
    pub fn with_unsupported(mut self, pid: Pid) -> Self {
        if let Some(mock) = self.mock.as_mut() {
            mock.unsupported.insert(pid);
        }
        self
    }

    /// Make the mock adapter hang forever when asked for `pid`
    pub fn with_stalled(mut self, pid: Pid) -> Self {
        if let Some(mock) = self.mock.as_mut() {
            mock.stalled.insert(pid);
        }
        self
    }

    /// Whether this client talks to the simulated adapter
    pub fn is_mock(&self) -> bool {
        self.mock.is_some()
    }

    /// Open the port (if needed) and initialize the ELM327 adapter
    pub async fn initialize(&mut self) -> Result<(), ObdError> {
        if self.mock.is_some() {
            debug!("Mock mode: skipping initialization");
            self.connected = true;
            return Ok(());
        }

        info!("Initializing OBD adapter on {}", self.device);

        if self.port.is_none() {
            self.port = Some(BufReader::new(self.open().await?));
        }

        // Reset, echo off, linefeeds off, then select the bus protocol
        self.command("ATZ", None).await?;
        self.command("ATE0", None).await?;
        self.command("ATL0", None).await?;
        let protocol_cmd = self.protocol.to_elm_command();
        self.command(&protocol_cmd, None).await?;

        // Probe the vehicle; the first mode 01 request also triggers protocol search
        let header = positive_header(0x00);
        let reply = self.command("0100", Some(&header)).await?;
        if !compact(&reply).contains(&header) {
            self.connected = false;
            return Err(ObdError::VehicleNotConnected);
        }

        self.connected = true;
        info!("OBD adapter initialized successfully");
        Ok(())
    }

    /// Query a PID and return the decoded response
    pub async fn query_pid(&mut self, pid: Pid) -> Result<PidResponse, ObdError> {
        if !self.connected {
            return Err(ObdError::AdapterNotResponding);
        }

        if let Some(mock) = self.mock.as_mut() {
            if mock.stalled.contains(&pid) {
                std::future::pending::<()>().await;
            }
            if mock.unsupported.contains(&pid) {
                return Err(ObdError::PidNotSupported(pid.as_hex()));
            }
            mock.queries += 1;
            return PidResponse::decode(pid, mock_bytes(pid, mock.queries));
        }

        debug!("Querying PID {:02X}", pid.as_hex());
        let reply = self.command(&pid.request(), Some(&positive_header(pid.as_hex()))).await?;
        PidResponse::parse(pid, &reply)
    }

    /// PIDs the vehicle reports as supported, restricted to [`Pid::ALL`]
    pub async fn supported_pids(&mut self) -> Result<Vec<Pid>, ObdError> {
        if let Some(mock) = self.mock.as_ref() {
            return Ok(Pid::ALL
                .into_iter()
                .filter(|pid| !mock.unsupported.contains(pid))
                .collect());
        }

        let mut supported = Vec::new();
        for base in [0x00u8, 0x20] {
            let request = format!("01{:02X}", base);
            let reply = self.command(&request, Some(&positive_header(base))).await?;
            let mask = parse_mask(base, &reply)?;
            supported.extend(decode_supported(base, &mask));
        }

        Ok(Pid::ALL
            .into_iter()
            .filter(|pid| supported.contains(&pid.as_hex()))
            .collect())
    }

    /// Set command timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Check if client is connected
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Disconnect from the OBD adapter
    pub async fn disconnect(&mut self) {
        if self.connected {
            info!("Disconnecting OBD client");
            self.connected = false;
        }
        self.port = None;
    }

    async fn open(&self) -> Result<Box<dyn AdapterIo>, ObdError> {
        if let Some(addr) = self.device.strip_prefix(TCP_SCHEME) {
            let stream = tokio::time::timeout(self.timeout, TcpStream::connect(addr))
                .await
                .map_err(|_| ObdError::AdapterNotResponding)??;
            stream.set_nodelay(true)?;
            return Ok(Box::new(stream));
        }

        let stream = tokio_serial::new(&self.device, self.baud_rate)
            .timeout(self.timeout)
            .open_native_async()?;
        Ok(Box::new(stream))
    }

    /// Send one command and collect its reply up to the prompt.
    ///
    /// A reply that arrives after its command timed out is still in flight
    /// when the next command goes out. With `expect` set to the positive
    /// response header, such replies are skipped instead of being taken as
    /// the answer.
    async fn command(&mut self, cmd: &str, expect: Option<&str>) -> Result<String, ObdError> {
        let timeout = self.timeout;
        let port = self.port.as_mut().ok_or(ObdError::AdapterNotResponding)?;

        let result = async {
            // Anything still buffered belongs to an earlier command
            let stale = port.buffer().len();
            if stale > 0 {
                debug!("Discarding {} stale bytes from adapter", stale);
                port.consume(stale);
            }

            port.get_mut().write_all(format!("{}\r", cmd).as_bytes()).await?;
            port.get_mut().flush().await?;

            let reply = tokio::time::timeout(timeout, read_reply(&mut *port, expect))
                .await
                .map_err(|_| ObdError::Timeout(timeout.as_millis() as u64))??;
            Ok::<String, ObdError>(reply)
        }
        .await;

        if let Err(e) = &result {
            if e.is_disconnect() {
                warn!("OBD adapter on {} lost: {}", self.device, e);
                self.connected = false;
                self.port = None;
            }
        }
        result
    }
}

/// Read prompt-terminated replies until one answers `expect`
async fn read_reply(port: &mut AdapterPort, expect: Option<&str>) -> Result<String, ObdError> {
    loop {
        let mut buf = Vec::new();
        if port.read_until(PROMPT, &mut buf).await? == 0 {
            return Err(ObdError::AdapterNotResponding);
        }
        let reply = String::from_utf8_lossy(&buf).into_owned();
        match expect {
            Some(header) if !answers(&reply, header) => {
                debug!("Skipping stale adapter reply {:?}", reply.trim());
            }
            _ => return Ok(reply),
        }
    }
}

/// Mode 01 positive response header for `pid`, e.g. `410D`
fn positive_header(pid: u8) -> String {
    format!("{:02X}{:02X}", mode::CURRENT_DATA + mode::RESPONSE_OFFSET, pid)
}

fn compact(reply: &str) -> String {
    reply
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '>')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Whether `reply` is the answer to a request whose positive response
/// starts with `header`
fn answers(reply: &str, header: &str) -> bool {
    let compact = compact(reply);
    compact.contains(header) || NON_DATA_REPLIES.iter().any(|marker| compact.contains(marker))
}

/// Extract the four bitmask bytes from a `01xx` supported-PIDs reply
fn parse_mask(base: u8, reply: &str) -> Result<Vec<u8>, ObdError> {
    let compact = compact(reply);
    let header = positive_header(base);
    let start = compact
        .find(&header)
        .ok_or_else(|| ObdError::InvalidResponse(reply.trim().to_string()))?
        + header.len();

    (0..4)
        .map(|i| {
            compact
                .get(start + i * 2..start + i * 2 + 2)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        })
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| ObdError::InvalidResponse(reply.trim().to_string()))
}

/// Deterministic pseudo-random raw bytes for the mock adapter
fn mock_bytes(pid: Pid, seed: u64) -> Vec<u8> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    pid.hash(&mut hasher);
    let hash = hasher.finish();

    match pid {
        // RPM: 800-7000 RPM range
        Pid::Rpm => {
            let rpm = 800 + (hash % 6200) as u16;
            let encoded = rpm * 4;
            vec![(encoded >> 8) as u8, (encoded & 0xFF) as u8]
        }
        // Speed: 0-200 km/h
        Pid::Speed => vec![(hash % 200) as u8],
        // Coolant temp: 70-105°C (stored as value + 40)
        Pid::CoolantTemp => vec![(110 + (hash % 35)) as u8],
        // Throttle and load: whole range
        Pid::ThrottlePosition | Pid::EngineLoad => vec![(hash % 256) as u8],
        // Fuel level drains slowly from full
        Pid::FuelLevel => vec![255u8.saturating_sub((seed / 50).min(255) as u8)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// ELM327 stand-in on a TCP socket, answering one command at a time.
    /// The first `010D` is answered `late_by` after it arrives.
    async fn fake_adapter(late_by: Duration) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let device = format!("{}{}", TCP_SCHEME, listener.local_addr().unwrap());
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&commands);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut read = BufReader::new(read);
            let mut delayed = false;
            loop {
                let mut line = Vec::new();
                if read.read_until(b'\r', &mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let cmd = String::from_utf8_lossy(&line).trim().to_string();
                log.lock().unwrap().push(cmd.clone());

                let reply = match cmd.as_str() {
                    "ATZ" => "ELM327 v1.5",
                    c if c.starts_with("AT") => "OK",
                    "0100" => "SEARCHING...\r41 00 BE 3E B8 11",
                    "0105" => "41 05 7B",
                    "010C" => "41 0C 1A F8",
                    "010D" => "41 0D 32",
                    _ => "NO DATA",
                };
                if cmd == "010D" && !delayed {
                    delayed = true;
                    tokio::time::sleep(late_by).await;
                }
                let frame = format!("{}\r\r>", reply);
                if write.write_all(frame.as_bytes()).await.is_err() {
                    return;
                }
            }
        });

        (device, commands)
    }

    #[tokio::test]
    async fn test_mock_client_creation() {
        let client = ObdClient::mock();
        assert!(client.is_connected());
        assert!(client.is_mock());
    }

    #[tokio::test]
    async fn test_mock_pid_query() {
        let mut client = ObdClient::mock();
        let response = client.query_pid(Pid::Rpm).await.unwrap();
        assert_eq!(response.pid, Pid::Rpm);
        assert!(response.value >= 800.0 && response.value <= 7000.0);
    }

    #[tokio::test]
    async fn test_mock_unsupported_pid() {
        let mut client = ObdClient::mock().with_unsupported(Pid::FuelLevel);
        let err = client.query_pid(Pid::FuelLevel).await.unwrap_err();
        assert!(matches!(err, ObdError::PidNotSupported(0x2F)));

        let supported = client.supported_pids().await.unwrap();
        assert_eq!(supported.len(), Pid::ALL.len() - 1);
        assert!(!supported.contains(&Pid::FuelLevel));
    }

    #[tokio::test]
    async fn test_disconnected_mock_reports_adapter_loss() {
        let mut client = ObdClient::mock();
        client.disconnect().await;
        let err = client.query_pid(Pid::Speed).await.unwrap_err();
        assert!(err.is_disconnect());

        client.initialize().await.unwrap();
        assert!(client.query_pid(Pid::Speed).await.is_ok());
    }

    #[tokio::test]
    async fn test_tcp_adapter_initialization() {
        let (device, commands) = fake_adapter(Duration::ZERO).await;
        let mut client = ObdClient::new(&device, 0).with_protocol(ObdProtocol::Can11Bit500);
        client.initialize().await.unwrap();

        assert!(client.is_connected());
        assert_eq!(
            *commands.lock().unwrap(),
            vec!["ATZ", "ATE0", "ATL0", "ATSP6", "0100"]
        );
        let speed = client.query_pid(Pid::Speed).await.unwrap();
        assert_eq!(speed.value, 50.0);
    }

    #[tokio::test]
    async fn test_late_reply_does_not_shift_later_answers() {
        let (device, _commands) = fake_adapter(Duration::from_millis(300)).await;
        let mut client = ObdClient::new(&device, 0);
        client.set_timeout(Duration::from_millis(200));
        client.initialize().await.unwrap();

        let err = client.query_pid(Pid::Speed).await.unwrap_err();
        assert!(matches!(err, ObdError::Timeout(200)));
        assert!(client.is_connected());

        // The 41 0D reply lands while 010C is pending and must be skipped
        let rpm = client.query_pid(Pid::Rpm).await.unwrap();
        assert_eq!(rpm.pid, Pid::Rpm);
        assert!((rpm.value - 1726.0).abs() < 0.01);

        let coolant = client.query_pid(Pid::CoolantTemp).await.unwrap();
        assert!((coolant.value - 83.0).abs() < 0.01);
        let speed = client.query_pid(Pid::Speed).await.unwrap();
        assert_eq!(speed.value, 50.0);
    }

    #[tokio::test]
    async fn test_unreachable_tcp_adapter_is_a_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let device = format!("{}{}", TCP_SCHEME, listener.local_addr().unwrap());
        drop(listener);

        let mut client = ObdClient::new(&device, 0);
        let err = client.initialize().await.unwrap_err();
        assert!(err.is_disconnect());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_stale_reply_detection() {
        assert!(answers("41 0C 1A F8 \r\r>", "410C"));
        assert!(!answers("41 0D 32\r\r>", "410C"));
        assert!(!answers("STOPPED\r\r>", "410C"));
        assert!(answers("NO DATA\r\r>", "410C"));
        assert!(answers("?\r\r>", "410C"));
    }

    #[tokio::test]
    async fn test_serial_client_without_port_is_not_connected() {
        let mut client = ObdClient::new("/dev/does-not-exist", 38400);
        assert!(!client.is_connected());
        assert!(client.query_pid(Pid::Rpm).await.is_err());
    }

    #[test]
    fn test_parse_mask() {
        let mask = parse_mask(0x20, "41 20 80 02 00 01 \r\n>").unwrap();
        assert_eq!(mask, vec![0x80, 0x02, 0x00, 0x01]);
        let pids = decode_supported(0x20, &mask);
        assert!(pids.contains(&0x21));
        assert!(pids.contains(&0x2F));
        assert!(parse_mask(0x00, "NO DATA").is_err());
    }
}
