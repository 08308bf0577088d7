//! GPS Receiver Access
//!
//! Reads position samples from one of three sources:
//! - a serial NMEA receiver (e.g. a USB or UART GPS module)
//! - an in-memory NMEA replay, for tests and recorded sessions
//! - a GeoJSON route simulator, for bench runs without a sky view

pub mod nmea;
pub mod route;

pub use route::RouteSimulator;

use nmea::Sentence;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Errors raised by a GPS source
#[derive(Debug, Error)]
pub enum GpsError {
    /// Serial port could not be opened or read
    #[error("Serial port error: {0}")]
    Serial(String),

    /// The receiver stopped producing data
    #[error("GPS receiver disconnected")]
    Disconnected,

    /// Route file problem
    #[error("Route error: {0}")]
    Route(String),

    /// I/O error reading a route file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Route file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tokio_serial::Error> for GpsError {
    fn from(err: tokio_serial::Error) -> Self {
        GpsError::Serial(err.to_string())
    }
}

/// One reading from the receiver; position may be missing without a fix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSample {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Altitude above mean sea level (m)
    pub altitude: Option<f64>,
    /// Ground speed (m/s)
    pub speed: Option<f64>,
    /// Course over ground (degrees)
    pub heading: Option<f64>,
    pub satellites: Option<u8>,
    pub hdop: Option<f64>,
}

impl PositionSample {
    /// Sample with a position and nothing else
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }
}

enum Source {
    Serial {
        device: String,
        baud_rate: u32,
        reader: Option<BufReader<SerialStream>>,
    },
    Replay(VecDeque<String>),
    Route(RouteSimulator),
}

/// A GPS receiver producing [`PositionSample`]s
pub struct GpsReceiver {
    source: Source,
    /// Most recent GGA data, merged into the next RMC sample
    last_gga: Option<nmea::Gga>,
}

impl GpsReceiver {
    /// Receiver on a serial NMEA device; the port is opened on first read
    pub fn serial(device: &str, baud_rate: u32) -> Self {
        info!("Creating GPS receiver on {} @ {} baud", device, baud_rate);
        Self::with_source(Source::Serial {
            device: device.to_string(),
            baud_rate,
            reader: None,
        })
    }

    /// Receiver replaying the given NMEA lines, one call consuming up to the next RMC
    pub fn replay<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_source(Source::Replay(lines.into_iter().map(Into::into).collect()))
    }

    /// Receiver driven by a route simulator
    pub fn route(simulator: RouteSimulator) -> Self {
        Self::with_source(Source::Route(simulator))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            last_gga: None,
        }
    }

    /// Read the next sample.
    ///
    /// `Ok(None)` means the source has nothing for this cycle.
    pub async fn read_sample(&mut self) -> Result<Option<PositionSample>, GpsError> {
        match &mut self.source {
            Source::Route(sim) => Ok(Some(sim.next_sample())),
            Source::Replay(lines) => {
                while let Some(line) = lines.pop_front() {
                    if let Some(sample) = Self::absorb(&mut self.last_gga, &line) {
                        return Ok(Some(sample));
                    }
                }
                Ok(None)
            }
            Source::Serial {
                device,
                baud_rate,
                reader,
            } => {
                if reader.is_none() {
                    let stream = tokio_serial::new(device.as_str(), *baud_rate).open_native_async()?;
                    info!("GPS serial port {} opened", device);
                    *reader = Some(BufReader::new(stream));
                }

                let Some(port) = reader.as_mut() else {
                    return Err(GpsError::Disconnected);
                };
                let mut line = String::new();
                loop {
                    line.clear();
                    let read = match port.read_line(&mut line).await {
                        Ok(n) => n,
                        Err(e) => {
                            warn!("GPS read on {} failed: {}", device, e);
                            *reader = None;
                            return Err(GpsError::Serial(e.to_string()));
                        }
                    };
                    if read == 0 {
                        *reader = None;
                        return Err(GpsError::Disconnected);
                    }
                    if let Some(sample) = Self::absorb(&mut self.last_gga, &line) {
                        return Ok(Some(sample));
                    }
                }
            }
        }
    }

    /// Feed one NMEA line; returns a sample when an RMC completes one
    fn absorb(last_gga: &mut Option<nmea::Gga>, line: &str) -> Option<PositionSample> {
        match nmea::parse_sentence(line)? {
            Sentence::Gga(gga) => {
                *last_gga = Some(gga);
                None
            }
            Sentence::Rmc(rmc) => {
                if !rmc.valid {
                    debug!("GPS: no valid fix yet");
                    return Some(PositionSample::default());
                }
                let gga = last_gga.take();
                Some(PositionSample {
                    latitude: rmc.latitude,
                    longitude: rmc.longitude,
                    altitude: gga.as_ref().and_then(|g| g.altitude),
                    speed: rmc.speed,
                    heading: rmc.course,
                    satellites: gga.as_ref().and_then(|g| g.satellites),
                    hdop: gga.as_ref().and_then(|g| g.hdop),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";

    #[tokio::test]
    async fn test_replay_merges_gga_into_rmc() {
        let mut gps = GpsReceiver::replay([GGA, RMC]);
        let sample = gps.read_sample().await.unwrap().unwrap();
        assert!((sample.latitude.unwrap() - 48.1173).abs() < 1e-4);
        assert_eq!(sample.altitude, Some(545.4));
        assert_eq!(sample.satellites, Some(8));
        assert_eq!(sample.heading, Some(84.4));

        assert_eq!(gps.read_sample().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_void_fix_has_no_position() {
        let mut gps = GpsReceiver::replay(["$GNRMC,001031.00,V,,,,,,,060180,,,N"]);
        let sample = gps.read_sample().await.unwrap().unwrap();
        assert_eq!(sample.latitude, None);
        assert_eq!(sample.longitude, None);
    }

    #[tokio::test]
    async fn test_route_source_always_yields() {
        let sim = RouteSimulator::new(vec![(38.16, -122.45)], Duration::from_secs(1)).unwrap();
        let mut gps = GpsReceiver::route(sim);
        for _ in 0..3 {
            let sample = gps.read_sample().await.unwrap().unwrap();
            assert_eq!(sample.latitude, Some(38.16));
        }
    }

    #[tokio::test]
    async fn test_missing_serial_device_errors() {
        let mut gps = GpsReceiver::serial("/dev/does-not-exist", 9600);
        assert!(gps.read_sample().await.is_err());
    }
}
