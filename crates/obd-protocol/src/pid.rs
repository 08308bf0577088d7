//! OBD-II PID Definitions and Response Parsing
//!
//! The Mode 01 parameters streamed to the dashboards and their decoding
//! formulas.

use crate::error::ObdError;
use crate::mode;
use serde::{Deserialize, Serialize};

/// Standard OBD-II PIDs for Mode 01 (current data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pid {
    /// Calculated engine load (0x04)
    EngineLoad = 0x04,
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
    /// Fuel tank level input (0x2F)
    FuelLevel = 0x2F,
}

impl Pid {
    /// Every PID the acquisition loop asks for, in polling order
    pub const ALL: [Pid; 6] = [
        Pid::Speed,
        Pid::Rpm,
        Pid::CoolantTemp,
        Pid::ThrottlePosition,
        Pid::EngineLoad,
        Pid::FuelLevel,
    ];

    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Look up a PID by its hex value
    pub fn from_hex(value: u8) -> Option<Pid> {
        Pid::ALL.into_iter().find(|pid| pid.as_hex() == value)
    }

    /// Get the number of response bytes for this PID
    pub fn response_bytes(&self) -> usize {
        match self {
            Pid::Rpm => 2,
            _ => 1,
        }
    }

    /// Mode 01 request string, e.g. `010C`
    pub fn request(&self) -> String {
        format!("{:02X}{:02X}", mode::CURRENT_DATA, self.as_hex())
    }
}

/// Response from a PID query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidResponse {
    /// The PID that was queried
    pub pid: Pid,
    /// Decoded value in engineering units
    pub value: f64,
    /// Raw data bytes from the response
    pub raw_bytes: Vec<u8>,
}

impl PidResponse {
    /// Create a new PID response by decoding raw data bytes
    pub fn decode(pid: Pid, raw_bytes: Vec<u8>) -> Result<Self, ObdError> {
        let value = Self::decode_value(pid, &raw_bytes).ok_or_else(|| {
            ObdError::InvalidResponse(format!(
                "PID {:02X} needs {} bytes, got {}",
                pid.as_hex(),
                pid.response_bytes(),
                raw_bytes.len()
            ))
        })?;
        Ok(Self {
            pid,
            value,
            raw_bytes,
        })
    }

    /// Decode the raw bytes to a value based on the PID formula
    fn decode_value(pid: Pid, bytes: &[u8]) -> Option<f64> {
        let a = *bytes.first()? as f64;
        let value = match pid {
            // RPM: ((A*256)+B)/4
            Pid::Rpm => (a * 256.0 + *bytes.get(1)? as f64) / 4.0,
            // Speed: A (km/h)
            Pid::Speed => a,
            // Coolant Temp: A - 40 (°C)
            Pid::CoolantTemp => a - 40.0,
            // Percentages: A * 100 / 255
            Pid::EngineLoad | Pid::ThrottlePosition | Pid::FuelLevel => a * 100.0 / 255.0,
        };
        Some(value)
    }

    /// Extract the data bytes for `pid` from an adapter reply.
    ///
    /// The reply may contain echo, `SEARCHING...`, spaces and line breaks;
    /// the first `41 <pid>` header found is used.
    pub fn parse(pid: Pid, reply: &str) -> Result<Self, ObdError> {
        let compact: String = reply
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '>')
            .collect::<String>()
            .to_ascii_uppercase();

        if compact.contains("NODATA") {
            return Err(ObdError::PidNotSupported(pid.as_hex()));
        }
        if compact.contains("UNABLETOCONNECT") {
            return Err(ObdError::VehicleNotConnected);
        }
        if compact.contains("CANERROR") || compact.contains("BUSERROR") {
            return Err(ObdError::CanBusError(compact));
        }

        let header = format!(
            "{:02X}{:02X}",
            mode::CURRENT_DATA + mode::RESPONSE_OFFSET,
            pid.as_hex()
        );
        let start = compact
            .find(&header)
            .ok_or_else(|| ObdError::InvalidResponse(compact.clone()))?
            + header.len();

        let data = &compact[start..];
        let bytes = (0..pid.response_bytes())
            .map(|i| {
                data.get(i * 2..i * 2 + 2)
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| ObdError::InvalidResponse(compact.clone()))?;

        Self::decode(pid, bytes)
    }
}

/// Decode a "PIDs supported" bitmask reply (`0100`, `0120`, ...).
///
/// `base` is the PID that was queried; bit 7 of the first byte stands for
/// `base + 1`.
pub fn decode_supported(base: u8, mask: &[u8]) -> Vec<u8> {
    mask.iter()
        .take(4)
        .enumerate()
        .flat_map(|(byte_idx, byte)| {
            (0..8u8).filter_map(move |bit| {
                let set = byte & (0x80 >> bit) != 0;
                set.then(|| base.wrapping_add(byte_idx as u8 * 8 + bit + 1))
            })
        })
        .collect()
}
