//! ELM327 Protocol Selection

use crate::ObdError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Bus protocols selectable with `ATSP`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObdProtocol {
    /// Let the adapter probe every protocol
    #[default]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (5 baud init)
    Iso9141,
    /// ISO 14230-4 KWP (5 baud init)
    Kwp2000Slow,
    /// ISO 14230-4 KWP (fast init)
    Kwp2000Fast,
    /// ISO 15765-4 CAN, 11 bit ID, 500 kbaud
    Can11Bit500,
    /// ISO 15765-4 CAN, 29 bit ID, 500 kbaud
    Can29Bit500,
    /// ISO 15765-4 CAN, 11 bit ID, 250 kbaud
    Can11Bit250,
    /// ISO 15765-4 CAN, 29 bit ID, 250 kbaud
    Can29Bit250,
}

impl ObdProtocol {
    /// Protocol number used by `ATSPn`
    pub fn elm_code(&self) -> u8 {
        match self {
            ObdProtocol::Auto => 0,
            ObdProtocol::J1850Pwm => 1,
            ObdProtocol::J1850Vpw => 2,
            ObdProtocol::Iso9141 => 3,
            ObdProtocol::Kwp2000Slow => 4,
            ObdProtocol::Kwp2000Fast => 5,
            ObdProtocol::Can11Bit500 => 6,
            ObdProtocol::Can29Bit500 => 7,
            ObdProtocol::Can11Bit250 => 8,
            ObdProtocol::Can29Bit250 => 9,
        }
    }

    /// The `ATSP` command selecting this protocol
    pub fn to_elm_command(&self) -> String {
        format!("ATSP{}", self.elm_code())
    }
}

impl FromStr for ObdProtocol {
    type Err = ObdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "0" => Ok(ObdProtocol::Auto),
            "j1850_pwm" | "1" => Ok(ObdProtocol::J1850Pwm),
            "j1850_vpw" | "2" => Ok(ObdProtocol::J1850Vpw),
            "iso9141" | "3" => Ok(ObdProtocol::Iso9141),
            "kwp2000_slow" | "4" => Ok(ObdProtocol::Kwp2000Slow),
            "kwp2000_fast" | "5" => Ok(ObdProtocol::Kwp2000Fast),
            "can11_bit500" | "6" => Ok(ObdProtocol::Can11Bit500),
            "can29_bit500" | "7" => Ok(ObdProtocol::Can29Bit500),
            "can11_bit250" | "8" => Ok(ObdProtocol::Can11Bit250),
            "can29_bit250" | "9" => Ok(ObdProtocol::Can29Bit250),
            other => Err(ObdError::UnsupportedProtocol(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elm_commands() {
        assert_eq!(ObdProtocol::Auto.to_elm_command(), "ATSP0");
        assert_eq!(ObdProtocol::Can11Bit500.to_elm_command(), "ATSP6");
    }

    #[test]
    fn test_parse() {
        assert_eq!("AUTO".parse::<ObdProtocol>().unwrap(), ObdProtocol::Auto);
        assert_eq!("7".parse::<ObdProtocol>().unwrap(), ObdProtocol::Can29Bit500);
        assert!("flexray".parse::<ObdProtocol>().is_err());
    }
}
