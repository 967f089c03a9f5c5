//! Particulate sensor frame format
//!
//! Frame format (10 bytes):
//! - Head (1 byte): 0xAA
//! - Command (1 byte): 0xC0
//! - PM2.5 (2 bytes, little-endian) * 0.1 ug/m3
//! - PM10 (2 bytes, little-endian) * 0.1 ug/m3
//! - Device ID (2 bytes)
//! - Checksum (1 byte): low byte of the sum of bytes 2..=7
//! - Tail (1 byte): 0xAB

use crate::error::{Error, Result};

pub const FRAME_SIZE: usize = 10;
pub const FRAME_HEAD: u8 = 0xAA;
pub const FRAME_CMD: u8 = 0xC0;
pub const FRAME_TAIL: u8 = 0xAB;

/// One decoded measurement frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticulateFrame {
    /// PM2.5 concentration in ug/m3
    pub pm25: f64,
    /// PM10 concentration in ug/m3
    pub pm10: f64,
    pub device_id: u16,
}

impl ParticulateFrame {
    /// Parse and validate a complete frame
    pub fn parse(buf: &[u8; FRAME_SIZE]) -> Result<Self> {
        if buf[0] != FRAME_HEAD || buf[1] != FRAME_CMD {
            return Err(Error::InvalidPacket(format!(
                "Bad frame header: 0x{:02X} 0x{:02X}",
                buf[0], buf[1]
            )));
        }
        if buf[9] != FRAME_TAIL {
            return Err(Error::InvalidPacket(format!(
                "Bad frame tail: 0x{:02X}",
                buf[9]
            )));
        }

        let expected = checksum(&buf[2..8]);
        if buf[8] != expected {
            return Err(Error::InvalidPacket(format!(
                "Checksum mismatch: got 0x{:02X}, expected 0x{:02X}",
                buf[8], expected
            )));
        }

        Ok(ParticulateFrame {
            pm25: u16::from_le_bytes([buf[2], buf[3]]) as f64 / 10.0,
            pm10: u16::from_le_bytes([buf[4], buf[5]]) as f64 / 10.0,
            device_id: u16::from_le_bytes([buf[6], buf[7]]),
        })
    }
}

/// Low byte of the byte sum
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
