//! Command opcodes and response status codes

use super::constants::*;
use std::fmt;

/// Operation requested from the secure module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandId {
    SetPinCode = CMD_SET_PINCODE,
    CheckPinCode = CMD_CHK_PINCODE,
    BurnKeypair = CMD_BURN_KEYS,
    GetWallet = CMD_GET_WALLET,
    SignTransaction = CMD_SIGN_TX,
}

impl CommandId {
    /// Wire opcode
    #[inline]
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Human-readable command name
    pub fn name(self) -> &'static str {
        match self {
            CommandId::SetPinCode => "SetPinCode",
            CommandId::CheckPinCode => "CheckPinCode",
            CommandId::BurnKeypair => "BurnKeypair",
            CommandId::GetWallet => "GetWallet",
            CommandId::SignTransaction => "SignTransaction",
        }
    }
}

impl TryFrom<u8> for CommandId {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            CMD_SET_PINCODE => Ok(CommandId::SetPinCode),
            CMD_CHK_PINCODE => Ok(CommandId::CheckPinCode),
            CMD_BURN_KEYS => Ok(CommandId::BurnKeypair),
            CMD_GET_WALLET => Ok(CommandId::GetWallet),
            CMD_SIGN_TX => Ok(CommandId::SignTransaction),
            other => Err(other),
        }
    }
}

/// Status reported by the secure module in every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Ok = STATUS_OK,
    SysBusy = STATUS_SYS_BUSY,
    InvalidPackage = STATUS_INVALID_PACKAGE,
    UnknownCommand = STATUS_UNKNOWN_COMMAND,
    BadPackageLength = STATUS_BAD_PACKAGE_LENGTH,
    InvalidSequence = STATUS_INVALID_SEQUENCE,
    VerifyFailed = STATUS_VERIFY_FAILED,
    HardwareFault = STATUS_HARDWARE_FAULT,
    IllegalOperation = STATUS_ILLEGAL_OPERATION,
    /// Device refuses service until logged in
    DeviceNotLoggedIn = STATUS_DEVICE_NOT_LOGGED_IN,
    InvalidArgLength = STATUS_INVALID_ARG_LENGTH,
    SecureStorageException = STATUS_SECURE_STORAGE_EXCEPTION,
}

impl StatusCode {
    /// Wire value
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    pub fn description(self) -> &'static str {
        match self {
            StatusCode::Ok => "request processed",
            StatusCode::SysBusy => "system busy",
            StatusCode::InvalidPackage => "invalid package",
            StatusCode::UnknownCommand => "unknown command",
            StatusCode::BadPackageLength => "bad package length",
            StatusCode::InvalidSequence => "invalid sequence number",
            StatusCode::VerifyFailed => "verification failed",
            StatusCode::HardwareFault => "hardware fault",
            StatusCode::IllegalOperation => "illegal operation",
            StatusCode::DeviceNotLoggedIn => "device not logged in, service denied",
            StatusCode::InvalidArgLength => "invalid argument length",
            StatusCode::SecureStorageException => "secure storage exception",
        }
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = u16;

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        let status = match value {
            STATUS_OK => StatusCode::Ok,
            STATUS_SYS_BUSY => StatusCode::SysBusy,
            STATUS_INVALID_PACKAGE => StatusCode::InvalidPackage,
            STATUS_UNKNOWN_COMMAND => StatusCode::UnknownCommand,
            STATUS_BAD_PACKAGE_LENGTH => StatusCode::BadPackageLength,
            STATUS_INVALID_SEQUENCE => StatusCode::InvalidSequence,
            STATUS_VERIFY_FAILED => StatusCode::VerifyFailed,
            STATUS_HARDWARE_FAULT => StatusCode::HardwareFault,
            STATUS_ILLEGAL_OPERATION => StatusCode::IllegalOperation,
            STATUS_DEVICE_NOT_LOGGED_IN => StatusCode::DeviceNotLoggedIn,
            STATUS_INVALID_ARG_LENGTH => StatusCode::InvalidArgLength,
            STATUS_SECURE_STORAGE_EXCEPTION => StatusCode::SecureStorageException,
            other => return Err(other),
        };
        Ok(status)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.description(), self.code())
    }
}
