//! Constants for the secure module datagram protocol

// Command IDs
pub const CMD_SET_PINCODE: u8 = 0x03; // Store a new or upgraded pin code
pub const CMD_CHK_PINCODE: u8 = 0x04; // Verify a pin code
pub const CMD_BURN_KEYS: u8 = 0x05; // Burn a fresh keypair
pub const CMD_GET_WALLET: u8 = 0x24; // Fetch wallet public key
pub const CMD_SIGN_TX: u8 = 0x45; // Sign a transaction

// Status codes (16-bit, big-endian on the wire)
pub const STATUS_OK: u16 = 0x9000;
pub const STATUS_SYS_BUSY: u16 = 0x9001;
pub const STATUS_INVALID_PACKAGE: u16 = 0x9002;
pub const STATUS_UNKNOWN_COMMAND: u16 = 0x9003;
pub const STATUS_BAD_PACKAGE_LENGTH: u16 = 0x9004;
pub const STATUS_INVALID_SEQUENCE: u16 = 0x9005;
pub const STATUS_VERIFY_FAILED: u16 = 0x9006;
pub const STATUS_HARDWARE_FAULT: u16 = 0x9007;
pub const STATUS_ILLEGAL_OPERATION: u16 = 0x9008;
pub const STATUS_DEVICE_NOT_LOGGED_IN: u16 = 0x9045;
pub const STATUS_INVALID_ARG_LENGTH: u16 = 0x9056;
pub const STATUS_SECURE_STORAGE_EXCEPTION: u16 = 0x9057;

// Field sizes
pub const LEN_FIELD_SIZE: usize = 4; // length: i32
pub const SEQ_FIELD_SIZE: usize = 4; // sequence: i32
pub const STATUS_FIELD_SIZE: usize = 2; // statusCode: u16
pub const CMD_FIELD_SIZE: usize = 1; // commandId: u8
pub const ARG_LEN_FIELD_SIZE: usize = 4; // argLength: i32

/// Request header: length(4) + sequence(4) + commandId(1) + argLength(4)
pub const REQ_HEADER_SIZE: usize =
    LEN_FIELD_SIZE + SEQ_FIELD_SIZE + CMD_FIELD_SIZE + ARG_LEN_FIELD_SIZE;

/// Response header: length(4) + sequence(4) + statusCode(2) + commandId(1) + argLength(4)
pub const RESP_HEADER_SIZE: usize =
    LEN_FIELD_SIZE + SEQ_FIELD_SIZE + STATUS_FIELD_SIZE + CMD_FIELD_SIZE + ARG_LEN_FIELD_SIZE;

/// Largest datagram the secure module accepts or emits
pub const MAX_DATAGRAM_SIZE: usize = 2000;

// Timing defaults
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
