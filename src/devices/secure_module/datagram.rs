//! Datagram codec for the secure module protocol
//!
//! All fields are big-endian (network byte order).
//!
//! ```text
//! Request:
//! ┌────────────┬──────────────┬─────────┬───────────────┬──────────────┐
//! │ length i32 │ sequence i32 │ cmd u8  │ argLength i32 │ arg[argLen]  │
//! └────────────┴──────────────┴─────────┴───────────────┴──────────────┘
//!
//! Response:
//! ┌────────────┬──────────────┬────────────┬────────┬───────────────┬─────────────┐
//! │ length i32 │ sequence i32 │ status u16 │ cmd u8 │ argLength i32 │ arg[argLen] │
//! └────────────┴──────────────┴────────────┴────────┴───────────────┴─────────────┘
//! ```
//!
//! `length` always counts the whole datagram including itself. On decode the
//! declared `length` is checked against the size derived from `argLength`;
//! the derived size is authoritative.

use super::constants::{MAX_DATAGRAM_SIZE, REQ_HEADER_SIZE, RESP_HEADER_SIZE};
use super::status::{CommandId, StatusCode};

/// Structural failures while encoding or decoding a datagram
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Frame structure is impossible (short buffer, negative or oversized argLength, etc.)
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Declared length field disagrees with the derived size
    #[error("Length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        /// Value of the `length` field
        declared: i32,
        /// Size derived from header size plus argLength
        actual: i64,
    },

    /// Status code outside the fixed enumeration
    #[error("Unknown status code: 0x{0:04X}")]
    UnknownStatus(u16),

    /// Argument would push the datagram beyond the protocol maximum
    #[error("Argument of {len} bytes exceeds maximum of {max}")]
    ArgumentTooLarge {
        /// Argument length
        len: usize,
        /// Largest argument that fits in a datagram
        max: usize,
    },
}

/// Cursor over a big-endian byte slice. Callers check bounds first.
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn i32(&mut self) -> i32 {
        let v = i32::from_be_bytes([
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ]);
        self.pos += 4;
        v
    }

    fn u16(&mut self) -> u16 {
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

/// Checks an argument length against the datagram budget for a header size.
fn check_arg_len(len: usize, header: usize) -> Result<i32, FrameError> {
    let max = MAX_DATAGRAM_SIZE - header;
    if len > max {
        return Err(FrameError::ArgumentTooLarge { len, max });
    }
    // max < i32::MAX, cast cannot truncate
    Ok(len as i32)
}

// ============================================================================
// Request
// ============================================================================

/// Outbound datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDatagram {
    pub length: i32,
    pub sequence: i32,
    pub command: CommandId,
    pub arg_length: i32,
    pub arg: Vec<u8>,
}

impl RequestDatagram {
    /// Build a fully populated request.
    ///
    /// The argument is assigned first and both `arg_length` and `length`
    /// are derived from it afterwards.
    pub fn new(sequence: i32, command: CommandId, arg: Vec<u8>) -> Result<Self, FrameError> {
        let arg_length = check_arg_len(arg.len(), REQ_HEADER_SIZE)?;
        Ok(Self {
            length: REQ_HEADER_SIZE as i32 + arg_length,
            sequence,
            command,
            arg_length,
            arg,
        })
    }

    /// Size the datagram must have given its argument
    #[inline]
    pub fn expected_length(&self) -> i64 {
        REQ_HEADER_SIZE as i64 + self.arg.len() as i64
    }

    /// Serialize to wire bytes.
    ///
    /// Lengths are validated, never recomputed: a request whose `length` or
    /// `arg_length` disagrees with its argument is rejected.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        check_arg_len(self.arg.len(), REQ_HEADER_SIZE)?;
        if self.arg_length as i64 != self.arg.len() as i64 {
            return Err(FrameError::MalformedFrame(format!(
                "argLength {} does not match {} argument bytes",
                self.arg_length,
                self.arg.len()
            )));
        }
        if self.length as i64 != self.expected_length() {
            return Err(FrameError::LengthMismatch {
                declared: self.length,
                actual: self.expected_length(),
            });
        }

        let mut out = Vec::with_capacity(self.length as usize);
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.push(self.command.opcode());
        out.extend_from_slice(&self.arg_length.to_be_bytes());
        out.extend_from_slice(&self.arg);
        Ok(out)
    }

    /// Parse a request as the device would (diagnostics and test doubles)
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < REQ_HEADER_SIZE {
            return Err(FrameError::MalformedFrame(format!(
                "{} bytes, request header needs {}",
                bytes.len(),
                REQ_HEADER_SIZE
            )));
        }

        let mut r = FieldReader::new(bytes);
        let length = r.i32();
        let sequence = r.i32();
        let opcode = r.u8();
        let arg_length = r.i32();

        let real = validate_lengths(length, arg_length, REQ_HEADER_SIZE)?;
        let command = CommandId::try_from(opcode).map_err(|op| {
            FrameError::MalformedFrame(format!("unknown command 0x{:02X}", op))
        })?;
        let arg = take_arg(r.rest(), real - REQ_HEADER_SIZE)?;

        Ok(Self {
            length,
            sequence,
            command,
            arg_length,
            arg,
        })
    }
}

// ============================================================================
// Response
// ============================================================================

/// Inbound datagram. Only exists fully decoded and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDatagram {
    pub length: i32,
    pub sequence: i32,
    pub status: StatusCode,
    pub command: u8,
    pub arg: Vec<u8>,
}

impl ResponseDatagram {
    /// Build a response as the device would (test doubles)
    pub fn new(
        sequence: i32,
        status: StatusCode,
        command: u8,
        arg: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let arg_length = check_arg_len(arg.len(), RESP_HEADER_SIZE)?;
        Ok(Self {
            length: RESP_HEADER_SIZE as i32 + arg_length,
            sequence,
            status,
            command,
            arg,
        })
    }

    #[inline]
    pub fn arg_length(&self) -> i32 {
        self.arg.len() as i32
    }

    /// Serialize to wire bytes as the device would
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RESP_HEADER_SIZE + self.arg.len());
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.status.code().to_be_bytes());
        out.push(self.command);
        out.extend_from_slice(&self.arg_length().to_be_bytes());
        out.extend_from_slice(&self.arg);
        out
    }

    /// Decode and validate a complete response frame.
    ///
    /// Checks, in order: minimum header size, derived size not below the
    /// header (negative argLength), declared length equals derived size,
    /// buffer holds exactly the derived size, status code is known.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < RESP_HEADER_SIZE {
            return Err(FrameError::MalformedFrame(format!(
                "{} bytes, response header needs {}",
                bytes.len(),
                RESP_HEADER_SIZE
            )));
        }

        let mut r = FieldReader::new(bytes);
        let length = r.i32();
        let sequence = r.i32();
        let raw_status = r.u16();
        let command = r.u8();
        let arg_length = r.i32();

        let real = validate_lengths(length, arg_length, RESP_HEADER_SIZE)?;
        let arg = take_arg(r.rest(), real - RESP_HEADER_SIZE)?;
        let status = StatusCode::try_from(raw_status).map_err(FrameError::UnknownStatus)?;

        Ok(Self {
            length,
            sequence,
            status,
            command,
            arg,
        })
    }
}

/// Total response size derived from a fixed header's argLength.
///
/// Used by readers to know how many bytes complete the frame; the declared
/// `length` field is deliberately ignored here.
pub fn response_frame_len(header: &[u8]) -> Result<usize, FrameError> {
    if header.len() < RESP_HEADER_SIZE {
        return Err(FrameError::MalformedFrame(format!(
            "{} bytes, response header needs {}",
            header.len(),
            RESP_HEADER_SIZE
        )));
    }
    let arg_length = i32::from_be_bytes([header[11], header[12], header[13], header[14]]);
    derived_size(arg_length, RESP_HEADER_SIZE)
}

/// Header size plus argLength, rejecting sizes below the header or above the maximum
fn derived_size(arg_length: i32, header: usize) -> Result<usize, FrameError> {
    let real = header as i64 + arg_length as i64;
    if real < header as i64 {
        return Err(FrameError::MalformedFrame(format!(
            "real length {} below minimum {}",
            real, header
        )));
    }
    if real > MAX_DATAGRAM_SIZE as i64 {
        return Err(FrameError::MalformedFrame(format!(
            "real length {} above maximum {}",
            real, MAX_DATAGRAM_SIZE
        )));
    }
    Ok(real as usize)
}

fn validate_lengths(declared: i32, arg_length: i32, header: usize) -> Result<usize, FrameError> {
    let real = derived_size(arg_length, header)?;
    if declared as i64 != real as i64 {
        log::debug!(
            "Real length {} differs from length field {}",
            real,
            declared
        );
        return Err(FrameError::LengthMismatch {
            declared,
            actual: real as i64,
        });
    }
    Ok(real)
}

fn take_arg(rest: &[u8], arg_len: usize) -> Result<Vec<u8>, FrameError> {
    if rest.len() != arg_len {
        return Err(FrameError::MalformedFrame(format!(
            "argLength {} but {} argument bytes present",
            arg_len,
            rest.len()
        )));
    }
    Ok(rest.to_vec())
}
