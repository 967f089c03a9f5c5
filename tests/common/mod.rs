//! Shared helpers: an in-memory secure module and sensor frame builders

#![allow(dead_code)]

use raksha_io::config::{SecureModuleConfig, SensorConfig};
use raksha_io::devices::particulate::frame::{
    checksum, FRAME_CMD, FRAME_HEAD, FRAME_SIZE, FRAME_TAIL,
};
use raksha_io::devices::secure_module::{
    RequestDatagram, ResponseDatagram, RetryPolicy, SecureModule, StatusCode,
};
use raksha_io::transport::mock::{MockConnector, MockTransport};
use raksha_io::CancelToken;

/// Encode a response to `req` as the device would
pub fn reply(req: &RequestDatagram, status: StatusCode, arg: Vec<u8>) -> Vec<u8> {
    ResponseDatagram::new(req.sequence, status, req.command.opcode(), arg)
        .unwrap()
        .encode()
}

/// Mock secure module: written bytes are reassembled into requests, and
/// each complete request is decoded and handed to `handler`
pub fn device<F>(mut handler: F) -> MockConnector
where
    F: FnMut(&RequestDatagram) -> Vec<u8> + Send + 'static,
{
    let mut pending: Vec<u8> = Vec::new();
    let transport = MockTransport::with_responder(move |chunk| {
        pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while pending.len() >= 4 {
            let len = i32::from_be_bytes([pending[0], pending[1], pending[2], pending[3]]);
            let len = usize::try_from(len).unwrap_or(0).max(4);
            if pending.len() < len {
                break;
            }
            let frame: Vec<u8> = pending.drain(..len).collect();
            if let Ok(req) = RequestDatagram::decode(&frame) {
                out.extend(handler(&req));
            }
        }
        out
    });
    MockConnector::new(transport)
}

/// Device answering OK and echoing the argument back
pub fn echo_device() -> MockConnector {
    device(|req| reply(req, StatusCode::Ok, req.arg.clone()))
}

/// Short timeouts so failure paths finish quickly
pub fn module_config(policy: RetryPolicy) -> SecureModuleConfig {
    SecureModuleConfig {
        port: "mock".to_string(),
        read_timeout_ms: 200,
        poll_interval_ms: 5,
        retry_delay_ms: 10,
        retry_policy: policy,
        ..SecureModuleConfig::default()
    }
}

pub fn module(connector: MockConnector) -> SecureModule<MockConnector> {
    SecureModule::from_config(
        connector,
        &module_config(RetryPolicy::Bounded(0)),
        CancelToken::new(),
    )
}

/// Split a concatenated write log back into request frames
pub fn parse_requests(mut bytes: &[u8]) -> Vec<RequestDatagram> {
    let mut requests = Vec::new();
    while !bytes.is_empty() {
        let len = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        requests.push(RequestDatagram::decode(&bytes[..len]).unwrap());
        bytes = &bytes[len..];
    }
    requests
}

pub fn sensor_config() -> SensorConfig {
    SensorConfig {
        port: "mock".to_string(),
        read_timeout_ms: 100,
        poll_interval_ms: 5,
        retry_delay_ms: 10,
        sample_interval_ms: 5,
        ..SensorConfig::default()
    }
}

/// Valid sensor frame for readings given in tenths of ug/m3
pub fn sensor_frame(pm25_tenths: u16, pm10_tenths: u16) -> [u8; FRAME_SIZE] {
    let mut buf = [0u8; FRAME_SIZE];
    buf[0] = FRAME_HEAD;
    buf[1] = FRAME_CMD;
    buf[2..4].copy_from_slice(&pm25_tenths.to_le_bytes());
    buf[4..6].copy_from_slice(&pm10_tenths.to_le_bytes());
    buf[6..8].copy_from_slice(&[0x60, 0xA1]);
    buf[8] = checksum(&buf[2..8]);
    buf[9] = FRAME_TAIL;
    buf
}
