//! Secure module exchanges against an in-memory device
//!
//! Run with: `cargo test --test secure_module`

mod common;

use common::{device, echo_device, module, module_config, parse_requests, reply};
use raksha_io::devices::secure_module::{
    CommandId, FrameError, ResponseDatagram, RetryPolicy, SecureModule, StatusCode,
};
use raksha_io::config::SecureModuleConfig;
use raksha_io::{CancelToken, Connector, Error, Transport};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Sequencing
// ============================================================================

#[test]
fn test_sequence_strictly_increasing_from_one() {
    let connector = echo_device();
    let module = module(connector.clone());

    for _ in 0..10 {
        module.burn_keypair().unwrap();
    }

    let sequences: Vec<i32> = parse_requests(&connector.transport().get_written())
        .iter()
        .map(|r| r.sequence)
        .collect();
    assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
    assert_eq!(module.executor().last_sequence(), 10);
}

#[test]
fn test_stale_sequence_rejected() {
    let mut calls = 0;
    let connector = device(move |req| {
        calls += 1;
        // Sixth request gets the answer to the fifth
        let sequence = if calls == 6 { req.sequence - 1 } else { req.sequence };
        ResponseDatagram::new(sequence, StatusCode::Ok, req.command.opcode(), vec![0xEE])
            .unwrap()
            .encode()
    });
    let module = module(connector);

    for _ in 0..5 {
        module.get_wallet_public_key().unwrap();
    }
    let err = module.get_wallet_public_key().unwrap_err();
    assert!(
        matches!(err, Error::SequenceMismatch { expected: 6, actual: 5 }),
        "{err}"
    );

    // Link is still usable and numbering continues
    module.get_wallet_public_key().unwrap();
    assert_eq!(module.executor().last_sequence(), 7);
}

#[test]
fn test_command_echo_mismatch_rejected() {
    let connector = device(|req| {
        ResponseDatagram::new(req.sequence, StatusCode::Ok, CommandId::GetWallet.opcode(), vec![])
            .unwrap()
            .encode()
    });
    let module = module(connector);

    let err = module.set_pin_code("1234").unwrap_err();
    assert!(matches!(
        err,
        Error::CommandMismatch {
            expected: 0x03,
            actual: 0x24
        }
    ));
}

// ============================================================================
// Payloads and device status
// ============================================================================

#[test]
fn test_operations_send_expected_frames() {
    let connector = echo_device();
    let module = module(connector.clone());

    module.set_pin_code("1234").unwrap();
    module.check_pin_code("1234").unwrap();
    module.burn_keypair().unwrap();

    let requests = parse_requests(&connector.transport().get_written());
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].command, CommandId::SetPinCode);
    assert_eq!(requests[0].arg, b"1234");
    assert_eq!(requests[0].arg_length, 4);
    assert_eq!(requests[0].length, 13 + 4);
    assert_eq!(requests[1].command, CommandId::CheckPinCode);
    assert_eq!(requests[2].command, CommandId::BurnKeypair);
    assert!(requests[2].arg.is_empty());
}

#[test]
fn test_wallet_and_sign_payloads() {
    let public_key: Vec<u8> = (0..33).collect();
    let key = public_key.clone();
    let connector = device(move |req| match req.command {
        CommandId::GetWallet => reply(req, StatusCode::Ok, key.clone()),
        CommandId::SignTransaction => {
            reply(req, StatusCode::Ok, req.arg.iter().rev().copied().collect())
        }
        _ => reply(req, StatusCode::UnknownCommand, vec![]),
    });
    let module = module(connector);

    assert_eq!(module.get_wallet_public_key().unwrap(), public_key);
    assert_eq!(
        module.sign_transaction(&[1, 2, 3, 4]).unwrap(),
        vec![4, 3, 2, 1]
    );
}

#[test]
fn test_device_rejection_surfaces_status() {
    let connector = device(|req| match req.command {
        CommandId::CheckPinCode if req.arg != b"0000" => {
            reply(req, StatusCode::VerifyFailed, vec![])
        }
        _ => reply(req, StatusCode::Ok, vec![]),
    });
    let module = module(connector);

    module.check_pin_code("0000").unwrap();
    let err = module.check_pin_code("9999").unwrap_err();
    assert!(matches!(err, Error::Device(StatusCode::VerifyFailed)));
    assert!(!err.is_retryable());
}

#[test]
fn test_busy_device_is_retryable() {
    let connector = device(|req| reply(req, StatusCode::SysBusy, vec![]));
    let module = module(connector);

    let err = module.burn_keypair().unwrap_err();
    assert!(matches!(err, Error::Device(StatusCode::SysBusy)));
    assert!(err.is_retryable());
}

#[test]
fn test_unknown_opcode_not_implemented() {
    let connector = echo_device();
    let module = module(connector.clone());

    let err = module.execute_raw(0x99, &[]).unwrap_err();
    assert!(matches!(err, Error::NotImplemented(0x99)));
    assert_eq!(connector.attempts(), 0);
    assert!(connector.transport().writes().is_empty());

    assert_eq!(module.execute_raw(0x45, &[7]).unwrap(), vec![7]);
}

// ============================================================================
// Response validation
// ============================================================================

#[test]
fn test_declared_length_mismatch_rejected() {
    let connector = device(|req| {
        let mut response =
            ResponseDatagram::new(req.sequence, StatusCode::Ok, req.command.opcode(), vec![1, 2])
                .unwrap();
        response.length += 3;
        response.encode()
    });
    let module = module(connector);

    let err = module.get_wallet_public_key().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidResponse(FrameError::LengthMismatch { .. })
    ));
}

#[test]
fn test_oversized_arg_length_rejected_from_header() {
    let connector = device(|req| {
        let mut bytes = reply(req, StatusCode::Ok, vec![]);
        // argLength far beyond the datagram limit
        bytes[11..15].copy_from_slice(&100_000i32.to_be_bytes());
        bytes
    });
    let module = module(connector);

    let err = module.get_wallet_public_key().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidResponse(FrameError::MalformedFrame(_))
    ));
}

#[test]
fn test_no_response_times_out() {
    let connector = device(|_| Vec::new());
    let module = module(connector);

    let start = Instant::now();
    let err = module.burn_keypair().unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(200));
    // A timeout is not a broken link
    assert!(module.executor().link().is_open());
}

#[test]
fn test_truncated_response_times_out() {
    let connector = device(|req| {
        let mut bytes = reply(req, StatusCode::Ok, vec![1, 2, 3, 4]);
        bytes.truncate(bytes.len() - 2);
        bytes
    });
    let module = module(connector);

    assert!(matches!(
        module.get_wallet_public_key(),
        Err(Error::Timeout)
    ));
}

#[test]
fn test_partial_reads_and_stale_input() {
    let connector = echo_device();
    let transport = connector.transport();
    let module = module(connector);

    transport.set_max_read_chunk(2);
    transport.inject_read(&[0xDE, 0xAD, 0xBE, 0xEF]);

    assert_eq!(module.sign_transaction(&[9; 40]).unwrap(), vec![9; 40]);
}

// ============================================================================
// Link management
// ============================================================================

#[test]
fn test_bounded_open_gives_up() {
    let connector = echo_device().fail_always();
    let module = SecureModule::from_config(
        connector.clone(),
        &module_config(RetryPolicy::Bounded(3)),
        CancelToken::new(),
    );

    let start = Instant::now();
    let err = module.burn_keypair().unwrap_err();
    assert!(matches!(err, Error::Connection { attempts: 4, .. }), "{err}");
    assert_eq!(connector.attempts(), 4);
    // Three 10 ms delays between the four attempts
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(!module.executor().link().is_open());
    assert_eq!(module.executor().last_sequence(), 0);
}

#[test]
fn test_bounded_open_recovers() {
    let connector = echo_device().fail_first(2);
    let module = SecureModule::from_config(
        connector.clone(),
        &module_config(RetryPolicy::Bounded(3)),
        CancelToken::new(),
    );

    module.burn_keypair().unwrap();
    assert_eq!(connector.attempts(), 3);
}

#[test]
fn test_infinite_open_cancelled() {
    let connector = echo_device().fail_always();
    let cancel = CancelToken::new();
    let module = SecureModule::from_config(
        connector.clone(),
        &module_config(RetryPolicy::Infinite),
        cancel.clone(),
    );

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });

    let start = Instant::now();
    let err = module.get_wallet_public_key().unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, Error::Cancelled));
    assert!(connector.attempts() >= 2);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_send_failure_reconnects() {
    let connector = echo_device();
    let transport = connector.transport();
    let module = module(connector.clone());

    transport.fail_writes(true);
    let err = module.set_pin_code("1234").unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_retryable());
    assert!(!module.executor().link().is_open());

    transport.fail_writes(false);
    module.set_pin_code("1234").unwrap();
    assert_eq!(connector.attempts(), 2);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_calls_never_interleave() {
    const THREADS: u8 = 4;
    const CALLS: usize = 25;
    const WRITE_CHUNK: usize = 7;

    let connector = echo_device();
    let transport = connector.transport();
    // Every frame spans several write calls
    transport.set_max_write_chunk(WRITE_CHUNK);
    let module = Arc::new(module(connector.clone()));

    let handles: Vec<_> = (0..THREADS)
        .map(|id| {
            let module = Arc::clone(&module);
            thread::spawn(move || {
                for i in 0..CALLS {
                    let tx = vec![id; i + 1];
                    assert_eq!(module.sign_transaction(&tx).unwrap(), tx);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREADS as usize * CALLS;
    let requests = parse_requests(&transport.get_written());
    assert_eq!(requests.len(), total);

    // Walk the write log: each frame's chunks must be consecutive writes
    let writes = transport.writes();
    let mut next_write = 0;
    for (i, request) in requests.iter().enumerate() {
        assert_eq!(request.sequence, i as i32 + 1);
        // A frame spliced with another caller's bytes would mix argument bytes
        assert!(request.arg.iter().all(|&b| b == request.arg[0]));

        let mut frame_bytes = 0;
        while frame_bytes < request.length as usize {
            let chunk = &writes[next_write];
            assert!(chunk.len() <= WRITE_CHUNK);
            frame_bytes += chunk.len();
            next_write += 1;
        }
        assert_eq!(frame_bytes, request.length as usize, "frame {} split unevenly", i);
    }
    assert_eq!(next_write, writes.len());
}

// ============================================================================
// Bounded waits and cancellation
// ============================================================================

#[test]
fn test_cancel_during_response_wait() {
    let connector = device(|_| Vec::new());
    let cancel = CancelToken::new();
    let config = SecureModuleConfig {
        read_timeout_ms: 10_000,
        ..module_config(RetryPolicy::Bounded(0))
    };
    let module = SecureModule::from_config(connector, &config, cancel.clone());

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });

    let start = Instant::now();
    let err = module.burn_keypair().unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, Error::Cancelled), "{err}");
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_failed_discard_spends_no_sequence() {
    let connector = echo_device();
    let transport = connector.transport();
    let module = module(connector.clone());

    transport.inject_read(&[0xDE, 0xAD]);
    transport.fail_reads(true);
    assert!(matches!(module.burn_keypair(), Err(Error::Transport(_))));
    assert_eq!(module.executor().last_sequence(), 0);
    assert!(transport.writes().is_empty());

    transport.fail_reads(false);
    module.burn_keypair().unwrap();
    let requests = parse_requests(&transport.get_written());
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sequence, 1);
}

/// Line that always has another byte pending
struct ChattyLine;

impl Transport for ChattyLine {
    fn read(&mut self, buffer: &mut [u8]) -> raksha_io::Result<usize> {
        buffer[0] = 0x00;
        Ok(1)
    }

    fn write(&mut self, data: &[u8]) -> raksha_io::Result<usize> {
        Ok(data.len())
    }

    fn flush(&mut self) -> raksha_io::Result<()> {
        Ok(())
    }

    fn available(&mut self) -> raksha_io::Result<usize> {
        Ok(1)
    }
}

struct ChattyConnector;

impl Connector for ChattyConnector {
    type Transport = ChattyLine;

    fn connect(&self) -> raksha_io::Result<ChattyLine> {
        Ok(ChattyLine)
    }

    fn describe(&self) -> String {
        "chatty".to_string()
    }
}

#[test]
fn test_busy_line_does_not_block_execute() {
    let cancel = CancelToken::new();
    let module = SecureModule::from_config(
        ChattyConnector,
        &module_config(RetryPolicy::Bounded(0)),
        cancel.clone(),
    );

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        cancel.cancel();
    });

    let start = Instant::now();
    // The noise never forms a valid reply; the call must still come back
    assert!(module.burn_keypair().is_err());
    assert!(start.elapsed() < Duration::from_secs(2));
    canceller.join().unwrap();
}
