//! Hardware secure module driver
//!
//! Speaks the length-prefixed datagram protocol over a serial link. Every
//! operation is one request/response exchange through [`CommandExecutor`];
//! argument and result payloads are opaque bytes interpreted by the device.

pub mod constants;
pub mod datagram;
pub mod executor;
pub mod link;
pub mod status;

pub use datagram::{FrameError, RequestDatagram, ResponseDatagram};
pub use executor::{CommandExecutor, ExecutorConfig, SequenceCounter};
pub use link::{LinkGuard, LinkManager, RetryPolicy};
pub use status::{CommandId, StatusCode};

use crate::cancel::CancelToken;
use crate::config::SecureModuleConfig;
use crate::error::{Error, Result};
use crate::transport::Connector;
use std::sync::Arc;

/// Secure module driver
///
/// Cheap to share behind an `Arc`; concurrent calls queue on the link.
pub struct SecureModule<C: Connector> {
    executor: CommandExecutor<C>,
    cancel: CancelToken,
}

impl<C: Connector> SecureModule<C> {
    pub fn new(executor: CommandExecutor<C>, cancel: CancelToken) -> Self {
        Self { executor, cancel }
    }

    /// Build the driver from the `[secure_module]` config section
    ///
    /// The link stays closed until the first command.
    pub fn from_config(connector: C, config: &SecureModuleConfig, cancel: CancelToken) -> Self {
        let link = Arc::new(LinkManager::new(connector, config.retry_delay()));
        let executor = CommandExecutor::new(
            link,
            ExecutorConfig {
                policy: config.retry_policy,
                response_timeout: config.read_timeout(),
            },
        );
        log::info!(
            "SecureModule: driver ready for {} ({:?})",
            executor.link().connector().describe(),
            config.retry_policy
        );
        Self::new(executor, cancel)
    }

    pub fn executor(&self) -> &CommandExecutor<C> {
        &self.executor
    }

    /// Store a new pin code
    pub fn set_pin_code(&self, code: &str) -> Result<()> {
        self.call(CommandId::SetPinCode, code.as_bytes()).map(drop)
    }

    /// Verify a pin code; a wrong code surfaces as `Device(VerifyFailed)`
    pub fn check_pin_code(&self, code: &str) -> Result<()> {
        self.call(CommandId::CheckPinCode, code.as_bytes()).map(drop)
    }

    /// Have the device generate and burn a fresh keypair
    pub fn burn_keypair(&self) -> Result<()> {
        self.call(CommandId::BurnKeypair, &[]).map(drop)
    }

    /// Fetch the wallet public key
    pub fn get_wallet_public_key(&self) -> Result<Vec<u8>> {
        self.call(CommandId::GetWallet, &[])
    }

    /// Sign a serialized transaction, returning the device's signature payload
    pub fn sign_transaction(&self, tx: &[u8]) -> Result<Vec<u8>> {
        self.call(CommandId::SignTransaction, tx)
    }

    /// Execute by raw opcode
    ///
    /// Opcodes with no supported command fail with `NotImplemented` before
    /// the link is touched.
    pub fn execute_raw(&self, opcode: u8, arg: &[u8]) -> Result<Vec<u8>> {
        let command = CommandId::try_from(opcode).map_err(Error::NotImplemented)?;
        self.call(command, arg)
    }

    fn call(&self, command: CommandId, arg: &[u8]) -> Result<Vec<u8>> {
        match self.executor.execute(command, arg, &self.cancel) {
            Ok(response) => Ok(response.arg),
            Err(e) => {
                log::error!("SecureModule: {} failed: {}", command.name(), e);
                Err(e)
            }
        }
    }
}
