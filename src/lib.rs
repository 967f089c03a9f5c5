//! RakshaIO - Serial drivers for a hardware secure module and a particulate sensor
//!
//! The secure module speaks a length-prefixed request/response datagram
//! protocol; the particulate sensor streams fixed 10-byte frames whose PM2.5
//! reading is mapped to an Air Quality Index.
//!
//! ```no_run
//! use raksha_io::{AppConfig, CancelToken, SecureModule, SerialConnector};
//!
//! let config = AppConfig::defaults();
//! let sm = &config.secure_module;
//! let connector = SerialConnector::new(sm.port.clone(), sm.baud_rate, sm.poll_interval());
//! let module = SecureModule::from_config(connector, sm, CancelToken::new());
//! let key = module.get_wallet_public_key()?;
//! # Ok::<(), raksha_io::Error>(())
//! ```

pub mod aqi;
pub mod cancel;
pub mod config;
pub mod devices;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use aqi::concentration_to_index;
pub use cancel::CancelToken;
pub use config::AppConfig;
pub use devices::particulate::{ParticulateSampler, Sample};
pub use devices::secure_module::{CommandId, RetryPolicy, SecureModule, StatusCode};
pub use error::{Error, Result};
pub use transport::{Connector, SerialConnector, Transport};
