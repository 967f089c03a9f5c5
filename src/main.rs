//! RakshaIO command line tool
//!
//! Runs one secure module command, or the particulate sampling loop, against
//! the serial ports named in the configuration file. Binary payloads are
//! read and printed as hex.

use clap::{Parser, Subcommand};
use raksha_io::config::AppConfig;
use raksha_io::{
    concentration_to_index, CancelToken, Error, ParticulateSampler, Result, SecureModule,
    SerialConnector,
};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "/etc/raksha.toml";

#[derive(Parser)]
#[command(name = "raksha-io")]
#[command(about = "Secure module and particulate sensor driver", version)]
struct Args {
    /// Configuration file (built-in defaults when the default path is absent)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample the particulate sensor until Ctrl-C
    Sample,
    /// Store a new pin code
    SetPin { code: String },
    /// Verify a pin code
    CheckPin { code: String },
    /// Burn a fresh keypair
    BurnKeypair,
    /// Print the wallet public key
    WalletKey,
    /// Sign a hex-encoded transaction
    Sign { tx_hex: String },
    /// Map a PM2.5 concentration (ug/m3) to its AQI
    Aqi { ug: f64 },
}

fn load_config(path: Option<&str>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            AppConfig::from_file(DEFAULT_CONFIG_PATH)
        }
        None => Ok(AppConfig::defaults()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("RakshaIO v{} starting...", env!("CARGO_PKG_VERSION"));

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        handler_token.cancel();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    match args.command {
        Command::Sample => {
            let sensor = &config.sensor;
            let connector =
                SerialConnector::new(sensor.port.clone(), sensor.baud_rate, sensor.poll_interval());
            ParticulateSampler::new(connector, sensor).run(&cancel, |_| {})?;
        }
        Command::Aqi { ug } => println!("{}", concentration_to_index(ug)?),
        command => run_module_command(&config, cancel, command)?,
    }

    Ok(())
}

fn run_module_command(config: &AppConfig, cancel: CancelToken, command: Command) -> Result<()> {
    let sm = &config.secure_module;
    let connector = SerialConnector::new(sm.port.clone(), sm.baud_rate, sm.poll_interval());
    let module = SecureModule::from_config(connector, sm, cancel);

    match command {
        Command::SetPin { code } => {
            module.set_pin_code(&code)?;
            println!("pin code set");
        }
        Command::CheckPin { code } => {
            module.check_pin_code(&code)?;
            println!("pin code verified");
        }
        Command::BurnKeypair => {
            module.burn_keypair()?;
            println!("keypair burned");
        }
        Command::WalletKey => println!("{}", hex::encode(module.get_wallet_public_key()?)),
        Command::Sign { tx_hex } => {
            let tx = hex::decode(tx_hex.trim())
                .map_err(|e| Error::Other(format!("Invalid transaction hex: {}", e)))?;
            println!("{}", hex::encode(module.sign_transaction(&tx)?));
        }
        Command::Sample | Command::Aqi { .. } => {
            return Err(Error::Other("not a secure module command".into()));
        }
    }
    Ok(())
}
