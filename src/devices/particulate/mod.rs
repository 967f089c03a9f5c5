//! Particulate sensor sampling loop
//!
//! The sensor streams 10-byte frames on its own serial link. The sampler
//! keeps that link open with the infinite retry policy, resynchronises on
//! the frame head, and maps each PM2.5 reading to an AQI value.

pub mod frame;

pub use frame::ParticulateFrame;

use crate::aqi::concentration_to_index;
use crate::cancel::CancelToken;
use crate::config::SensorConfig;
use crate::devices::secure_module::link::{LinkGuard, LinkManager, RetryPolicy};
use crate::error::{Error, Result};
use crate::transport::{Connector, Transport};
use frame::{FRAME_CMD, FRAME_HEAD, FRAME_SIZE};
use std::time::{Duration, Instant};

/// One processed reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// PM2.5 in ug/m3
    pub pm25: f64,
    /// PM10 in ug/m3
    pub pm10: f64,
    /// AQI for the PM2.5 reading, `None` when outside the table
    pub aqi: Option<u16>,
}

/// Periodic particulate sensor reader
pub struct ParticulateSampler<C: Connector> {
    link: LinkManager<C>,
    read_timeout: Duration,
    sample_interval: Duration,
}

impl<C: Connector> ParticulateSampler<C> {
    pub fn new(connector: C, config: &SensorConfig) -> Self {
        Self {
            link: LinkManager::new(connector, config.retry_delay()),
            read_timeout: config.read_timeout(),
            sample_interval: config.sample_interval(),
        }
    }

    pub fn link(&self) -> &LinkManager<C> {
        &self.link
    }

    /// Read one frame and convert it
    ///
    /// Blocks until the link is open (or the token is cancelled), then waits
    /// at most the read timeout for a complete frame.
    pub fn read_sample(&self, cancel: &CancelToken) -> Result<Sample> {
        let mut link = self.link.acquire(RetryPolicy::Infinite, cancel)?;
        let deadline = Instant::now() + self.read_timeout;
        let buf = read_frame(&mut link, deadline, cancel)?;
        drop(link);

        let frame = ParticulateFrame::parse(&buf)?;
        let aqi = match concentration_to_index(frame.pm25) {
            Ok(index) => Some(index),
            Err(e) => {
                log::warn!("Particulate: {}", e);
                None
            }
        };

        Ok(Sample {
            pm25: frame.pm25,
            pm10: frame.pm10,
            aqi,
        })
    }

    /// Sample until cancelled
    ///
    /// Timeouts skip the cycle, bad frames are dropped, and link failures
    /// reconnect on the next cycle. Returns `Ok(())` once cancelled.
    pub fn run<F>(&self, cancel: &CancelToken, mut on_sample: F) -> Result<()>
    where
        F: FnMut(Sample),
    {
        log::info!(
            "Particulate: sampling {} every {:?}",
            self.link.connector().describe(),
            self.sample_interval
        );

        loop {
            match self.read_sample(cancel) {
                Ok(sample) => {
                    match sample.aqi {
                        Some(aqi) => log::info!(
                            "pm2.5: {:.1} AQI: {} pm10: {:.1}",
                            sample.pm25,
                            aqi,
                            sample.pm10
                        ),
                        None => log::info!(
                            "pm2.5: {:.1} AQI: n/a pm10: {:.1}",
                            sample.pm25,
                            sample.pm10
                        ),
                    }
                    on_sample(sample);
                }
                Err(Error::Cancelled) => break,
                Err(Error::Timeout) => log::debug!("Particulate: no data yet"),
                Err(e) => log::warn!("Particulate: sample failed: {}", e),
            }

            if cancel.sleep(self.sample_interval).is_err() {
                break;
            }
        }

        log::info!("Particulate: sampling stopped");
        Ok(())
    }
}

/// Skip to the next `HEAD CMD` pair and read the rest of that frame
fn read_frame<T: Transport>(
    link: &mut LinkGuard<'_, T>,
    deadline: Instant,
    cancel: &CancelToken,
) -> Result<[u8; FRAME_SIZE]> {
    let mut prev = None;
    let mut skipped = 0usize;

    loop {
        let mut byte = [0u8; 1];
        link.receive_exact(&mut byte, deadline, cancel)?;
        if prev == Some(FRAME_HEAD) && byte[0] == FRAME_CMD {
            break;
        }
        if prev.is_some() {
            skipped += 1;
        }
        prev = Some(byte[0]);
    }

    if skipped > 0 {
        log::debug!("Particulate: skipped {} bytes to resync", skipped);
    }

    let mut buf = [0u8; FRAME_SIZE];
    buf[0] = FRAME_HEAD;
    buf[1] = FRAME_CMD;
    link.receive_exact(&mut buf[2..], deadline, cancel)?;
    Ok(buf)
}
