//! Shared memory transport.

use super::Transport;
use super::region::{SharedRegion, open_region};
use crate::Result;
use crate::config::LocalConfig;
use crate::snapshot::SNAPSHOT_SIZE;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// How many failed opens between "still waiting" log lines (about 10s at 60Hz)
const WAITING_LOG_EVERY: u64 = 600;

/// Polls the simulator's shared memory region at a fixed cadence.
///
/// The region does not have to exist when the transport starts: opening is
/// retried on every tick. Short reads (a region still being created) are
/// skipped silently.
pub struct LocalMemoryTransport {
    name: String,
    poll_interval: Duration,
    interval: Option<Interval>,
    region: Option<Box<dyn SharedRegion>>,
    buffer: Vec<u8>,
    failed_opens: u64,
}

impl LocalMemoryTransport {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            name: config.region_name.clone(),
            poll_interval: config.poll_interval(),
            interval: None,
            region: None,
            buffer: vec![0u8; SNAPSHOT_SIZE],
            failed_opens: 0,
        }
    }

    pub fn region_name(&self) -> &str {
        &self.name
    }

    fn try_open(&mut self) -> bool {
        match open_region(&self.name) {
            Ok(region) => {
                info!(region = %self.name, "Shared memory region available");
                self.region = Some(region);
                self.failed_opens = 0;
                true
            }
            Err(e) => {
                if self.failed_opens == 0 {
                    info!(region = %self.name, "Waiting for shared memory region: {}", e);
                } else if self.failed_opens % WAITING_LOG_EVERY == 0 {
                    debug!(region = %self.name, attempts = self.failed_opens, "Still waiting for region");
                }
                self.failed_opens += 1;
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for LocalMemoryTransport {
    async fn next_buffer(&mut self) -> Result<Option<Vec<u8>>> {
        let poll_interval = self.poll_interval;
        loop {
            // Created lazily: an Interval needs a running tokio runtime
            let interval = self.interval.get_or_insert_with(|| {
                let mut interval = tokio::time::interval(poll_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
            interval.tick().await;

            if self.region.is_none() && !self.try_open() {
                continue;
            }
            let Some(region) = self.region.as_mut() else {
                continue;
            };

            match region.read_into(&mut self.buffer) {
                Ok(n) if n == SNAPSHOT_SIZE => return Ok(Some(self.buffer.clone())),
                Ok(n) => {
                    trace!(read = n, expected = SNAPSHOT_SIZE, "Short region read, skipping");
                }
                Err(e) => {
                    warn!(region = %self.name, "Region read failed, reopening: {}", e);
                    self.region = None;
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("shared memory '{}'", self.name)
    }

    fn source_hz(&self) -> f64 {
        1.0 / self.poll_interval.as_secs_f64()
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_for(path: &std::path::Path) -> LocalConfig {
        LocalConfig { region_name: path.display().to_string(), poll_interval_ms: 5 }
    }

    #[tokio::test]
    async fn waits_for_region_then_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.bin");
        let mut transport = LocalMemoryTransport::new(&config_for(&path));

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            std::fs::write(&writer_path, vec![7u8; SNAPSHOT_SIZE]).unwrap();
        });

        let buffer = tokio::time::timeout(Duration::from_secs(5), transport.next_buffer())
            .await
            .expect("transport should pick up the region")
            .unwrap()
            .unwrap();
        assert_eq!(buffer.len(), SNAPSHOT_SIZE);
        assert!(buffer.iter().all(|&b| b == 7));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn short_reads_are_skipped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1u8; 100]).unwrap();
        file.flush().unwrap();

        let mut transport = LocalMemoryTransport::new(&config_for(file.path()));
        let result =
            tokio::time::timeout(Duration::from_millis(100), transport.next_buffer()).await;
        assert!(result.is_err(), "a short region must not produce a buffer");

        file.write_all(&vec![2u8; SNAPSHOT_SIZE - 100]).unwrap();
        file.flush().unwrap();
        let buffer = tokio::time::timeout(Duration::from_secs(5), transport.next_buffer())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(&buffer[..100], &[1u8; 100][..]);
        assert_eq!(buffer[100], 2);
    }

    #[test]
    fn poll_rate_follows_config() {
        let transport = LocalMemoryTransport::new(&LocalConfig::default());
        assert_eq!(transport.region_name(), "$Slipstream");
        assert!((transport.source_hz() - 62.5).abs() < 1e-9);
    }
}
