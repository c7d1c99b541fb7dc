pub mod dispatcher;
pub mod records;
pub mod telemetry;

pub use dispatcher::Dispatcher;
pub use records::{RecordStore, StaticRecordStore};
pub use telemetry::{Device, TelemetryGenerator};

use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::bus::{BusPublisher, BusTransport, PublishError};
use crate::protocol::messages::BusMessage;

/// Continuous producer loop: one monitoring sample for a random roster
/// device per tick, plus a full status snapshot every `status_every` ticks.
pub async fn run_monitor_loop<T: BusTransport>(
    publisher: &BusPublisher<T>,
    generator: &TelemetryGenerator,
    tick: Duration,
    status_every: u32,
) -> Result<(), PublishError> {
    if generator.roster().is_empty() {
        warn!("empty device roster, nothing to monitor");
        return Ok(());
    }

    let mut interval = tokio::time::interval(tick);
    let mut iteration: u64 = 0;
    loop {
        interval.tick().await;
        iteration += 1;

        if status_every > 0 && iteration % u64::from(status_every) == 0 {
            let batch = {
                let mut rng = rand::thread_rng();
                generator.snapshot_all(&mut rng)
            };
            info!(
                iteration,
                devices = batch.records.len(),
                "publishing status snapshot"
            );
            publisher
                .publish(&BusMessage::DeviceStatusBatch(batch))
                .await?;
        }

        let sample = {
            let mut rng = rand::thread_rng();
            let pick = rng.gen_range(0..generator.roster().len());
            let device_id = generator.roster()[pick].id.clone();
            generator.sample_one(&mut rng, &device_id)
        };
        if let Some(sample) = sample {
            info!(device = %sample.device_id, "publishing monitoring sample");
            publisher
                .publish(&BusMessage::MonitoringSample(sample))
                .await?;
        }
    }
}
