use rand::Rng;

use crate::protocol::messages::{
    now_stamp, now_stamp_millis, DataPoint, DeviceKind, DeviceStatus, DeviceStatusBatch,
    DeviceStatusRecord, MonitoringSample, StatusMetrics,
};

const TOTAL_LIGHTS: u32 = 120;

#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub location: String,
}

impl Device {
    fn new(id: &str, name: &str, kind: DeviceKind, location: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            location: location.to_string(),
        }
    }
}

/// Synthetic telemetry for a fixed device roster. Generation is a pure
/// function of (device, RNG): no state is carried between calls, and the RNG
/// is the caller's, so a different drawing strategy is a different RNG.
#[derive(Debug, Clone)]
pub struct TelemetryGenerator {
    roster: Vec<Device>,
}

impl TelemetryGenerator {
    pub fn new(roster: Vec<Device>) -> Self {
        Self { roster }
    }

    /// The 6-device reference roster: two controllers, two power supplies,
    /// two light groups across the platform sites.
    pub fn with_reference_roster() -> Self {
        Self::new(vec![
            Device::new(
                "CTRL-001",
                "Evacuation Controller - Platform A",
                DeviceKind::Controller,
                "Platform A",
            ),
            Device::new(
                "CTRL-002",
                "Evacuation Controller - Platform B",
                DeviceKind::Controller,
                "Platform B",
            ),
            Device::new(
                "PWR-001",
                "Standby Power Supply - Platform A",
                DeviceKind::PowerSupply,
                "Platform A",
            ),
            Device::new(
                "PWR-002",
                "Standby Power Supply - Platform B",
                DeviceKind::PowerSupply,
                "Platform B",
            ),
            Device::new(
                "LIGHT-A1",
                "Evacuation Light Group A1",
                DeviceKind::LightGroup,
                "Platform A, Zone 1",
            ),
            Device::new(
                "LIGHT-A2",
                "Evacuation Light Group A2",
                DeviceKind::LightGroup,
                "Platform A, Zone 2",
            ),
        ])
    }

    pub fn roster(&self) -> &[Device] {
        &self.roster
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.roster.iter().find(|device| device.id == id)
    }

    /// One status record per roster device, drawn independently of any prior
    /// snapshot: 75% online / 25% warning, metrics within their documented
    /// ranges.
    pub fn snapshot_all<R: Rng + ?Sized>(&self, rng: &mut R) -> DeviceStatusBatch {
        let records = self
            .roster
            .iter()
            .map(|device| DeviceStatusRecord {
                device_id: device.id.clone(),
                device_name: device.name.clone(),
                device_type: device.kind,
                location: device.location.clone(),
                status: if rng.gen_bool(0.25) {
                    DeviceStatus::Warning
                } else {
                    DeviceStatus::Online
                },
                timestamp: now_stamp(),
                metrics: Self::draw_metrics(device.kind, rng),
            })
            .collect();
        DeviceStatusBatch { records }
    }

    fn draw_metrics<R: Rng + ?Sized>(kind: DeviceKind, rng: &mut R) -> StatusMetrics {
        match kind {
            DeviceKind::Controller => StatusMetrics::Controller {
                signal_strength: rng.gen_range(70..=100),
                cpu_usage: rng.gen_range(10..=60),
                memory_usage: rng.gen_range(20..=70),
            },
            DeviceKind::PowerSupply => StatusMetrics::PowerSupply {
                voltage: round2(rng.gen_range(23.5..=24.8)),
                current: round2(rng.gen_range(1.5..=3.2)),
                temperature: rng.gen_range(25..=45),
            },
            DeviceKind::LightGroup => StatusMetrics::LightGroup {
                total_lights: TOTAL_LIGHTS,
                online_lights: rng.gen_range(115..=TOTAL_LIGHTS),
                brightness: rng.gen_range(80..=100),
            },
        }
    }

    /// A single-instant sample for one device: three data points chosen by
    /// the device's type. `None` if the id is not in the roster.
    pub fn sample_one<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        device_id: &str,
    ) -> Option<MonitoringSample> {
        let device = self.device(device_id)?;
        let data_points = match device.kind {
            DeviceKind::Controller => vec![
                DataPoint {
                    metric: "cpu_usage".to_string(),
                    value: f64::from(rng.gen_range(10u32..=60)),
                    unit: "%".to_string(),
                },
                DataPoint {
                    metric: "memory_usage".to_string(),
                    value: f64::from(rng.gen_range(20u32..=70)),
                    unit: "%".to_string(),
                },
                DataPoint {
                    metric: "network_traffic".to_string(),
                    value: f64::from(rng.gen_range(100u32..=500)),
                    unit: "KB/s".to_string(),
                },
            ],
            DeviceKind::PowerSupply => vec![
                DataPoint {
                    metric: "voltage".to_string(),
                    value: round2(rng.gen_range(23.5..=24.8)),
                    unit: "V".to_string(),
                },
                DataPoint {
                    metric: "current".to_string(),
                    value: round2(rng.gen_range(1.5..=3.2)),
                    unit: "A".to_string(),
                },
                DataPoint {
                    metric: "power".to_string(),
                    value: round2(rng.gen_range(35.0..=80.0)),
                    unit: "W".to_string(),
                },
            ],
            DeviceKind::LightGroup => vec![
                DataPoint {
                    metric: "brightness".to_string(),
                    value: f64::from(rng.gen_range(80u32..=100)),
                    unit: "%".to_string(),
                },
                DataPoint {
                    metric: "online_count".to_string(),
                    value: f64::from(rng.gen_range(115..=TOTAL_LIGHTS)),
                    unit: "units".to_string(),
                },
                DataPoint {
                    metric: "response_time".to_string(),
                    value: f64::from(rng.gen_range(50u32..=200)),
                    unit: "ms".to_string(),
                },
            ],
        };

        Some(MonitoringSample {
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            timestamp: now_stamp_millis(),
            data_points,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
