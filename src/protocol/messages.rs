use chrono::Local;
use serde::{Deserialize, Serialize, Serializer};

/// Producer-assigned timestamp, second precision.
pub fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Producer-assigned timestamp, millisecond precision (monitoring samples).
pub fn now_stamp_millis() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn serialize_rounded<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64((value * 100.0).round() / 100.0)
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Controller,
    PowerSupply,
    LightGroup,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Warning,
    Error,
}

/// Type-specific metric fields, flattened into a status record on the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum StatusMetrics {
    Controller {
        signal_strength: u32,
        cpu_usage: u32,
        memory_usage: u32,
    },
    PowerSupply {
        #[serde(serialize_with = "serialize_rounded")]
        voltage: f64,
        #[serde(serialize_with = "serialize_rounded")]
        current: f64,
        temperature: u32,
    },
    LightGroup {
        total_lights: u32,
        online_lights: u32,
        brightness: u32,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeviceStatusRecord {
    pub device_id: String,
    pub device_name: String,
    pub device_type: DeviceKind,
    pub location: String,
    pub status: DeviceStatus,
    pub timestamp: String,
    #[serde(flatten)]
    pub metrics: StatusMetrics,
}

/// Full-roster snapshot. Encodes as a top-level JSON array.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct DeviceStatusBatch {
    pub records: Vec<DeviceStatusRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DataPoint {
    pub metric: String,
    #[serde(serialize_with = "serialize_rounded")]
    pub value: f64,
    pub unit: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MonitoringSample {
    pub device_id: String,
    pub device_name: String,
    pub timestamp: String,
    pub data_points: Vec<DataPoint>,
}

/// Console control action. Values outside the known set survive decoding so
/// the dispatcher can log what it is dropping.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Confirm,
    Restore,
    #[serde(untagged)]
    Other(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ControlCommand {
    pub action: CommandAction,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ControlCommand {
    pub fn issued_now(action: CommandAction, context: Option<String>) -> Self {
        Self {
            action,
            timestamp: now_stamp(),
            context,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    DeviceStatus,
    QueryRecords,
    #[serde(untagged)]
    Other(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryRequest {
    pub query_type: QueryKind,
    pub timestamp: String,
}

impl QueryRequest {
    pub fn issued_now(query_type: QueryKind) -> Self {
        Self {
            query_type,
            timestamp: now_stamp(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryRecord {
    pub timestamp: String,
    pub operation: String,
    pub outcome: String,
    pub user: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub status: ResultStatus,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<QueryRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl QueryResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Success,
            message: message.into(),
            timestamp: now_stamp(),
            records: None,
            data: None,
        }
    }

    pub fn with_records(message: impl Into<String>, records: Vec<QueryRecord>) -> Self {
        Self {
            records: Some(records),
            ..Self::success(message)
        }
    }
}

/// One of the five wire shapes. The shapes are structurally disjoint, so a
/// payload either matches exactly one of them or fails to decode.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum BusMessage {
    DeviceStatusBatch(DeviceStatusBatch),
    MonitoringSample(MonitoringSample),
    ControlCommand(ControlCommand),
    QueryRequest(QueryRequest),
    QueryResult(QueryResult),
}

impl BusMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            BusMessage::DeviceStatusBatch(_) => "device_status_batch",
            BusMessage::MonitoringSample(_) => "monitoring_sample",
            BusMessage::ControlCommand(_) => "control_command",
            BusMessage::QueryRequest(_) => "query_request",
            BusMessage::QueryResult(_) => "query_result",
        }
    }
}
