use std::sync::Arc;

use crate::protocol::messages::QueryRecord;

/// Read-only source for the record-history query. History storage itself is
/// an external collaborator; the dispatcher only ever reads.
pub trait RecordStore: Send + Sync {
    fn recent(&self) -> Vec<QueryRecord>;
}

impl<T> RecordStore for Arc<T>
where
    T: RecordStore,
{
    fn recent(&self) -> Vec<QueryRecord> {
        self.as_ref().recent()
    }
}

pub struct StaticRecordStore {
    records: Vec<QueryRecord>,
}

impl StaticRecordStore {
    pub fn new(records: Vec<QueryRecord>) -> Self {
        Self { records }
    }

    /// Fixed audit history served by the reference deployment.
    pub fn with_audit_history() -> Self {
        let entry = |timestamp: &str, operation: &str, user: &str| QueryRecord {
            timestamp: timestamp.to_string(),
            operation: operation.to_string(),
            outcome: "success".to_string(),
            user: user.to_string(),
        };
        Self::new(vec![
            entry("2025-12-07 14:30:15", "device status query", "admin"),
            entry("2025-12-07 10:15:22", "remote control command", "operator1"),
            entry("2025-12-06 16:45:33", "information confirm", "admin"),
            entry("2025-12-06 09:20:11", "device status query", "operator2"),
        ])
    }
}

impl RecordStore for StaticRecordStore {
    fn recent(&self) -> Vec<QueryRecord> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_history_is_non_empty_and_ordered_newest_first() {
        let store = StaticRecordStore::with_audit_history();
        let records = store.recent();
        assert!(!records.is_empty());
        let mut stamps: Vec<String> = records.iter().map(|r| r.timestamp.clone()).collect();
        stamps.sort_by(|a, b| b.cmp(a));
        assert_eq!(
            stamps,
            records.iter().map(|r| r.timestamp.clone()).collect::<Vec<_>>()
        );
    }
}
