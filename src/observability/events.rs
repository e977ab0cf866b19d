//! Observable events
//!
//! Events are explicit and typed. Fan-out begin/complete pairs are logged
//! through [`ObservationScope`](super::ObservationScope) instead.

use std::fmt;

use super::logger::Severity;

/// Observable events in docshard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Configuration loaded and validated
    ConfigLoaded,
    /// Dataset loaded into partitions
    DatasetLoaded,
    /// Partition store closed
    StoreClosed,

    // Fan-out
    /// A partition reported itself unavailable
    PartitionUnavailable,
    /// Store name resolved to no reachable partition
    StoreUnresolved,
    /// Local results merged into one page
    PageMerged,

    // Index administration
    /// Index created on a partition
    IndexCreated,
    /// Index dropped on a partition
    IndexDropped,
    /// Background index build started
    IndexBuildBegin,
    /// Index (re)built on a partition
    IndexRebuilt,
    /// Index build failed
    IndexBuildFailed,

    // CLI
    /// Request could not be parsed or executed
    RequestRejected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DatasetLoaded => "DATASET_LOADED",
            Event::StoreClosed => "STORE_CLOSED",

            Event::PartitionUnavailable => "PARTITION_UNAVAILABLE",
            Event::StoreUnresolved => "STORE_UNRESOLVED",
            Event::PageMerged => "PAGE_MERGED",

            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexDropped => "INDEX_DROPPED",
            Event::IndexBuildBegin => "INDEX_BUILD_BEGIN",
            Event::IndexRebuilt => "INDEX_REBUILT",
            Event::IndexBuildFailed => "INDEX_BUILD_FAILED",

            Event::RequestRejected => "REQUEST_REJECTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::PartitionUnavailable | Event::StoreUnresolved | Event::RequestRejected => {
                Severity::Warn
            }
            Event::IndexBuildFailed => Severity::Error,
            Event::PageMerged => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::DatasetLoaded,
            Event::StoreClosed,
            Event::PartitionUnavailable,
            Event::StoreUnresolved,
            Event::PageMerged,
            Event::IndexCreated,
            Event::IndexDropped,
            Event::IndexBuildBegin,
            Event::IndexRebuilt,
            Event::IndexBuildFailed,
            Event::RequestRejected,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::PartitionUnavailable.severity(), Severity::Warn);
        assert_eq!(Event::IndexBuildFailed.severity(), Severity::Error);
        assert_eq!(Event::IndexCreated.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::PageMerged), "PAGE_MERGED");
    }
}
