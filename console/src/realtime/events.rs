//! Realtime event envelopes

use serde::Deserialize;
use tracing::warn;

use crate::errors::ConsoleError;

/// Raw frame on the wire: `{event, channel, data}`
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub event: String,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default)]
    pub data: serde_json::Value,
}

impl Frame {
    /// Parse a text frame payload
    pub fn parse(payload: &str) -> Result<Self, ConsoleError> {
        serde_json::from_str(payload).map_err(|e| ConsoleError::RealtimeError(e.to_string()))
    }
}

/// A service's status changed, usually resolving a dispatched job.
///
/// `job_id` is null for bulk actions, which never register jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceStatusChanged {
    #[serde(default)]
    pub job_id: Option<String>,

    pub service: String,

    pub status: String,

    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// A tracked project creation advanced (or failed)
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectStatusChanged {
    pub slug: String,

    pub status: String,

    #[serde(default)]
    pub error: Option<String>,
}

/// A tracked project deletion advanced (or failed)
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDeletionChanged {
    pub slug: String,

    pub status: String,

    #[serde(default)]
    pub error: Option<String>,
}

/// Typed envelope for every event the console consumes
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    ServiceStatus(ServiceStatusChanged),
    ProjectStatus(ProjectStatusChanged),
    ProjectDeletion(ProjectDeletionChanged),
}

impl RealtimeEvent {
    pub const SERVICE_STATUS_CHANGED: &'static str = "service.status.changed";
    pub const PROJECT_STATUS_CHANGED: &'static str = "project.status.changed";
    pub const PROJECT_DELETION_CHANGED: &'static str = "project.deletion.changed";

    /// Decode a frame into a typed event.
    ///
    /// Unknown event names and malformed payloads yield `None`; a bad frame
    /// must never take down the consumer.
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        let decoded = match frame.event.as_str() {
            Self::SERVICE_STATUS_CHANGED => {
                serde_json::from_value(frame.data.clone()).map(Self::ServiceStatus)
            }
            Self::PROJECT_STATUS_CHANGED => {
                serde_json::from_value(frame.data.clone()).map(Self::ProjectStatus)
            }
            Self::PROJECT_DELETION_CHANGED => {
                serde_json::from_value(frame.data.clone()).map(Self::ProjectDeletion)
            }
            _ => return None,
        };

        match decoded {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Undecodable {} payload: {}", frame.event, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_status_frame_decodes() {
        let frame = Frame::parse(
            r#"{"event": "service.status.changed", "channel": "orbit.environment.local",
                "data": {"job_id": "j1", "service": "redis", "status": "running", "action": "start", "timestamp": 1722945600}}"#,
        )
        .unwrap();

        match RealtimeEvent::from_frame(&frame) {
            Some(RealtimeEvent::ServiceStatus(event)) => {
                assert_eq!(event.job_id.as_deref(), Some("j1"));
                assert_eq!(event.service, "redis");
                assert_eq!(event.status, "running");
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_bulk_event_has_no_job_id() {
        let frame = Frame::parse(
            r#"{"event": "service.status.changed", "data": {"job_id": null, "service": "caddy", "status": "stopped"}}"#,
        )
        .unwrap();

        match RealtimeEvent::from_frame(&frame) {
            Some(RealtimeEvent::ServiceStatus(event)) => assert!(event.job_id.is_none()),
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let frame = Frame::parse(r#"{"event": "workspace.renamed", "data": {"name": "x"}}"#).unwrap();
        assert!(RealtimeEvent::from_frame(&frame).is_none());
    }

    #[test]
    fn test_malformed_payload_is_ignored() {
        let frame =
            Frame::parse(r#"{"event": "project.status.changed", "data": {"status": 42}}"#).unwrap();
        assert!(RealtimeEvent::from_frame(&frame).is_none());
    }
}
