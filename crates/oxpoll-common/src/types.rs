use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A poll target scheduled for periodic collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRow {
    pub id: i64,
    pub ip: String,
    pub port: u16,
    pub system_type: String,
    /// Opaque protocol credential object, passed through to the plugin.
    pub credentials: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A successfully collected poll result, ready for bulk persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResultRow {
    pub id: i64,
    pub job_id: i64,
    /// Structured result payload as returned by the plugin.
    pub result: Value,
    pub collected_at: DateTime<Utc>,
}

/// A request message sent to a protocol plugin.
///
/// Serialized as a single UTF-8 JSON object tagged by `requestType`.
/// Discovery requests carry a generated `correlationId` that the plugin
/// echoes verbatim; polling requests carry the `jobId` of the scheduled
/// target instead. Credential fields are flattened into the object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "requestType", rename_all = "camelCase")]
pub enum OutboundRequest {
    #[serde(rename_all = "camelCase")]
    Discovery {
        correlation_id: String,
        ip: String,
        port: u16,
        system_type: String,
        #[serde(flatten)]
        credentials: Map<String, Value>,
    },
    #[serde(rename_all = "camelCase")]
    Polling {
        job_id: i64,
        ip: String,
        port: u16,
        system_type: String,
        #[serde(flatten)]
        credentials: Map<String, Value>,
    },
}

/// Reply status reported by a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    #[default]
    Fail,
}

/// The fields of a polling reply the aggregator cares about. Parsed out
/// of the forwarded payload; unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingReply {
    pub job_id: i64,
    #[serde(default)]
    pub status: ReplyStatus,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discovery_request_wire_shape() {
        let mut credentials = Map::new();
        credentials.insert("community".to_string(), json!("public"));
        let request = OutboundRequest::Discovery {
            correlation_id: "12345".to_string(),
            ip: "10.0.0.5".to_string(),
            port: 161,
            system_type: "snmp".to_string(),
            credentials,
        };

        let wire: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["requestType"], "discovery");
        assert_eq!(wire["correlationId"], "12345");
        assert_eq!(wire["ip"], "10.0.0.5");
        assert_eq!(wire["systemType"], "snmp");
        assert_eq!(wire["community"], "public");
        assert!(wire.get("jobId").is_none());
    }

    #[test]
    fn polling_request_wire_shape() {
        let request = OutboundRequest::Polling {
            job_id: 42,
            ip: "10.0.0.9".to_string(),
            port: 22,
            system_type: "ssh".to_string(),
            credentials: Map::new(),
        };

        let wire: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["requestType"], "polling");
        assert_eq!(wire["jobId"], 42);
        assert!(wire.get("correlationId").is_none());
    }

    #[test]
    fn polling_reply_defaults_to_fail() {
        let reply: PollingReply = serde_json::from_value(json!({ "jobId": 7 })).unwrap();
        assert_eq!(reply.status, ReplyStatus::Fail);
        assert!(reply.data.is_none());
    }

    #[test]
    fn polling_reply_success_with_data() {
        let reply: PollingReply = serde_json::from_value(json!({
            "jobId": 7,
            "status": "success",
            "data": { "cpu.usage": 42.0 }
        }))
        .unwrap();
        assert_eq!(reply.status, ReplyStatus::Success);
        assert_eq!(reply.data.unwrap()["cpu.usage"], 42.0);
    }
}
