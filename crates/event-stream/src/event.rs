//! Flat stream-record construction.

use chrono::{SecondsFormat, Utc};
use cis_core_types::{ChatMessage, InterceptResult};

/// Build the flat string-keyed field map appended to the stream: every
/// message field, the JSON-serialized decision summary, and the emission
/// timestamp. The stream id itself is assigned by the backend on append.
pub fn stream_fields(message: &ChatMessage, result: &InterceptResult) -> Vec<(String, String)> {
    let mut fields = vec![
        ("message_id".to_string(), message.message_id.clone()),
        ("thread_id".to_string(), message.thread_id.clone()),
        ("user_id".to_string(), message.user_id.clone()),
        ("content".to_string(), message.content.clone()),
        ("timestamp".to_string(), message.timestamp.clone()),
    ];
    if let Some(lat) = message.gps_lat {
        fields.push(("gps_lat".to_string(), lat.to_string()));
    }
    if let Some(lon) = message.gps_lon {
        fields.push(("gps_lon".to_string(), lon.to_string()));
    }
    fields.push(("intercept_result".to_string(), result.summary().to_string()));
    fields.push((
        "emitted_at".to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    ));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ChatMessage {
        ChatMessage {
            message_id: "m-1".into(),
            thread_id: "t-1".into(),
            user_id: "u-1".into(),
            content: "hello".into(),
            timestamp: "2025-06-01T12:00:00Z".into(),
            gps_lat: Some(52.52),
            gps_lon: None,
        }
    }

    #[test]
    fn carries_every_message_field_and_the_summary() {
        let result = InterceptResult::hard_block(0.9, vec!["contact_info_phone".into()], "no");
        let fields = stream_fields(&message(), &result);

        let lookup = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        assert_eq!(lookup("message_id").as_deref(), Some("m-1"));
        assert_eq!(lookup("content").as_deref(), Some("hello"));
        assert_eq!(lookup("gps_lat").as_deref(), Some("52.52"));
        assert!(lookup("gps_lon").is_none());
        assert!(lookup("emitted_at").is_some());

        let summary: serde_json::Value =
            serde_json::from_str(&lookup("intercept_result").unwrap()).unwrap();
        assert_eq!(summary["allowed"], false);
        assert_eq!(summary["action"], "hard_block");
        assert_eq!(summary["risk_score"], 0.9);
        assert_eq!(summary["labels"][0], "contact_info_phone");
    }
}
