//! Streaming metadata carried in an activity's channel data

use serde::Deserialize;

/// How the agent tagged a message activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamType {
    /// A partial chunk of text that is still being produced
    Streaming,
    /// The complete text of a message
    Final,
    /// A tag this crate does not interpret
    Other(String),
}

impl From<String> for StreamType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "streaming" => StreamType::Streaming,
            "final" => StreamType::Final,
            _ => StreamType::Other(value),
        }
    }
}

/// Streaming-control fields parsed from `channelData`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingMetadata {
    pub stream_type: Option<StreamType>,
    pub stream_id: Option<String>,
    pub stream_sequence: Option<i32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelDataWire {
    #[serde(default)]
    stream_type: Option<String>,
    #[serde(default)]
    stream_id: Option<String>,
    #[serde(default)]
    stream_sequence: Option<i32>,
}

impl StreamingMetadata {
    /// Parse streaming metadata from an activity's channel data.
    ///
    /// Returns `None` when the payload is absent, is not a JSON object, or any
    /// of the known fields has the wrong type. Callers treat `None` the same as
    /// an explicit `"final"` tag.
    pub fn parse(channel_data: Option<&serde_json::Value>) -> Option<Self> {
        let value = channel_data?;
        value.as_object()?;

        match ChannelDataWire::deserialize(value) {
            Ok(wire) => Some(Self {
                stream_type: wire.stream_type.map(StreamType::from),
                stream_id: wire.stream_id,
                stream_sequence: wire.stream_sequence,
            }),
            Err(e) => {
                tracing::debug!("Ignoring malformed channel data: {}", e);
                None
            }
        }
    }

    /// Check if this metadata tags a partial chunk
    pub fn is_streaming(&self) -> bool {
        matches!(self.stream_type, Some(StreamType::Streaming))
    }

    /// Check if this metadata tags a complete message (untagged counts as final)
    pub fn is_final(&self) -> bool {
        matches!(self.stream_type, None | Some(StreamType::Final))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_streaming() {
        let data = json!({ "streamType": "streaming", "streamId": "abc", "streamSequence": 3 });
        let meta = StreamingMetadata::parse(Some(&data)).unwrap();
        assert!(meta.is_streaming());
        assert!(!meta.is_final());
        assert_eq!(meta.stream_id.as_deref(), Some("abc"));
        assert_eq!(meta.stream_sequence, Some(3));
    }

    #[test]
    fn test_parse_final() {
        let data = json!({ "streamType": "final", "streamId": "abc" });
        let meta = StreamingMetadata::parse(Some(&data)).unwrap();
        assert!(meta.is_final());
        assert_eq!(meta.stream_sequence, None);
    }

    #[test]
    fn test_parse_absent() {
        assert_eq!(StreamingMetadata::parse(None), None);
    }

    #[test]
    fn test_parse_object_without_stream_type_is_final() {
        let data = json!({ "feedbackLoop": true });
        let meta = StreamingMetadata::parse(Some(&data)).unwrap();
        assert_eq!(meta.stream_type, None);
        assert!(meta.is_final());
    }

    #[test]
    fn test_parse_non_object_is_none() {
        assert_eq!(StreamingMetadata::parse(Some(&json!("streaming"))), None);
        assert_eq!(StreamingMetadata::parse(Some(&json!(["streaming"]))), None);
        assert_eq!(StreamingMetadata::parse(Some(&json!(42))), None);
    }

    #[test]
    fn test_parse_wrong_field_type_is_none() {
        let data = json!({ "streamType": "streaming", "streamSequence": "three" });
        assert_eq!(StreamingMetadata::parse(Some(&data)), None);

        let data = json!({ "streamType": 7 });
        assert_eq!(StreamingMetadata::parse(Some(&data)), None);
    }

    #[test]
    fn test_unknown_stream_type_is_neither() {
        let data = json!({ "streamType": "informative" });
        let meta = StreamingMetadata::parse(Some(&data)).unwrap();
        assert!(!meta.is_streaming());
        assert!(!meta.is_final());
        assert_eq!(meta.stream_type, Some(StreamType::Other("informative".into())));
    }
}
