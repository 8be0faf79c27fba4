//! Activity classification
//!
//! Every inbound activity maps to at most one [`ActivityKind`]. The rules are
//! checked in a fixed order and the first match wins:
//!
//! 1. named `event` activities become [`ActivityKind::InformativeEvent`]
//! 2. `message` activities whose first attachment is an Adaptive Card become
//!    [`ActivityKind::CardAttachment`]
//! 3. activities tagged `streamType: "streaming"` become
//!    [`ActivityKind::StreamingChunk`]
//! 4. any other activity tagged `"final"`, or with no usable tag, becomes
//!    [`ActivityKind::FinalMessage`]
//!
//! Rule 4 also catches `typing` pings and nameless events. Their text is
//! usually empty, and the accumulator keeps an open stream alive across them.

use parley_activity::{ActivityType, InboundActivity, StreamingMetadata};

/// Semantic kind of an inbound activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
    /// Agent progress notification, with its name made readable
    InformativeEvent { message: String },
    /// An Adaptive Card to render
    CardAttachment {
        card_json: String,
        activity_id: Option<String>,
    },
    /// A partial chunk of streamed text
    StreamingChunk {
        text: String,
        stream_id: Option<String>,
    },
    /// The complete text of a message
    FinalMessage {
        text: String,
        stream_id: Option<String>,
        activity_id: Option<String>,
    },
}

/// Classify an activity given its parsed streaming metadata
pub fn classify(
    activity: &InboundActivity,
    metadata: Option<&StreamingMetadata>,
) -> Option<ActivityKind> {
    if activity.activity_type == ActivityType::Event {
        if let Some(name) = activity.event_name() {
            return Some(ActivityKind::InformativeEvent {
                message: readable_event_name(name),
            });
        }
    }

    if activity.activity_type == ActivityType::Message {
        if let Some(attachment) = activity.attachments.first() {
            if attachment.is_adaptive_card() {
                let card_json = attachment
                    .content
                    .as_ref()
                    .map(|content| content.to_string())
                    .unwrap_or_else(|| "null".to_string());
                return Some(ActivityKind::CardAttachment {
                    card_json,
                    activity_id: activity.id.clone(),
                });
            }
        }
    }

    let stream_id = metadata.and_then(|m| m.stream_id.clone());

    if metadata.is_some_and(StreamingMetadata::is_streaming) {
        return Some(ActivityKind::StreamingChunk {
            text: activity.text().to_string(),
            stream_id,
        });
    }

    if metadata.is_none_or(StreamingMetadata::is_final) {
        return Some(ActivityKind::FinalMessage {
            text: activity.text().to_string(),
            stream_id,
            activity_id: activity.id.clone(),
        });
    }

    None
}

/// Turn a PascalCase event name into space-separated words.
///
/// `"DynamicPlanReceived"` becomes `"Dynamic Plan Received"`.
pub fn readable_event_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        if c.is_uppercase() && !result.is_empty() {
            result.push(' ');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_activity::Attachment;
    use serde_json::json;

    fn classify_raw(activity: &InboundActivity) -> Option<ActivityKind> {
        let metadata = StreamingMetadata::parse(activity.channel_data.as_ref());
        classify(activity, metadata.as_ref())
    }

    fn card() -> Attachment {
        Attachment::adaptive_card(json!({ "type": "AdaptiveCard", "version": "1.5" }))
    }

    #[test]
    fn test_readable_event_name() {
        assert_eq!(readable_event_name("DynamicPlanReceived"), "Dynamic Plan Received");
        assert_eq!(readable_event_name("Plan"), "Plan");
        assert_eq!(readable_event_name("lowerStart"), "lower Start");
        assert_eq!(readable_event_name(""), "");
        assert_eq!(readable_event_name("ABC"), "A B C");
    }

    #[test]
    fn test_named_event() {
        let kind = classify_raw(&InboundActivity::event("DynamicPlanStepTriggered"));
        assert_eq!(
            kind,
            Some(ActivityKind::InformativeEvent {
                message: "Dynamic Plan Step Triggered".into()
            })
        );
    }

    #[test]
    fn test_event_wins_over_card_and_streaming() {
        let activity = InboundActivity::event("DynamicPlanReceived")
            .with_attachment(card())
            .with_channel_data(json!({ "streamType": "streaming" }));
        assert!(matches!(
            classify_raw(&activity),
            Some(ActivityKind::InformativeEvent { .. })
        ));
    }

    #[test]
    fn test_card_attachment() {
        let activity = InboundActivity::message("")
            .with_id("act-3")
            .with_attachment(card());
        match classify_raw(&activity) {
            Some(ActivityKind::CardAttachment {
                card_json,
                activity_id,
            }) => {
                let parsed: serde_json::Value = serde_json::from_str(&card_json).unwrap();
                assert_eq!(parsed["type"], "AdaptiveCard");
                assert_eq!(activity_id.as_deref(), Some("act-3"));
            }
            other => panic!("expected card, got {:?}", other),
        }
    }

    #[test]
    fn test_card_wins_over_streaming() {
        let activity = InboundActivity::message("x")
            .with_attachment(card())
            .with_channel_data(json!({ "streamType": "streaming" }));
        assert!(matches!(
            classify_raw(&activity),
            Some(ActivityKind::CardAttachment { .. })
        ));
    }

    #[test]
    fn test_only_first_attachment_counts() {
        let activity = InboundActivity::message("see card")
            .with_attachment(Attachment {
                content_type: "image/png".into(),
                content: None,
                content_url: Some("https://example.test/a.png".into()),
                name: None,
            })
            .with_attachment(card());
        assert!(matches!(
            classify_raw(&activity),
            Some(ActivityKind::FinalMessage { .. })
        ));
    }

    #[test]
    fn test_streaming_chunk() {
        let activity = InboundActivity::message("Hel")
            .with_channel_data(json!({ "streamType": "streaming", "streamId": "s1" }));
        assert_eq!(
            classify_raw(&activity),
            Some(ActivityKind::StreamingChunk {
                text: "Hel".into(),
                stream_id: Some("s1".into())
            })
        );
    }

    #[test]
    fn test_streaming_typing_activity_is_chunk() {
        let activity = InboundActivity {
            text: Some("Hel".into()),
            ..InboundActivity::new(ActivityType::Typing)
        }
        .with_channel_data(json!({ "streamType": "streaming" }));
        assert!(matches!(
            classify_raw(&activity),
            Some(ActivityKind::StreamingChunk { .. })
        ));
    }

    #[test]
    fn test_final_tagged() {
        let activity = InboundActivity::message("Hello world")
            .with_id("act-9")
            .with_channel_data(json!({ "streamType": "final", "streamId": "s1" }));
        assert_eq!(
            classify_raw(&activity),
            Some(ActivityKind::FinalMessage {
                text: "Hello world".into(),
                stream_id: Some("s1".into()),
                activity_id: Some("act-9".into()),
            })
        );
    }

    #[test]
    fn test_final_untagged_and_malformed() {
        let untagged = InboundActivity::message("plain");
        assert!(matches!(
            classify_raw(&untagged),
            Some(ActivityKind::FinalMessage { .. })
        ));

        let malformed = InboundActivity::message("plain")
            .with_channel_data(json!({ "streamType": "streaming", "streamSequence": "x" }));
        assert!(matches!(
            classify_raw(&malformed),
            Some(ActivityKind::FinalMessage { .. })
        ));
    }

    #[test]
    fn test_informative_stream_dropped() {
        let informative = InboundActivity::message("thinking")
            .with_channel_data(json!({ "streamType": "informative" }));
        assert_eq!(classify_raw(&informative), None);
    }

    #[test]
    fn test_non_message_activities_are_final() {
        let typing = InboundActivity {
            text: Some("hi".into()),
            ..InboundActivity::new(ActivityType::Typing)
        };
        assert_eq!(
            classify_raw(&typing),
            Some(ActivityKind::FinalMessage {
                text: "hi".into(),
                stream_id: None,
                activity_id: None,
            })
        );

        let nameless_event = InboundActivity {
            text: Some("ev".into()),
            ..InboundActivity::event("")
        };
        assert!(matches!(
            classify_raw(&nameless_event),
            Some(ActivityKind::FinalMessage { text, .. }) if text == "ev"
        ));

        let empty_typing = InboundActivity::new(ActivityType::Typing);
        assert!(matches!(
            classify_raw(&empty_typing),
            Some(ActivityKind::FinalMessage { text, .. }) if text.is_empty()
        ));
    }
}
