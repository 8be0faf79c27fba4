//! Terminal rendering of response updates

use std::io::{self, Write};

use parley_chat::{
    AggregatedResponse, Content, INFORMATIVE_MESSAGE_FUNCTION, RENDER_ADAPTIVE_CARD_FUNCTION,
    ResponseAggregator, ResponseUpdate,
};

/// An Adaptive Card the agent is waiting on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCard {
    /// Id of the activity that carried the card
    pub activity_id: Option<String>,
}

/// Prints one turn's updates as they arrive.
///
/// Text updates are snapshots, so only the part a snapshot adds to what is
/// already on screen gets printed. A snapshot that does not extend the shown
/// text is printed again in full on a new line.
#[derive(Debug, Default)]
pub struct TurnPrinter {
    messages: ResponseAggregator,
    shown: String,
    message_id: Option<String>,
    line_open: bool,
    pending_card: Option<PendingCard>,
}

impl TurnPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one update
    pub fn print_update(&mut self, update: &ResponseUpdate, out: &mut impl Write) -> io::Result<()> {
        // Streaming updates carry the whole turn, keep only this message's part
        let text = self
            .messages
            .push(update)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        if let Some(text) = text {
            self.print_text(update.message_id.as_deref(), &text, out)?;
        }
        for content in &update.contents {
            if let Content::FunctionCall {
                name, arguments, ..
            } = content
            {
                self.print_call(name, arguments, out)?;
            }
        }
        out.flush()
    }

    /// Terminate the current line, if any
    pub fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.end_line(out)?;
        out.flush()
    }

    /// Take the card shown during this turn, if any
    pub fn take_pending_card(&mut self) -> Option<PendingCard> {
        self.pending_card.take()
    }

    fn print_text(
        &mut self,
        message_id: Option<&str>,
        text: &str,
        out: &mut impl Write,
    ) -> io::Result<()> {
        if message_id.is_none() || message_id != self.message_id.as_deref() {
            self.end_line(out)?;
            self.shown.clear();
            self.message_id = message_id.map(String::from);
        }

        match text.strip_prefix(self.shown.as_str()) {
            Some(added) => write!(out, "{}", added)?,
            None => {
                self.end_line(out)?;
                write!(out, "{}", text)?;
            }
        }

        if !text.is_empty() {
            self.line_open = true;
        }
        self.shown = text.to_string();
        Ok(())
    }

    fn print_call(
        &mut self,
        name: &str,
        arguments: &serde_json::Value,
        out: &mut impl Write,
    ) -> io::Result<()> {
        self.end_line(out)?;
        // Whatever streams next starts on a fresh line
        self.shown.clear();

        match name {
            INFORMATIVE_MESSAGE_FUNCTION => {
                let message = arguments["message"].as_str().unwrap_or_default();
                writeln!(out, "[{}]", message)?;
            }
            RENDER_ADAPTIVE_CARD_FUNCTION => {
                let raw = arguments["adaptiveCardJson"].as_str().unwrap_or("null");
                let card = serde_json::from_str::<serde_json::Value>(raw)
                    .and_then(|card| serde_json::to_string_pretty(&card))
                    .unwrap_or_else(|_| raw.to_string());

                writeln!(out, "[Adaptive card]")?;
                writeln!(out, "{}", card)?;
                writeln!(out, "[Reply with /card [verb] <json>]")?;

                self.pending_card = Some(PendingCard {
                    activity_id: arguments["incomingActivityId"].as_str().map(String::from),
                });
            }
            other => writeln!(out, "[{}]", other)?,
        }
        Ok(())
    }

    fn end_line(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.line_open {
            writeln!(out)?;
            self.line_open = false;
        }
        Ok(())
    }
}

/// Print an aggregated response and its usage
pub fn print_response(response: &AggregatedResponse, out: &mut impl Write) -> io::Result<()> {
    let text = response.text();
    if !text.is_empty() {
        writeln!(out, "{}", text)?;
    }
    writeln!(
        out,
        "[Tokens: {} in, {} out]",
        response.usage.input_tokens, response.usage.output_tokens
    )?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_chat::{ChatMessage, UsageDetails};
    use serde_json::json;

    fn text(text: &str, message_id: &str) -> ResponseUpdate {
        ResponseUpdate::assistant(Utc::now(), vec![Content::text(text)]).with_message_id(message_id)
    }

    fn call(name: &str, arguments: serde_json::Value) -> ResponseUpdate {
        ResponseUpdate::assistant(Utc::now(), vec![Content::function_call(name, arguments)])
    }

    fn render(updates: &[ResponseUpdate]) -> (String, TurnPrinter) {
        let mut printer = TurnPrinter::new();
        let mut out = Vec::new();
        for update in updates {
            printer.print_update(update, &mut out).unwrap();
        }
        printer.finish(&mut out).unwrap();
        (String::from_utf8(out).unwrap(), printer)
    }

    #[test]
    fn test_snapshots_print_once() {
        let (out, _) = render(&[
            text("Hel", "m1"),
            text("Hello", "m1"),
            text("Hello world", "m1"),
        ]);
        assert_eq!(out, "Hello world\n");
    }

    #[test]
    fn test_replaced_snapshot_reprinted() {
        let (out, _) = render(&[text("Hel", "m1"), text("Goodbye", "m1")]);
        assert_eq!(out, "Hel\nGoodbye\n");
    }

    #[test]
    fn test_messages_on_separate_lines() {
        let (out, _) = render(&[text("First", "m1"), text("Second", "m2")]);
        assert_eq!(out, "First\nSecond\n");
    }

    #[test]
    fn test_second_stream_prints_only_its_text() {
        let (out, _) = render(&[
            text("Hello", "s1").mark_partial(),
            text("Hello world", "s2").mark_partial(),
        ]);
        assert_eq!(out, "Hello\n world\n");
    }

    #[test]
    fn test_empty_ping_does_not_break_line() {
        let (out, _) = render(&[
            text("Hel", "s1").mark_partial(),
            text("", "ping"),
            text("Hello", "s1").mark_partial(),
        ]);
        assert_eq!(out, "Hello\n");
    }

    #[test]
    fn test_informative_event() {
        let (out, _) = render(&[
            call(
                INFORMATIVE_MESSAGE_FUNCTION,
                json!({ "message": "Dynamic Plan Received", "sequence": 0 }),
            ),
            text("Hi", "m1"),
        ]);
        assert_eq!(out, "[Dynamic Plan Received]\nHi\n");
    }

    #[test]
    fn test_event_between_chunks_restarts_text() {
        let (out, _) = render(&[
            text("Hel", "m1"),
            call(INFORMATIVE_MESSAGE_FUNCTION, json!({ "message": "Step" })),
            text("Hello", "m1"),
        ]);
        assert_eq!(out, "Hel\n[Step]\nHello\n");
    }

    #[test]
    fn test_card_sets_pending() {
        let card = json!({ "type": "AdaptiveCard", "version": "1.5" });
        let (out, mut printer) = render(&[call(
            RENDER_ADAPTIVE_CARD_FUNCTION,
            json!({ "adaptiveCardJson": card.to_string(), "incomingActivityId": "act-1" }),
        )]);

        assert!(out.starts_with("[Adaptive card]\n"));
        assert!(out.contains("\"type\": \"AdaptiveCard\""));
        assert_eq!(
            printer.take_pending_card(),
            Some(PendingCard {
                activity_id: Some("act-1".into())
            })
        );
        assert_eq!(printer.take_pending_card(), None);
    }

    #[test]
    fn test_print_response() {
        let response = AggregatedResponse {
            messages: vec![ChatMessage::assistant("Hello world")],
            usage: UsageDetails {
                input_tokens: 2,
                output_tokens: 2,
            },
            created_at: Utc::now(),
            model_id: None,
        };
        let mut out = Vec::new();
        print_response(&response, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Hello world\n[Tokens: 2 in, 2 out]\n"
        );
    }
}
