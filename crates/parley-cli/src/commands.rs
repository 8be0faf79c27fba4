//! Slash commands for interactive mode

use parley_activity::OutboundActivity;

use crate::ui::PendingCard;

/// Result of executing a slash command
#[derive(Debug)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the agent)
    Message(String),
    /// Send an Adaptive Card action response
    CardReply(OutboundActivity),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, pending_card: Option<&PendingCard>) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = match rest.split_once(' ') {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };
    let command = command.to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "quit" | "exit" | "q" => CommandResult::Exit,
        "card" => card_command(args, pending_card),
        _ => CommandResult::Unknown(command),
    })
}

/// `/card [verb] <json>`
fn card_command(args: &str, pending_card: Option<&PendingCard>) -> CommandResult {
    let Some(card) = pending_card else {
        return CommandResult::Message("No adaptive card to respond to.".into());
    };

    let (verb, json) = if args.starts_with('{') {
        (None, args)
    } else {
        match args.split_once(' ') {
            Some((verb, json)) => (Some(verb), json.trim()),
            None if args.is_empty() => (None, "{}"),
            None => (Some(args), "{}"),
        }
    };

    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(data) if data.is_object() => CommandResult::CardReply(OutboundActivity::card_action(
            verb,
            data,
            card.activity_id.clone(),
        )),
        Ok(_) => CommandResult::Message("Card data must be a JSON object.".into()),
        Err(e) => CommandResult::Message(format!("Invalid card data: {}", e)),
    }
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?          Show this help message
  /card [verb] <json>    Answer the last adaptive card with the given data
  /quit, /exit, /q       Exit

Press Ctrl-C to cancel a response in progress."#
        .to_string()
}
