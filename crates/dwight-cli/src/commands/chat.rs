use std::io::{BufRead, Write};

use dwight_lib::chat::{ChatReply, ChatService};
use dwight_lib::output::ConsoleIO;

use crate::cli::GlobalArgs;
use crate::providers::ProviderFactory;

/// Shown under an answer when the message was a buying signal.
const LEAD_HINT: &str = "Our team can follow up with you. Share your email and phone number to get in touch.";

const EXIT_WORDS: &[&str] = &["exit", "quit"];

/// Run the `dwight chat` command.
///
/// With a message, answers it once. Without one, answers each non-blank
/// stdin line until EOF or `exit`.
pub fn run_chat<C: ConsoleIO>(
    message: Option<&str>,
    session_id: Option<&str>,
    args: &GlobalArgs,
    providers: &dyn ProviderFactory,
    io: &mut C,
) -> anyhow::Result<()> {
    let service = super::chat_service(args, providers)?;

    if let Some(message) = message {
        anyhow::ensure!(!message.trim().is_empty(), "Message is empty");
        return answer(&service, message, session_id, io);
    }

    let mut line = String::new();
    loop {
        line.clear();
        if io.stdin().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&message.to_lowercase().as_str()) {
            break;
        }
        answer(&service, message, session_id, io)?;
    }
    Ok(())
}

fn answer<C: ConsoleIO>(
    service: &ChatService,
    message: &str,
    session_id: Option<&str>,
    io: &mut C,
) -> anyhow::Result<()> {
    let ChatReply {
        response,
        intent,
        lead_prompt,
        ..
    } = service.respond(message, session_id)?;
    writeln!(io.stdout(), "[{intent}] {response}")?;
    if lead_prompt {
        writeln!(io.stdout(), "{LEAD_HINT}")?;
    }
    Ok(())
}
