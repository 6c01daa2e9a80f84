use std::io::Write;

use dwight_lib::output::ConsoleIO;
use dwight_lib::pipeline::guardrails::sanitize_input;
use dwight_lib::pipeline::intent::classify;
use dwight_lib::pipeline::lead_trigger::should_prompt_lead;

/// Run the `dwight classify` command. Needs no index or provider.
pub fn run_classify<C: ConsoleIO>(text: &str, io: &mut C) -> anyhow::Result<()> {
    let message = sanitize_input(text);
    let intent = classify(&message);
    writeln!(io.stdout(), "intent: {intent}")?;
    writeln!(
        io.stdout(),
        "lead_prompt: {}",
        should_prompt_lead(&message, intent)
    )?;
    Ok(())
}
