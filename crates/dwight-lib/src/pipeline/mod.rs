pub mod chunker;
pub mod guardrails;
pub mod ingest;
pub mod intent;
pub mod lead_trigger;
pub mod retrieve;
