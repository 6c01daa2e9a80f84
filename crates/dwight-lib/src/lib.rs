pub mod chat;
pub mod config;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod lead;
pub mod output;
pub mod pipeline;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
