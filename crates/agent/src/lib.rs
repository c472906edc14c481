//! The agent loop: the heart of Stepwise.
//!
//! A run follows a **Ask → Act → Observe** cycle:
//!
//! 1. **Seed** the conversation with the caller's instruction
//! 2. **Send** the conversation and tool catalog to the model via the [`ProviderAdapter`]
//! 3. **If tool calls**: validate and execute them in order, append the results, loop to 2
//! 4. **If text**: the run is complete
//!
//! The loop stops early on cancellation, on a fatal provider error, or when
//! the iteration bound is reached. Every end state reports the artifacts the
//! run produced.

pub mod adapter;
pub mod compact;
pub mod event;
pub mod handle;
pub mod loop_runner;
pub mod prompt;
pub mod retry;

pub use adapter::ProviderAdapter;
pub use event::RunEvent;
pub use handle::RunHandle;
pub use loop_runner::{AgentLoop, CANCELLED_BEFORE_EXECUTION};
pub use retry::RetryPolicy;
