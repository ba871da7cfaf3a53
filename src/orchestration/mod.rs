//! Session orchestration: ties the pure engine to the deal API.

pub mod composer;
pub mod session;

pub use composer::{Composer, ComposerError, ComposerSettings, SubmitOutcome};
pub use session::{SessionView, StackSession};
