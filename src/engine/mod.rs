//! Pure computation for stack composition: no I/O, no clocks.

pub mod pager;
pub mod pricing;
pub mod selection;
pub mod submission;

pub use pager::{CandidateFilter, CandidatePager, CandidateQuery, PageOutcome, PageTicket};
pub use pricing::{derive_quote, PriceForm, StackQuote};
pub use selection::{reduce, SelectionAction, SelectionError, StackSelection, ToggleEffect};
pub use submission::{StackDraft, StackPayload, SubmissionError, SubmitMode, MIN_STACK_STEPS};
