pub mod coordinator;
pub mod types;

pub use coordinator::ApprovalCoordinator;
pub use types::{ApprovalRequest, Resolution, ResolutionOutcome, ResolveError, SubmitError};
