mod policy;
mod session;
mod settings;
mod status;

pub use policy::{GENERIC_INTERNAL_ERROR, RESOURCES_EXHAUSTED, RetryPolicy};
pub use session::{Phase, QuerySession};
pub use settings::{ResolvedSettings, SessionSettings};
pub use status::{JobState, JobStatus};
