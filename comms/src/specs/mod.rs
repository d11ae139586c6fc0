mod reject;
mod submission;

pub use reject::{RejectKind, Rejection};
pub use submission::{FetchSpec, SubmitSpec};
