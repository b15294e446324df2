//! Pipeline use cases
//!
//! Each use case is one request-driven invocation: an admission check, a full
//! run, or a cancellation. Use cases own the policy; every boundary they
//! touch is a capability trait.

pub mod cancel;
pub mod run;
pub mod validate;

pub use cancel::CancelPipeline;
pub use run::RunPipeline;
pub use validate::ValidatePipeline;
