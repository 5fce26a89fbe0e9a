mod backoff;

pub use backoff::{retry_transient, BackoffPolicy, RetriesExhausted};
