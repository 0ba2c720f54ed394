//! Generation requests, the events a provider yields and the stream driver.

mod event;
mod request;
mod stream;
mod summary;

pub use event::{BatchFailure, FailureKind, GenerationEvent, ImageEncoding, Severity};
pub use request::{
    GenerationParameters, MIN_INPUT_LENGTH, ResolvedParameter, validate_image_count,
    validate_prompt,
};
pub use stream::{GenerationStream, batched_stream, fan_out};
pub use summary::{GenerationSummary, TIMESTAMP_FORMAT, format_timestamp};
