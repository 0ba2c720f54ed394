//! Application layer for Imagine.
//!
//! Use cases that coordinate the domain model, the file-system stores and the
//! HTTP providers. The console front end talks only to this layer.

pub mod credential_usecase;
pub mod generation_usecase;

pub use credential_usecase::CredentialUseCase;
pub use generation_usecase::{
    GenerationObserver, GenerationOutcome, GenerationRequest, GenerationUseCase,
};
