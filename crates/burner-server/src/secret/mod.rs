pub mod service;
pub mod validate;

pub use service::{
    generate_id, Clock, CreateSecretRequest, CreateSecretResponse, ReadOutcome, ReadResponse,
    ReadSecretRequest, SecretService, SystemClock, UnavailableReason, UNAVAILABLE_MESSAGE,
};
pub use validate::{FieldError, Limits};
