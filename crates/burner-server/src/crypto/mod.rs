pub mod kdf;
pub mod token;

pub use kdf::{derive_key, DerivedKey};
pub use token::TokenError;
