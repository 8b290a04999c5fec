//! Credential infrastructure module

mod stored;

pub use stored::{StoredCredential, CREDENTIALS_FILE};
