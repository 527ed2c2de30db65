use thiserror::Error;

/// Errors from validating document keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid document key component {component:?}: {reason}")]
    InvalidKey { component: String, reason: String },

    #[error("slot {slot:?} is not valid for scope {scope}")]
    InvalidSlot { scope: String, slot: String },
}
