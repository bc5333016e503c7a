use crate::shift::{EmployeeId, ShiftId};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Unknown time slot '{0}'")]
    InvalidSlot(String),
    #[error("Weekday label must be 1..={max} characters, got {len}")]
    InvalidWeekday { len: usize, max: usize },
    #[error("Shift id is empty")]
    EmptyShiftId,
    #[error("Field '{0}' is not set")]
    Missing(&'static str),
}

/// Failures of the sled backed shift table.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Transaction conflict")]
    Conflict,
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Corrupt shift record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Failed to encode shift record: {0}")]
    Encode(String),
}

/// Error kinds surfaced by the shift service.
#[derive(thiserror::Error, Debug)]
pub enum TradeError {
    #[error("Shift not found: {0}")]
    NotFound(ShiftId),
    #[error("Concurrent modification, retry the update: {0}")]
    Conflict(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    #[error("Session is not valid")]
    Unauthenticated,
    #[error("Shift {shift} is not owned by {caller}")]
    NotOwner { shift: ShiftId, caller: EmployeeId },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TradeError {
    /// Whether retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::StorageUnavailable(_))
    }
}

impl From<StoreError> for TradeError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict => TradeError::Conflict("storage write conflict".into()),
            other => TradeError::StorageUnavailable(other.to_string()),
        }
    }
}
