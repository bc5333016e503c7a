pub mod config;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod service;
pub mod session;
pub mod shift;
pub mod store;
pub mod telemetry;

pub use error::{StoreError, TradeError, ValidationError};
pub use executor::{SwapExecutor, TradeOutcome};
pub use matcher::{MatchPolicy, Matcher};
pub use service::ShiftService;
pub use shift::{EmployeeId, NewShift, Shift, ShiftId, ShiftUpdate, TimeSlot, WantedSlots};
pub use store::{ShiftRead, ShiftStore, ShiftWrite};
