#![forbid(unsafe_code)]

pub mod common;
pub mod record;

pub use common::{ContractViolation, Validate};
pub use record::{
    ClientId, DeleteTributePayload, NewTributePayload, RecordId, TributeDraft, TributeRecord,
    TributeTimestamp,
};
