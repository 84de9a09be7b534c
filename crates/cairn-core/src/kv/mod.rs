//! Request and result types for the key-value store interface.

mod read;
mod scan;
mod validation;
mod write;

pub use read::DeleteRequest;
pub use read::DeleteResult;
pub use read::ReadRequest;
pub use read::ReadResult;
pub use scan::KeyValueEntry;
pub use scan::ScanRequest;
pub use scan::ScanResult;
use serde::Deserialize;
use serde::Serialize;
pub use validation::validate_write_command;
pub use write::WriteCommand;
pub use write::WriteRequest;
pub use write::WriteResult;

/// A member of a sorted set with its score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}
