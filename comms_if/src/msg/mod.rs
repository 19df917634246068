//! # Messages
//!
//! This module defines the structures which flow into and out of the tracker. The transport used
//! to move them around is not part of this crate, they only need to be serialisable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod cmd;
mod loc;
mod path;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cmd::*;
pub use loc::*;
pub use path::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Header attached to every stamped message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Header {
    /// Name of the coordinate frame the message contents are expressed in
    pub frame_id: String,

    /// Time at which the contents were valid
    pub stamp: DateTime<Utc>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Header {
    /// Create a new header in the given frame stamped with the current time.
    pub fn now<S: Into<String>>(frame_id: S) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp: Utc::now(),
        }
    }
}
