//! Cursor-based page request and result for `find_all`.

use serde::{Deserialize, Serialize};

use super::Message;

/// One page request. `offset` is the resume cursor from the previous page
/// (0 to start); `size` is a hint, not an exact count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindAllPage {
    pub offset: u64,
    pub size: u64,
}

impl FindAllPage {
    pub fn first(size: u64) -> Self {
        Self { offset: 0, size }
    }
}

/// One page of messages. A `cursor` of 0 means the traversal is complete; a
/// page may be empty while the cursor is still non-zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindResult {
    pub messages: Vec<Message>,
    pub cursor: u64,
}

impl FindResult {
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}
