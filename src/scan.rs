//! Cursor-based full-keyspace iteration.
//!
//! A [`KeyScanner`] pages through every key of the store's selected logical
//! database using the native `SCAN` cursor. The sequence is lazy and finite
//! for a static dataset, but inherits the cursor's weak guarantees: each key
//! is visited at least once per full pass, keys mutated during the pass may
//! be seen zero or more times, and the only way to resume is the store's own
//! cursor token. None of this is tightened here.

use crate::store::{Store, StoreError};

/// Paging state for one full pass over a keyspace.
pub struct KeyScanner {
    cursor: u64,
    count: usize,
    finished: bool,
}

impl KeyScanner {
    /// Start a pass from cursor zero. `count` is the `COUNT` hint forwarded
    /// to the store on every page.
    pub fn new(count: usize) -> Self {
        Self {
            cursor: 0,
            count,
            finished: false,
        }
    }

    /// Whether the store has returned the terminal cursor.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page of key names.
    ///
    /// Returns `Ok(None)` once the pass is complete. A returned page may be
    /// empty while the pass is still in progress; callers should keep
    /// polling until `None`.
    pub async fn next_page<S: Store + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<Option<Vec<String>>, StoreError> {
        if self.finished {
            return Ok(None);
        }
        let (next_cursor, keys) = store.scan_page(self.cursor, self.count).await?;
        self.cursor = next_cursor;
        if next_cursor == 0 {
            self.finished = true;
        }
        Ok(Some(keys))
    }
}
