//! Pagination Cursor Store
//!
//! Maps opaque page tokens to offsets into the full listing an engine
//! returns. Tokens are minted only when a List result is truncated, never
//! expire, and are never invalidated when the underlying set changes: a
//! stale token simply re-slices whatever the engine reports now.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Resolved pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Maximum items to return, 0 means no limit
    pub size: usize,
    /// Offset into the full listing
    pub offset: usize,
}

/// Token-to-offset table shared by every List operation
#[derive(Debug, Default)]
pub struct CursorStore {
    tokens: Mutex<HashMap<String, usize>>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a caller's page size and token into a window.
    ///
    /// An empty token starts at offset zero.
    pub fn extract(&self, page_size: i32, page_token: &str) -> Result<PageWindow> {
        if page_size < 0 {
            return Err(Error::invalid(format!(
                "negative page size is not allowed: {}",
                page_size
            )));
        }

        let offset = if page_token.is_empty() {
            0
        } else {
            *self.tokens.lock().get(page_token).ok_or_else(|| {
                Error::NotFound(format!("pagination token {}", page_token))
            })?
        };

        Ok(PageWindow {
            size: page_size as usize,
            offset,
        })
    }

    /// Mint a token pointing at the page after `window`
    pub fn mint(&self, window: PageWindow) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let next = window.offset + window.size;
        self.tokens.lock().insert(token.clone(), next);
        debug!("Minted page token {} at offset {}", token, next);
        token
    }

    /// Slice one page and produce the token for the next, empty at the end
    pub fn paginate<T>(&self, items: Vec<T>, window: PageWindow) -> (Vec<T>, String) {
        let (page, has_more) = limit(items, window.offset, window.size);
        let token = if has_more {
            self.mint(window)
        } else {
            String::new()
        };
        (page, token)
    }

    /// Number of tokens ever minted and still held
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

/// Slice `items` starting at `offset`, bounded by `size` (0 = no limit).
///
/// The flag is true iff the page stops before the end of `items`.
pub fn limit<T>(items: Vec<T>, offset: usize, size: usize) -> (Vec<T>, bool) {
    let total = items.len();
    let start = offset.min(total);
    let end = if size == 0 {
        total
    } else {
        start.saturating_add(size).min(total)
    };

    let page = items.into_iter().skip(start).take(end - start).collect();
    (page, end < total)
}
