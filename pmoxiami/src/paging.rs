//! Lazy paging over remote collections
//!
//! A [`PagedSequence`] turns a page-fetch function into a forward-only
//! iterator of items. The first page is fetched when the sequence is built,
//! which fixes the total count before any item is pulled. Each later fetch
//! receives a [`PageCursor`] by value: the next page number and the page size
//! the server actually used for the previous page.
//!
//! Xiami reports paging metadata in a `pagingVO` object whose fields are
//! numbers or numeric strings. Depending on the action it carries `pages`
//! (page count), `count` (item count) or both; some containers add a
//! top-level `total`. [`PagingInfo`] reads all of them.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::iter::FusedIterator;
use tracing::debug;

/// Position of a page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageCursor {
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl PageCursor {
    pub fn first(page_size: u32) -> Self {
        Self { page: 1, page_size }
    }

    /// Cursor of the following page with the given size
    pub fn next(self, page_size: u32) -> Self {
        Self {
            page: self.page + 1,
            page_size,
        }
    }
}

/// Normalized `pagingVO` metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingInfo {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Number of pages
    pub pages: Option<u32>,
    /// Number of items
    pub count: Option<u32>,
}

impl PagingInfo {
    /// Reads `container.pagingVO`; absent fields stay `None`
    pub fn from_container(container: &Value) -> Self {
        let Some(paging) = container.get("pagingVO") else {
            return Self::default();
        };
        Self {
            page: paging.get("page").and_then(parse_count),
            page_size: paging.get("pageSize").and_then(parse_count),
            pages: paging.get("pages").and_then(parse_count),
            count: paging.get("count").and_then(parse_count),
        }
    }
}

/// Reads a count sent as a JSON number or a numeric string
pub fn parse_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

type FetchPage<'a> = Box<dyn FnMut(PageCursor) -> Result<Option<Value>> + 'a>;
type DeserializeItem<'a, T> = Box<dyn FnMut(Value) -> Result<T> + 'a>;

/// One-shot sequence over a paginated collection
///
/// Yields `Result<T>`: a failed page fetch is yielded once and ends the
/// sequence; a failed item conversion is yielded and iteration goes on.
/// Once exhausted the sequence stays empty; build a new one to start over.
///
/// The total is fixed by the first page: `pagingVO.count`, else the
/// container's `total`, else `pages * pageSize` (an upper bound), else 0.
/// Without a page count, iteration stops once that declared total is reached.
pub struct PagedSequence<'a, T> {
    fetch: FetchPage<'a>,
    deserialize: DeserializeItem<'a, T>,
    item_field: String,
    cursor: PageCursor,
    pages: Option<u32>,
    declared_count: Option<usize>,
    total: usize,
    total_exact: bool,
    emitted: usize,
    last_page_len: usize,
    items: std::vec::IntoIter<Value>,
    done: bool,
}

impl<'a, T> PagedSequence<'a, T> {
    /// Builds a sequence and fetches its first page
    ///
    /// # Arguments
    ///
    /// * `page_size` - Size requested for the first page
    /// * `item_field` - Field of the page container holding the items
    /// * `fetch` - Returns the page container for a cursor, `None` for no data
    /// * `deserialize` - Converts one raw item
    ///
    /// # Errors
    ///
    /// Returns the error of the first fetch.
    pub fn new<F, D>(
        page_size: u32,
        item_field: impl Into<String>,
        fetch: F,
        deserialize: D,
    ) -> Result<Self>
    where
        F: FnMut(PageCursor) -> Result<Option<Value>> + 'a,
        D: FnMut(Value) -> Result<T> + 'a,
    {
        let first = PageCursor::first(page_size);
        let mut sequence = Self {
            fetch: Box::new(fetch),
            deserialize: Box::new(deserialize),
            item_field: item_field.into(),
            cursor: first,
            pages: None,
            declared_count: None,
            total: 0,
            total_exact: true,
            emitted: 0,
            last_page_len: 0,
            items: Vec::new().into_iter(),
            done: false,
        };

        let container = (sequence.fetch)(first)?;

        if let Some(container) = container.as_ref().filter(|c| !c.is_null()) {
            let info = PagingInfo::from_container(container);
            let declared = info
                .count
                .or_else(|| container.get("total").and_then(parse_count))
                .map(|c| c as usize);

            sequence.pages = info.pages;
            sequence.declared_count = declared;
            sequence.total_exact = declared.is_some();
            sequence.total = declared
                .or_else(|| {
                    let pages = info.pages? as usize;
                    let size = info.page_size.unwrap_or(page_size) as usize;
                    Some(pages * size)
                })
                .unwrap_or(0);
        }

        sequence.accept_page(first, container);
        debug!(
            "Paged sequence over `{}`: total={}, pages={:?}",
            sequence.item_field, sequence.total, sequence.pages
        );

        Ok(sequence)
    }

    /// Total item count known from the first page
    ///
    /// When the server only sends a page count this is `pages * pageSize`,
    /// which overestimates when the last page is short; see
    /// [`PagedSequence::is_total_exact`].
    pub fn total(&self) -> usize {
        self.total
    }

    /// False when [`PagedSequence::total`] is an estimate or unknown (0)
    pub fn is_total_exact(&self) -> bool {
        self.total_exact
    }

    /// Cursor of the page currently held
    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Items yielded so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn is_exhausted(&self) -> bool {
        self.done
    }

    fn accept_page(&mut self, requested: PageCursor, container: Option<Value>) {
        let Some(mut container) = container.filter(|c| !c.is_null()) else {
            self.last_page_len = 0;
            self.items = Vec::new().into_iter();
            self.done = true;
            return;
        };

        let info = PagingInfo::from_container(&container);
        let page_size = info
            .page_size
            .filter(|size| *size > 0)
            .unwrap_or(requested.page_size);
        if page_size != requested.page_size {
            debug!(
                "Server used page size {} instead of {}",
                page_size, requested.page_size
            );
        }

        let items = match container.get_mut(&self.item_field).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        self.cursor = PageCursor {
            page: requested.page,
            page_size,
        };
        self.last_page_len = items.len();
        self.items = items.into_iter();
    }

    /// Only without a page count; otherwise the pages decide
    fn reached_declared_count(&self) -> bool {
        match (self.pages, self.declared_count) {
            (None, Some(count)) => self.emitted >= count,
            _ => false,
        }
    }

    fn has_more_pages(&self) -> bool {
        if let Some(pages) = self.pages {
            return self.cursor.page < pages;
        }
        if self.last_page_len == 0 {
            return false;
        }
        match self.declared_count {
            Some(count) => self.emitted < count,
            None => true,
        }
    }
}

impl<'a, T: DeserializeOwned> PagedSequence<'a, T> {
    /// Builds a sequence whose items are read with serde
    pub fn deserialized<F>(page_size: u32, item_field: impl Into<String>, fetch: F) -> Result<Self>
    where
        F: FnMut(PageCursor) -> Result<Option<Value>> + 'a,
    {
        Self::new(page_size, item_field, fetch, |raw| {
            Ok(serde_json::from_value(raw)?)
        })
    }
}

impl<T> Iterator for PagedSequence<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if self.reached_declared_count() {
                self.done = true;
                return None;
            }

            if let Some(raw) = self.items.next() {
                self.emitted += 1;
                return Some((self.deserialize)(raw));
            }

            if !self.has_more_pages() {
                self.done = true;
                return None;
            }

            let next = self.cursor.next(self.cursor.page_size);
            debug!(
                "Fetching page {} of `{}` (size {})",
                next.page, self.item_field, next.page_size
            );
            match (self.fetch)(next) {
                Ok(container) => self.accept_page(next, container),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<T> FusedIterator for PagedSequence<'_, T> {}

impl<T> fmt::Debug for PagedSequence<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedSequence")
            .field("item_field", &self.item_field)
            .field("cursor", &self.cursor)
            .field("pages", &self.pages)
            .field("total", &self.total)
            .field("emitted", &self.emitted)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Builds a [`PagedSequence`]; see [`PagedSequence::new`]
pub fn paginate<'a, T, F, D>(
    page_size: u32,
    item_field: &str,
    fetch: F,
    deserialize: D,
) -> Result<PagedSequence<'a, T>>
where
    F: FnMut(PageCursor) -> Result<Option<Value>> + 'a,
    D: FnMut(Value) -> Result<T> + 'a,
{
    PagedSequence::new(page_size, item_field, fetch, deserialize)
}
