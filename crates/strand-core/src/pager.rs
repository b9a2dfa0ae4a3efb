//! Incremental fetching from a cursor-paged source.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("page fetch failed: {0}")]
    Fetch(String),
}

impl PageError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        PageError::Fetch(msg.into())
    }
}

/// One batch of items plus the cursor to resume from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// The final page: nothing follows it.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    /// An intermediate page pointing at the next one.
    pub fn with_next(items: Vec<T>, cursor: impl Into<String>) -> Self {
        Self {
            items,
            next_cursor: Some(cursor.into()),
        }
    }
}

/// Where pages come from.
///
/// The seam for swapping transports (and for canned sources in tests). The
/// first fetch receives `None`; each later fetch receives the cursor the
/// previous page returned. An empty page with a cursor is legal and keeps
/// the pagination going.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<Self::Item>, PageError>;
}

/// Items accumulated from a [`PageSource`], fetched incrementally.
pub struct PagedCollection<S: PageSource> {
    source: S,
    items: Vec<S::Item>,
    cursor: Option<String>,
    exhausted: bool,
}

impl<S: PageSource> PagedCollection<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            items: Vec::new(),
            cursor: None,
            exhausted: false,
        }
    }

    /// Fetch one page and append its items.
    ///
    /// Returns `true` while more pages remain and `false` once the source is
    /// exhausted; further calls after exhaustion are no-ops returning
    /// `false`. On error the cursor is left unchanged, so the same page can
    /// be retried.
    pub async fn fetch_next(&mut self) -> Result<bool, PageError> {
        if self.exhausted {
            return Ok(false);
        }
        let page = self.source.fetch_page(self.cursor.as_deref()).await?;
        self.items.extend(page.items);
        match page.next_cursor {
            Some(cursor) => {
                self.cursor = Some(cursor);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    /// Fetch until the source reports no further page.
    pub async fn fetch_all(&mut self) -> Result<(), PageError> {
        while self.fetch_next().await? {}
        Ok(())
    }

    pub fn items(&self) -> &[S::Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn into_items(self) -> Vec<S::Item> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serves scripted results in order and records the cursors it saw.
    struct ScriptedSource {
        pages: Mutex<Vec<Result<Page<i32>, PageError>>>,
        seen_cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<Page<i32>, PageError>>) -> Self {
            Self {
                pages: Mutex::new(pages),
                seen_cursors: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        type Item = i32;

        async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<i32>, PageError> {
            self.seen_cursors
                .lock()
                .unwrap()
                .push(cursor.map(str::to_string));
            self.pages.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn items_accumulate_in_page_order() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1, 2], "p2")),
            Ok(Page::with_next(vec![3], "p3")),
            Ok(Page::last(vec![4, 5])),
        ]);
        let mut collection = PagedCollection::new(source);

        collection.fetch_all().await.unwrap();

        assert_eq!(collection.items(), &[1, 2, 3, 4, 5]);
        assert!(collection.is_exhausted());
        assert_eq!(
            collection.source.seen_cursors.lock().unwrap().clone(),
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[tokio::test]
    async fn exhaustion_is_terminal() {
        let source = ScriptedSource::new(vec![Ok(Page::last(vec![1]))]);
        let mut collection = PagedCollection::new(source);

        assert!(!collection.fetch_next().await.unwrap());
        assert!(collection.is_exhausted());

        // Further fetches never hit the source again.
        assert!(!collection.fetch_next().await.unwrap());
        assert_eq!(collection.source.seen_cursors.lock().unwrap().len(), 1);
        assert_eq!(collection.into_items(), vec![1]);
    }

    #[tokio::test]
    async fn empty_page_with_cursor_continues() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![], "p2")),
            Ok(Page::last(vec![7])),
        ]);
        let mut collection = PagedCollection::new(source);

        assert!(collection.fetch_next().await.unwrap());
        assert!(collection.is_empty());
        assert!(!collection.fetch_next().await.unwrap());
        assert_eq!(collection.items(), &[7]);
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn fetch_error_leaves_the_cursor_retryable() {
        let source = ScriptedSource::new(vec![
            Ok(Page::with_next(vec![1], "p2")),
            Err(PageError::fetch("server hiccup")),
            Ok(Page::last(vec![2])),
        ]);
        let mut collection = PagedCollection::new(source);

        assert!(collection.fetch_next().await.unwrap());
        let err = collection.fetch_next().await.unwrap_err();
        assert_eq!(err.to_string(), "page fetch failed: server hiccup");

        // Items and cursor are untouched; the retry resumes at p2.
        assert_eq!(collection.items(), &[1]);
        assert!(!collection.is_exhausted());
        assert!(!collection.fetch_next().await.unwrap());
        assert_eq!(collection.items(), &[1, 2]);
        assert_eq!(
            collection.source.seen_cursors.lock().unwrap().clone(),
            vec![None, Some("p2".to_string()), Some("p2".to_string())]
        );
    }
}
