//! Paginated listing
//!
//! A [`PageCursor`] fully describes which page to fetch; the next cursor is
//! derived from it and the size of the page that came back. Restarting from
//! the first cursor therefore replays the same requests.

use crate::core::error::Result;
use crate::core::traits::PageSource;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(format!("unknown sort direction {:?}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// Position in a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    page_size: NonZeroU32,
    sort: Option<SortOrder>,
    total_count: Option<u64>,
}

impl PageCursor {
    /// Cursor at the first page
    pub fn first(page_size: NonZeroU32) -> Self {
        Self {
            page: 0,
            page_size,
            sort: None,
            total_count: None,
        }
    }

    pub fn at_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortOrder {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    pub fn sort(&self) -> Option<&SortOrder> {
        self.sort.as_ref()
    }

    /// Total item count, once a page has reported it
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Query parameters for this page
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(sort) = &self.sort {
            query.push(("sortByField", sort.field.clone()));
            query.push(("sortBy", sort.direction.as_str().to_string()));
        }
        query
    }

    /// Cursor for the following page, or `None` when the listing is done
    ///
    /// # Arguments
    ///
    /// * `received` - Number of items the current page returned
    /// * `total_count` - Total reported by the server for this page, if any
    pub fn next(&self, received: usize, total_count: Option<u64>) -> Option<Self> {
        let page_size = u64::from(self.page_size.get());
        let total_count = total_count.or(self.total_count);

        if (received as u64) < page_size {
            return None;
        }

        let seen = (u64::from(self.page) + 1) * page_size;
        if total_count.is_some_and(|total| seen >= total) {
            return None;
        }

        Some(Self {
            page: self.page.checked_add(1)?,
            page_size: self.page_size,
            sort: self.sort.clone(),
            total_count,
        })
    }

    /// Back to page 0 with the same size and sort order
    pub fn restart(&self) -> Self {
        Self {
            page: 0,
            page_size: self.page_size,
            sort: self.sort.clone(),
            total_count: None,
        }
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} (size {})", self.page, self.page_size)
    }
}

/// One fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor this page was fetched with
    pub cursor: PageCursor,
    pub total_count: Option<u64>,
}

impl<T> Page<T> {
    pub fn next_cursor(&self) -> Option<PageCursor> {
        self.cursor.next(self.items.len(), self.total_count)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Lazy sequence of pages over a [`PageSource`]
///
/// Nothing is fetched until [`Paginator::next_page`] is called. A failed
/// fetch ends the sequence.
pub struct Paginator<'a, S: ?Sized, T> {
    source: &'a S,
    start: PageCursor,
    next: Option<PageCursor>,
    _item: std::marker::PhantomData<fn() -> T>,
}

impl<'a, S, T> Paginator<'a, S, T>
where
    S: PageSource<T> + ?Sized,
    T: Send,
{
    pub fn new(source: &'a S, start: PageCursor) -> Self {
        Self {
            source,
            next: Some(start.clone()),
            start,
            _item: std::marker::PhantomData,
        }
    }

    pub async fn next_page(&mut self) -> Option<Result<Page<T>>> {
        let cursor = self.next.take()?;
        match self.source.fetch_page(&cursor).await {
            Ok(page) => {
                self.next = page.next_cursor();
                Some(Ok(page))
            }
            Err(error) => Some(Err(error)),
        }
    }

    /// Rewind to the starting cursor
    pub fn restart(&mut self) {
        self.next = Some(self.start.restart().at_page(self.start.page()));
    }

    /// Drain every remaining page
    pub async fn collect_all(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await {
            items.extend(page?.items);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn size(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    /// In-memory listing of `count` ids, optionally hiding the total
    struct Items {
        count: u32,
        report_total: bool,
        requests: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl PageSource<u32> for Items {
        async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<u32>> {
            self.requests.lock().unwrap().push(cursor.page());
            let start = cursor.page() * cursor.page_size();
            let end = (start + cursor.page_size()).min(self.count);
            Ok(Page {
                items: (start.min(end)..end).collect(),
                cursor: cursor.clone(),
                total_count: self.report_total.then_some(u64::from(self.count)),
            })
        }
    }

    fn items(count: u32, report_total: bool) -> Items {
        Items {
            count,
            report_total,
            requests: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_pages_of_ten_ten_five_and_restart() {
        let source = items(25, true);
        let mut pages = Paginator::new(&source, PageCursor::first(size(10)));

        let mut first_run = Vec::new();
        while let Some(page) = pages.next_page().await {
            first_run.push(page.unwrap().items);
        }
        assert_eq!(
            first_run.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![10, 10, 5]
        );

        pages.restart();
        let mut second_run = Vec::new();
        while let Some(page) = pages.next_page().await {
            second_run.push(page.unwrap().items);
        }
        assert_eq!(first_run, second_run);
    }

    #[tokio::test]
    async fn test_exact_multiple_stops_on_total_count() {
        let source = items(20, true);
        let all = Paginator::new(&source, PageCursor::first(size(10)))
            .collect_all()
            .await
            .unwrap();

        assert_eq!(all.len(), 20);
        assert_eq!(*source.requests.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_exact_multiple_without_total_needs_empty_page() {
        let source = items(20, false);
        let all = Paginator::new(&source, PageCursor::first(size(10)))
            .collect_all()
            .await
            .unwrap();

        assert_eq!(all.len(), 20);
        assert_eq!(*source.requests.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_nothing_is_fetched_until_asked() {
        let source = items(5, true);
        let mut pages = Paginator::new(&source, PageCursor::first(size(2)).at_page(1));
        assert!(source.requests.lock().unwrap().is_empty());

        let page = pages.next_page().await.unwrap().unwrap();
        assert_eq!(page.items, vec![2, 3]);
    }

    #[test]
    fn test_query_includes_sort_only_when_set() {
        let cursor = PageCursor::first(size(25)).at_page(2);
        assert_eq!(
            cursor.query(),
            vec![("page", "2".to_string()), ("pageSize", "25".to_string())]
        );

        let sorted = cursor.sorted_by("label", SortDirection::Desc);
        assert_eq!(
            sorted.query()[2..],
            [
                ("sortByField", "label".to_string()),
                ("sortBy", "DESC".to_string())
            ]
        );
    }

    #[test]
    fn test_next_and_restart_keep_sort() {
        let cursor = PageCursor::first(size(10)).sorted_by("id", SortDirection::Asc);

        let next = cursor.next(10, Some(30)).unwrap();
        assert_eq!(next.page(), 1);
        assert_eq!(next.total_count(), Some(30));
        assert_eq!(next.sort(), cursor.sort());

        assert!(next.next(9, None).is_none());
        assert!(next.next(0, None).is_none());

        let restarted = next.restart();
        assert_eq!(restarted, cursor);
    }

    #[test]
    fn test_sort_direction_from_str() {
        assert_eq!("desc".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert!("up".parse::<SortDirection>().is_err());
    }
}
