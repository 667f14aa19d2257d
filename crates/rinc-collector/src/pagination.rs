use std::future::Future;

/// Number of items requested per page by every paged listing.
pub const PAGE_SIZE: u32 = 30;

/// One page of a cursor-paged listing. An empty `next` marks the last page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: String,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: impl Into<String>) -> Self {
        Self {
            items,
            next: next.into(),
        }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, String::new())
    }
}

/// Calls `fetch` starting from an empty cursor and follows `next` until it is
/// empty, returning every item in call order.
///
/// The first failed page aborts the whole listing; nothing collected so far is
/// returned.
///
/// # Examples
///
/// ```
/// use rinc_collector::pagination::{collect_pages, Page};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let all = collect_pages(|cursor: String| async move {
///     Ok::<_, String>(match cursor.as_str() {
///         "" => Page::new(vec![1, 2], "p2"),
///         _ => Page::last(vec![3]),
///     })
/// })
/// .await;
/// assert_eq!(all, Ok(vec![1, 2, 3]));
/// # }
/// ```
pub async fn collect_pages<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = Vec::new();
    let mut cursor = String::new();
    let mut pages = 0usize;

    loop {
        let page = fetch(std::mem::take(&mut cursor)).await?;
        pages += 1;
        items.extend(page.items);
        if page.next.is_empty() {
            tracing::info!(pages, items = items.len(), "collected all pages");
            return Ok(items);
        }
        cursor = page.next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn follows_cursors_until_empty() {
        let calls = AtomicUsize::new(0);
        let seen = std::sync::Mutex::new(Vec::new());

        let items = collect_pages(|cursor| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(cursor.clone());
            async move {
                Ok::<_, String>(match cursor.as_str() {
                    "" => Page::new(vec!["a1", "a2"], "a"),
                    "a" => Page::new(vec!["b1"], "b"),
                    "b" => Page::last(vec!["c1", "c2"]),
                    other => return Err(format!("unexpected cursor {other}")),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(items, ["a1", "a2", "b1", "c1", "c2"]);
        assert_eq!(*seen.lock().unwrap(), ["", "a", "b"]);
    }

    #[tokio::test]
    async fn first_failure_aborts_without_partial_results() {
        let calls = AtomicUsize::new(0);
        let result = collect_pages(|cursor| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if cursor.is_empty() {
                    Ok(Page::new(vec![1], "next"))
                } else {
                    Err("page 2 failed")
                }
            }
        })
        .await;

        assert_eq!(result, Err("page 2 failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn single_empty_page() {
        let items: Vec<u8> = collect_pages(|_| async { Ok::<_, ()>(Page::last(vec![])) })
            .await
            .unwrap();
        assert!(items.is_empty());
    }
}
