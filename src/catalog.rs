use crate::models::{Book, BookChunk};
use crate::store::Store;
use anyhow::Result;
use once_cell::sync::Lazy;

// Genre vocabulary offered by the catalog filter.
pub static GENRES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "fiction",
        "classics",
        "20th-century",
        "non-fiction",
        "history",
        "literature",
        "historical-fiction",
        "historical",
        "novels",
        "romance",
        "short-stories",
        "biography",
        "adventure",
        "fantasy",
        "literary-fiction",
        "american",
        "adult",
        "philosophy",
        "school",
        "mystery",
    ]
});

/// Read-only accessor over the book collection. Listing is a full scan;
/// filtering and pagination happen in memory on the scanned set.
#[derive(Debug, Clone)]
pub struct Catalog {
    store: Store,
}

impl Catalog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn books_all(&self) -> Result<Vec<Book>> {
        self.store.books_all().await
    }

    pub async fn book_get(&self, id: &str) -> Result<Option<Book>> {
        self.store.book_get(id).await
    }

    /// Books whose genre set intersects the given set. An empty set matches
    /// every book.
    pub async fn books_by_genres(&self, genres: &[String]) -> Result<Vec<Book>> {
        let books = self.store.books_all().await?;
        if genres.is_empty() {
            return Ok(books);
        }
        Ok(books
            .into_iter()
            .filter(|book| book.genres.iter().any(|g| genres.contains(g)))
            .collect())
    }

    /// Catalog-screen search: case-insensitive title substring plus genre
    /// narrowing (a book must carry every selected genre, as the filter
    /// modal composed them), sliced into pages.
    pub async fn book_query(
        &self,
        filter: &str,
        genres: &[String],
        page_size: u32,
        page: u32,
    ) -> Result<BookChunk> {
        let needle = filter.to_lowercase();
        let books = self.store.books_all().await?;

        let matched: Vec<Book> = books
            .into_iter()
            .filter(|book| book.title.to_lowercase().contains(&needle))
            .filter(|book| genres.iter().all(|g| book.genres.contains(g)))
            .collect();

        let total_count = matched.len() as u32;
        let items: Vec<Book> = matched
            .into_iter()
            .skip((page_size * page) as usize)
            .take(page_size as usize)
            .collect();

        Ok(BookChunk { items, total_count })
    }
}
