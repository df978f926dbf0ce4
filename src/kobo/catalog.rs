use crate::engine::DatabaseHandle;
use crate::error::CatalogExtractionError;
use crate::kobo::BOOK_CONTENT_TYPE;
use crate::model::BookEntry;

/// Row cap of the degraded strategy.
pub const FALLBACK_LIMIT: u32 = 100;

/// One way of reading the catalog out of the `content` table.
#[derive(Debug, Clone, Copy)]
pub struct QueryStrategy {
    pub name: &'static str,
    pub sql: &'static str,
    pub limit: Option<u32>,
    /// Move on to the next strategy when this one finds no books.
    pub fall_through_when_empty: bool,
}

/// Books with at least one bookmark row.
pub const PRIMARY: QueryStrategy = QueryStrategy {
    name: "primary",
    sql: r#"
SELECT DISTINCT
    content.ContentID,
    content.Title AS BookTitle,
    content.Attribution AS Author
FROM content
INNER JOIN bookmark ON content.ContentID = bookmark.VolumeID
WHERE content.ContentType = ?
    AND content.Title IS NOT NULL
    AND content.Title != ''
ORDER BY content.Title
"#,
    limit: None,
    fall_through_when_empty: true,
};

/// Every book-type row, for schemas where the bookmark join is unusable.
pub const DEGRADED: QueryStrategy = QueryStrategy {
    name: "degraded",
    sql: r#"
SELECT DISTINCT
    content.ContentID,
    content.Title AS BookTitle,
    content.Attribution AS Author
FROM content
WHERE content.ContentType = ?
    AND content.Title IS NOT NULL
    AND content.Title != ''
ORDER BY content.Title
"#,
    limit: Some(FALLBACK_LIMIT),
    fall_through_when_empty: false,
};

pub const STRATEGIES: &[QueryStrategy] = &[PRIMARY, DEGRADED];

impl QueryStrategy {
    fn statement(&self) -> String {
        match self.limit {
            Some(limit) => format!("{}LIMIT {}", self.sql, limit),
            None => self.sql.to_string(),
        }
    }

    pub async fn run(&self, handle: &DatabaseHandle) -> Result<Vec<BookEntry>, libsql::Error> {
        let mut rows = handle
            .connection()
            .query(&self.statement(), libsql::params![BOOK_CONTENT_TYPE])
            .await?;
        let mut books = Vec::new();

        while let Some(row) = rows.next().await? {
            let content_id: String = row.get(0)?;
            let title: Option<String> = row.get(1)?;
            let author: Option<String> = row.get(2)?;

            match BookEntry::from_row(content_id, title, author) {
                Some(book) => books.push(book),
                None => tracing::debug!(strategy = self.name, "skipping row with blank title"),
            }
        }

        Ok(books)
    }
}

#[derive(Debug, Clone)]
pub struct CatalogOutcome {
    pub books: Vec<BookEntry>,
    /// Name of the strategy that produced `books`.
    pub strategy: &'static str,
    /// Number of strategies that were run.
    pub attempts: usize,
}

pub async fn extract_catalog(handle: &DatabaseHandle) -> Result<CatalogOutcome, CatalogExtractionError> {
    extract_with(handle, STRATEGIES).await
}

/// Runs `strategies` in order, each at most once. The first one that yields
/// books (or the last one that succeeds) wins; the last failure is returned
/// when none succeeds.
pub async fn extract_with(
    handle: &DatabaseHandle,
    strategies: &[QueryStrategy],
) -> Result<CatalogOutcome, CatalogExtractionError> {
    let mut last_error = None;
    let mut empty = None;

    for (i, strategy) in strategies.iter().enumerate() {
        let attempts = i + 1;
        match strategy.run(handle).await {
            Ok(books) if books.is_empty() && strategy.fall_through_when_empty => {
                tracing::info!(strategy = strategy.name, "catalog query found no books, trying next strategy");
                empty = Some(CatalogOutcome {
                    books,
                    strategy: strategy.name,
                    attempts,
                });
            }
            Ok(books) => {
                tracing::info!(strategy = strategy.name, count = books.len(), "catalog loaded");
                return Ok(CatalogOutcome {
                    books,
                    strategy: strategy.name,
                    attempts,
                });
            }
            Err(e) => {
                tracing::warn!(strategy = strategy.name, error = %e, "catalog query failed");
                last_error = Some(CatalogExtractionError::Query {
                    strategy: strategy.name,
                    source: e,
                });
            }
        }
    }

    // a strategy that succeeded with no books beats a later failure
    if let Some(mut outcome) = empty {
        outcome.attempts = strategies.len();
        return Ok(outcome);
    }

    let err = last_error.unwrap_or(CatalogExtractionError::NoStrategies);
    tracing::error!(error = %err, "catalog extraction failed");
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, KoboFixture};

    fn titles(outcome: &CatalogOutcome) -> Vec<&str> {
        outcome.books.iter().map(|b| b.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_primary_lists_books_with_highlights() {
        let handle = fixtures::open(fixtures::dune().await).await;
        let outcome = extract_catalog(&handle).await.unwrap();

        assert_eq!(outcome.strategy, "primary");
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.books,
            vec![BookEntry {
                content_id: "dune".into(),
                title: "Dune".into(),
                author: Some("Frank Herbert".into()),
            }]
        );
    }

    #[tokio::test]
    async fn test_primary_is_distinct_and_ordered_and_skips_non_books() {
        let bytes = KoboFixture::new()
            .book("b", "Zorba", None)
            .book("a", "Anathem", Some("Neal Stephenson"))
            .chapter("a#ch1", "Anathem chapter")
            .untitled_book("x")
            .highlight("b", Some("one"), None, "1")
            .highlight("a", Some("two"), None, "2")
            .highlight("a", Some("three"), None, "3")
            .highlight("a#ch1", Some("four"), None, "4")
            .highlight("x", Some("five"), None, "5")
            .build()
            .await;
        let handle = fixtures::open(bytes).await;

        let outcome = extract_catalog(&handle).await.unwrap();
        assert_eq!(titles(&outcome), vec!["Anathem", "Zorba"]);
        assert_eq!(outcome.books[1].author, None);
    }

    #[tokio::test]
    async fn test_missing_bookmark_table_falls_back_once() {
        let bytes = KoboFixture::new()
            .book("1", "Dune", None)
            .book("2", "Emma", None)
            .without_bookmark_table()
            .build()
            .await;
        let handle = fixtures::open(bytes).await;

        let outcome = extract_catalog(&handle).await.unwrap();
        assert_eq!(outcome.strategy, "degraded");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(titles(&outcome), vec!["Dune", "Emma"]);
    }

    #[tokio::test]
    async fn test_no_highlights_falls_back_to_plain_books() {
        let mut fixture = KoboFixture::new();
        for (id, title) in [("1", "E"), ("2", "D"), ("3", "C"), ("4", "B"), ("5", "A")] {
            fixture = fixture.book(id, title, None);
        }
        let handle = fixtures::open(fixture.build().await).await;

        let outcome = extract_catalog(&handle).await.unwrap();
        assert_eq!(outcome.strategy, "degraded");
        assert_eq!(titles(&outcome), vec!["A", "B", "C", "D", "E"]);
    }

    #[tokio::test]
    async fn test_fallback_is_capped() {
        let mut fixture = KoboFixture::new().without_bookmark_table();
        for i in 0..120 {
            fixture = fixture.book(&format!("id-{i}"), &format!("Book {i:03}"), None);
        }
        let handle = fixtures::open(fixture.build().await).await;

        let outcome = extract_catalog(&handle).await.unwrap();
        assert_eq!(outcome.books.len(), FALLBACK_LIMIT as usize);
        assert_eq!(outcome.books[0].title, "Book 000");
    }

    #[tokio::test]
    async fn test_zero_content_rows_is_empty_not_error() {
        let handle = fixtures::open(KoboFixture::new().build().await).await;

        let outcome = extract_catalog(&handle).await.unwrap();
        assert!(outcome.books.is_empty());
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_all_strategies_failing_surfaces_last_error() {
        let broken = |name| QueryStrategy {
            name,
            sql: "SELECT ContentID FROM no_such_table ",
            limit: None,
            fall_through_when_empty: false,
        };
        let handle = fixtures::open(KoboFixture::new().build().await).await;

        let err = extract_with(&handle, &[broken("first"), broken("second")])
            .await
            .unwrap_err();
        match err {
            CatalogExtractionError::Query { strategy, .. } => assert_eq!(strategy, "second"),
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            extract_with(&handle, &[]).await,
            Err(CatalogExtractionError::NoStrategies)
        ));
    }

    #[tokio::test]
    async fn test_empty_primary_beats_failing_fallback() {
        let broken = QueryStrategy {
            name: "broken",
            sql: "SELECT * FROM no_such_table ",
            limit: None,
            fall_through_when_empty: false,
        };
        let handle = fixtures::open(KoboFixture::new().build().await).await;

        let outcome = extract_with(&handle, &[PRIMARY, broken]).await.unwrap();
        assert_eq!(outcome.strategy, "primary");
        assert!(outcome.books.is_empty());
    }
}
