//! Builds small Kobo-shaped database images for tests.

use libsql::Builder;

use crate::engine::{DatabaseHandle, EngineCell};
use crate::kobo::BOOK_CONTENT_TYPE;

const CONTENT_SCHEMA: &str = r#"
CREATE TABLE content (
    ContentID TEXT NOT NULL PRIMARY KEY,
    ContentType INTEGER NOT NULL,
    Title TEXT,
    Attribution TEXT
);
"#;

const BOOKMARK_SCHEMA: &str = r#"
CREATE TABLE Bookmark (
    BookmarkID TEXT NOT NULL PRIMARY KEY,
    VolumeID TEXT NOT NULL,
    Text TEXT,
    Annotation TEXT,
    DateCreated TEXT
);
"#;

const CHAPTER_CONTENT_TYPE: i32 = 9;

pub(crate) struct KoboFixture {
    content: Vec<(String, i32, Option<String>, Option<String>)>,
    bookmarks: Vec<(String, Option<String>, Option<String>, String)>,
    with_bookmark_table: bool,
    with_content_table: bool,
}

impl KoboFixture {
    pub fn new() -> Self {
        KoboFixture {
            content: Vec::new(),
            bookmarks: Vec::new(),
            with_bookmark_table: true,
            with_content_table: true,
        }
    }

    pub fn book(mut self, id: &str, title: &str, author: Option<&str>) -> Self {
        self.content
            .push((id.into(), BOOK_CONTENT_TYPE, Some(title.into()), author.map(Into::into)));
        self
    }

    pub fn chapter(mut self, id: &str, title: &str) -> Self {
        self.content
            .push((id.into(), CHAPTER_CONTENT_TYPE, Some(title.into()), None));
        self
    }

    pub fn untitled_book(mut self, id: &str) -> Self {
        self.content.push((id.into(), BOOK_CONTENT_TYPE, None, None));
        self
    }

    /// Adds a bookmark row. `date` orders highlights within a book.
    pub fn highlight(mut self, volume_id: &str, text: Option<&str>, note: Option<&str>, date: &str) -> Self {
        self.bookmarks.push((
            volume_id.into(),
            text.map(Into::into),
            note.map(Into::into),
            date.into(),
        ));
        self
    }

    /// Produces an image whose schema lacks the bookmark table.
    pub fn without_bookmark_table(mut self) -> Self {
        self.with_bookmark_table = false;
        self
    }

    /// Produces an image without the `content` table. Books added to the
    /// builder are ignored.
    pub fn without_content_table(mut self) -> Self {
        self.with_content_table = false;
        self
    }

    pub async fn build(self) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KoboReader.sqlite");

        {
            let db = Builder::new_local(&path).build().await.unwrap();
            let conn = db.connect().unwrap();

            if self.with_content_table {
                conn.execute_batch(CONTENT_SCHEMA).await.unwrap();
            } else {
                conn.execute_batch("CREATE TABLE shelf (Name TEXT);").await.unwrap();
            }
            if self.with_bookmark_table {
                conn.execute_batch(BOOKMARK_SCHEMA).await.unwrap();
            }

            let content = if self.with_content_table { self.content } else { Vec::new() };
            for (id, content_type, title, author) in content {
                conn.execute(
                    "INSERT INTO content (ContentID, ContentType, Title, Attribution) VALUES (?, ?, ?, ?)",
                    libsql::params![id, content_type, title, author],
                )
                .await
                .unwrap();
            }

            for (i, (volume_id, text, note, date)) in self.bookmarks.into_iter().enumerate() {
                conn.execute(
                    "INSERT INTO Bookmark (BookmarkID, VolumeID, Text, Annotation, DateCreated) VALUES (?, ?, ?, ?, ?)",
                    libsql::params![format!("bm-{i}"), volume_id, text, note, date],
                )
                .await
                .unwrap();
            }
        }

        std::fs::read(&path).unwrap()
    }
}

pub(crate) async fn open(bytes: Vec<u8>) -> DatabaseHandle {
    let cell = EngineCell::default();
    let engine = cell.get().await.unwrap();
    engine.open(bytes.into()).await.unwrap()
}

/// The "Dune" library used across tests: one book with two highlights, one
/// book with none.
pub(crate) async fn dune() -> Vec<u8> {
    KoboFixture::new()
        .book("dune", "Dune", Some("Frank Herbert"))
        .book("emma", "Emma", Some("Jane Austen"))
        .highlight("dune", Some("I must not fear"), Some("mantra"), "2024-01-02T00:00:00Z")
        .highlight("dune", Some("Fear is the mind-killer"), None, "2024-01-01T00:00:00Z")
        .build()
        .await
}
