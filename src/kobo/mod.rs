//! Kobo Module
//!
//! Queries against a `KoboReader.sqlite` image: the catalog of books that
//! carry highlights, and the highlights of a single book.
//!
//! The device schema differs between firmware versions, so the catalog is read
//! through an ordered list of query strategies. The first strategy that
//! produces books wins; results of different strategies are never merged.
//!
//! # Usage
//!
//! ```rust,ignore
//! use koboexport::kobo;
//!
//! let outcome = kobo::extract_catalog(&handle).await?;
//! for book in &outcome.books {
//!     let highlights = kobo::extract_highlights(&handle, &book.content_id).await;
//!     println!("{}", highlights.display_text());
//! }
//! ```

mod catalog;
mod highlights;

pub use catalog::*;
pub use highlights::*;

/// `content.ContentType` value of a whole book, as opposed to chapters and
/// other content kinds.
pub const BOOK_CONTENT_TYPE: i32 = 6;
