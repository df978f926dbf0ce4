//! Client-side narrowing of the catalog and of a formatted highlight block.
//!
//! Everything here is pure: the same input and term always produce the same
//! output, and an empty term leaves the input untouched.

use std::borrow::Cow;

use regex::RegexBuilder;
use serde::Serialize;

use crate::kobo::{NO_HIGHLIGHTS, SECTION_SEPARATOR};
use crate::model::BookEntry;

/// Message shown when no highlight section matches `term`.
pub fn no_results(term: &str) -> String {
    format!("no results found for \"{}\"", term)
}

/// Keeps the books whose title or author contains `term`, ignoring case.
pub fn filter_catalog<'a>(entries: &'a [BookEntry], term: &str) -> Vec<&'a BookEntry> {
    if term.is_empty() {
        return entries.iter().collect();
    }

    let needle = term.to_lowercase();
    entries
        .iter()
        .filter(|book| {
            book.title.to_lowercase().contains(&needle)
                || book
                    .author
                    .as_deref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Keeps the highlight sections that contain `term`, ignoring case.
///
/// Sections are delimited by [`SECTION_SEPARATOR`] and rejoined with it, so
/// filtering already filtered text with the same term is a no-op.
pub fn filter_highlights<'a>(text: &'a str, term: &str) -> Cow<'a, str> {
    if term.is_empty() || text.is_empty() || text == NO_HIGHLIGHTS {
        return Cow::Borrowed(text);
    }

    let needle = term.to_lowercase();
    let matching: Vec<&str> = text
        .split(SECTION_SEPARATOR)
        .filter(|section| section.to_lowercase().contains(&needle))
        .collect();

    if matching.is_empty() {
        Cow::Owned(no_results(term))
    } else {
        Cow::Owned(matching.join(SECTION_SEPARATOR))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub emphasized: bool,
}

/// One line of text split into plain and emphasized segments.
pub type Line = Vec<Segment>;

/// Splits `text` into lines and tags every case-insensitive occurrence of
/// `term` for emphasis. The term is matched literally.
pub fn emphasize(text: &str, term: &str) -> Vec<Line> {
    let plain = |line: &str| {
        if line.is_empty() {
            Vec::new()
        } else {
            vec![Segment {
                text: line.to_string(),
                emphasized: false,
            }]
        }
    };

    if term.is_empty() {
        return text.split('\n').map(plain).collect();
    }

    // an escaped literal always compiles; fall back to plain lines regardless
    let Ok(pattern) = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    else {
        return text.split('\n').map(plain).collect();
    };

    text.split('\n')
        .map(|line| {
            let mut segments = Vec::new();
            let mut last = 0;
            for m in pattern.find_iter(line) {
                if m.start() > last {
                    segments.push(Segment {
                        text: line[last..m.start()].to_string(),
                        emphasized: false,
                    });
                }
                segments.push(Segment {
                    text: m.as_str().to_string(),
                    emphasized: true,
                });
                last = m.end();
            }
            if last < line.len() {
                segments.push(Segment {
                    text: line[last..].to_string(),
                    emphasized: false,
                });
            }
            segments
        })
        .collect()
}
