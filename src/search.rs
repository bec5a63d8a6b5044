//! Ranked retrieval over the catalog.
//!
//! Three read-only modes, all projected through the same row resolution as
//! the exact queries:
//!
//! - [`simple_search`](Catalog::simple_search): sanitized substring
//!   OR-query over the `info` and `version` fields.
//! - [`full_text_search`](Catalog::full_text_search): FTS5 MATCH of the
//!   raw term over `info`, `version` and `date`.
//! - [`fuzzy_search`](Catalog::fuzzy_search): FTS5 MATCH over the stored
//!   phonetic encoding, so spelling variants of the same-sounding word
//!   ("Smith", "Smyth") meet on one code.

use crate::catalog::{collect_raw, raw_from_row, Catalog, FileVersion, VERSION_COLUMNS};
use crate::error::{Result, StoreError};
use crate::phonetic;
use rusqlite::params;

impl Catalog {
    /// Substring OR-search over the info and version fields.
    ///
    /// Each word is accepted as a whole-field match, a prefix, a suffix, or
    /// a contained token; all patterns are combined disjunctively across
    /// words and fields. Results come back oldest first (ascending by date,
    /// then version id) — this ordering is asymmetric to `history` and kept
    /// deliberately for compatibility.
    pub fn simple_search(&self, words: &[&str], limit: u32) -> Result<Vec<FileVersion>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let clause = words
            .iter()
            .flat_map(|word| [build_term("info", word), build_term("version", word)])
            .collect::<Vec<_>>()
            .join(" OR ");

        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM Versions \
                 INNER JOIN Files ON Versions.file = Files.file_id \
                 WHERE {clause} \
                 ORDER BY Versions.date ASC, Versions.version_id ASC \
                 LIMIT ?1"
            ))
            .map_err(|e| StoreError::database("preparing simple search", e))?;
        let raws = collect_raw(stmt.query_map([limit], raw_from_row))?;
        drop(stmt);
        drop(conn);
        self.resolve_all(raws)
    }

    /// Full-text search with the raw term passed straight to FTS5.
    ///
    /// The term is not escaped: the caller may use the native query syntax
    /// (boolean operators, `term*` prefixes, quoted phrases). A caller that
    /// wants a literal phrase must pre-quote it with
    /// [`escape_match_term`]. Results come back newest first.
    pub fn full_text_search(&self, term: &str, limit: u32) -> Result<Vec<FileVersion>> {
        self.fts_search(term, limit, false)
    }

    /// Like [`full_text_search`](Catalog::full_text_search), but matched
    /// against the stored phonetic encoding of the info field: each
    /// whitespace-separated word of the term is phonetically encoded before
    /// matching, so the query meets spelling variants of the indexed words.
    pub fn fuzzy_search(&self, term: &str, limit: u32) -> Result<Vec<FileVersion>> {
        self.fts_search(term, limit, true)
    }

    fn fts_search(&self, term: &str, limit: u32, fuzzy: bool) -> Result<Vec<FileVersion>> {
        let (column, match_term) = if fuzzy {
            ("fuzzy", phonetic::encode(term))
        } else {
            ("info", term.to_string())
        };
        if match_term.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = format!("{{{column} version date}} : ({match_term})");

        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM VersionsFts \
                 INNER JOIN Versions ON Versions.version_id = VersionsFts.rowid \
                 INNER JOIN Files ON Files.file_id = Versions.file \
                 WHERE VersionsFts MATCH ?1 \
                 ORDER BY Versions.date DESC, Versions.version_id DESC \
                 LIMIT ?2"
            ))
            .map_err(|e| StoreError::database("preparing full-text search", e))?;
        let raws = collect_raw(stmt.query_map(params![match_expr, limit], raw_from_row))?;
        drop(stmt);
        drop(conn);
        self.resolve_all(raws)
    }
}

/// Build the four LIKE alternatives for one word against one column:
/// suffix token, prefix token, contained token, whole field.
fn build_term(column: &str, word: &str) -> String {
    let word = sanitize_word(word);
    format!(
        "{column} LIKE '% {word}' OR {column} LIKE '{word} %' \
         OR {column} LIKE '% {word} %' OR {column} LIKE '{word}'"
    )
}

/// Strip quote, percent, semicolon and backslash characters from a search
/// word before it is spliced into a LIKE pattern. The stripping is lossy
/// (characters are deleted, not escaped) and pinned for compatibility.
fn sanitize_word(word: &str) -> String {
    word.chars()
        .filter(|c| !matches!(c, '\'' | '%' | ';' | '"' | '\\'))
        .collect()
}

/// Escape an individual FTS5 match term by enclosing it in double quotes
/// and doubling any quotes inside it, so it matches as a literal phrase.
/// `term"bla"` becomes `"term""bla"""`.
pub fn escape_match_term(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\"\""))
}
