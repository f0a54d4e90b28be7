//! Merge, dedupe, filter, and rank book candidates.
//!
//! Everything in this module is pure apart from the random shuffles and the
//! random tiebreak in [`rank_chinese_kids_books`].
//!
//! # Chinese list selection
//!
//! ```text
//! sources ──shuffle each──► concat ──► dedupe (title|authors)
//!         ──► filter (CJK + deny-list) ──► rank ──► dedupe (title) ──► take N
//! ```
//!
//! The score weights are fixed tuning constants; keep them as they are.

use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::{Rng, rng};
use std::cmp::Ordering;

use crate::models::Book;
use crate::sources::award::AWARD_DOMAIN;
use crate::sources::kcls::KCLS_DOMAIN;
use crate::utils::{contains_cjk, deny_hit, normalize_key};

pub const OPEN_LIBRARY_DOMAIN: &str = "openlibrary.org";

/// Content the Chinese list must never show.
pub const CHINESE_DENY: &[&str] = &["言情", "成人", "耽美", "色情", "恐怖", "犯罪", "悬疑", "杀人", "谋杀"];

/// Pre-trusted sources: exempt from the deny-list and the CJK check.
pub const TRUSTED_DOMAINS: &[&str] = &[KCLS_DOMAIN];

pub const KID_SIGNALS: &[&str] = &["儿童", "少儿", "童话", "少年", "小学生", "图画书", "绘本", "成长", "校园", "故事"];

const SCORE_KCLS: i32 = 6;
const SCORE_AWARD: i32 = 4;
const SCORE_OPEN_LIBRARY: i32 = 2;
const SCORE_KID_SIGNAL: i32 = 1;
const SCORE_CJK_TITLE: i32 = 2;

/// Drop later books with the same title and authors.
pub fn dedupe_books(books: Vec<Book>) -> Vec<Book> {
    books.into_iter().unique_by(Book::broad_key).collect()
}

/// Drop later books with the same title, whoever wrote them.
pub fn dedupe_by_title(books: Vec<Book>) -> Vec<Book> {
    books.into_iter().unique_by(Book::title_key).collect()
}

/// Dedupe strings by normalized key; empty strings are dropped.
pub fn dedupe_strings(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .filter(|s| !normalize_key(s).is_empty())
        .unique_by(|s| normalize_key(s))
        .collect()
}

pub fn shuffle<T>(mut items: Vec<T>) -> Vec<T> {
    items.shuffle(&mut rng());
    items
}

/// Shuffle each source list, concatenate in source order, dedupe.
///
/// Shuffling per source keeps a source's own ordering from deciding which
/// of its books survive the later cut.
pub fn merge_sources(sources: Vec<Vec<Book>>) -> Vec<Book> {
    dedupe_books(sources.into_iter().flat_map(shuffle::<Book>).collect())
}

pub fn is_likely_chinese(book: &Book) -> bool {
    contains_cjk(&book.title) || contains_cjk(&book.authors) || contains_cjk(&book.blurb)
}

pub fn is_trusted(book: &Book) -> bool {
    TRUSTED_DOMAINS.iter().any(|d| book.from_domain(d))
}

/// Keep Chinese-language, kid-appropriate books.
///
/// Books from a trusted domain skip both checks.
pub fn filter_chinese_kids_books(books: Vec<Book>) -> Vec<Book> {
    books
        .into_iter()
        .filter(|b| {
            if is_trusted(b) {
                return true;
            }
            if !is_likely_chinese(b) {
                return false;
            }
            !deny_hit(&format!("{} {}", b.title, b.blurb), CHINESE_DENY)
        })
        .collect()
}

pub fn score(book: &Book) -> i32 {
    let mut score = 0;
    if book.from_domain(KCLS_DOMAIN) {
        score += SCORE_KCLS;
    }
    if book.from_domain(AWARD_DOMAIN) {
        score += SCORE_AWARD;
    }
    if book.from_domain(OPEN_LIBRARY_DOMAIN) {
        score += SCORE_OPEN_LIBRARY;
    }
    let text = format!("{} {}", book.title, book.blurb).to_lowercase();
    score += KID_SIGNALS.iter().filter(|k| text.contains(*k)).count() as i32 * SCORE_KID_SIGNAL;
    if contains_cjk(&book.title) {
        score += SCORE_CJK_TITLE;
    }
    score
}

/// Highest score first; equal scores in random order.
pub fn rank_chinese_kids_books(books: Vec<Book>) -> Vec<Book> {
    let mut r = rng();
    let mut scored: Vec<(i32, f64, Book)> = books
        .into_iter()
        .map(|b| (score(&b), r.random::<f64>(), b))
        .collect();
    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    });
    scored.into_iter().map(|(_, _, b)| b).collect()
}

/// Filter, rank, collapse same-title finalists, and keep `limit`.
pub fn select_chinese_kids_books(merged: Vec<Book>, limit: usize) -> Vec<Book> {
    let ranked = rank_chinese_kids_books(filter_chinese_kids_books(merged));
    let mut finalists = dedupe_by_title(ranked);
    finalists.truncate(limit);
    finalists
}
