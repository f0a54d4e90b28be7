//! Turn a [`Digest`] into email bodies and a narration script.
//!
//! The HTML and plaintext bodies carry the same information: greeting, the
//! three sections, the question of the day, and any failure notes. Only the
//! HTML body escapes dynamic text.

use std::fmt::Write as _;

use crate::models::{Book, Digest, NewsItem};

pub const SECTION_NEWS: &str = "📰 Top World News";
pub const SECTION_ENGLISH: &str = "📚 Popular Kids' Books (English)";
pub const SECTION_CHINESE: &str = "📚 Popular Kids' Books (Chinese)";

pub const EMPTY_NEWS: &str = "No news items available today.";
pub const EMPTY_ENGLISH: &str = "No English book items available today.";
pub const EMPTY_CHINESE: &str = "No Chinese book items available today.";

pub const QUESTION_OF_THE_DAY: &str =
    "Question of the day: Which story sounds the most interesting, and why?";
pub const FAILURE_NOTE: &str = "Some sources failed today:";

/// Headlines read aloud in the templated script.
pub const MAX_SPOKEN_HEADLINES: usize = 5;

pub const SCRIPT_SYSTEM_PROMPT: &str = "You write short, cheerful morning podcast scripts for a \
curious child. Use simple words and short sentences. Mention every headline and every book you \
are given, say each author's name when one is provided, and do not invent facts that are not in \
the list. Write plain spoken text only: no markdown, no lists, no stage directions, no URLs. \
Keep it under four minutes when read aloud.";

fn greeting(reader: &str) -> String {
    format!("Hi {reader}! Here are today's updates.")
}

fn escape(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

fn escape_attr(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).into_owned()
}

/// HTML email body.
pub fn render_html(digest: &Digest) -> String {
    let mut html = String::new();
    html.push_str(r#"<div style="font-family: Arial, sans-serif; font-size: 14px; line-height: 1.4;">"#);
    let _ = write!(html, "<p>{}</p>", escape(&greeting(&digest.reader_name)));

    let _ = write!(html, "<h3>{SECTION_NEWS}</h3>");
    html.push_str(&news_html(&digest.news));

    let _ = write!(html, "<h3>{SECTION_ENGLISH}</h3>");
    html.push_str(&books_html(&digest.english_books, EMPTY_ENGLISH));

    let _ = write!(html, "<h3>{SECTION_CHINESE}</h3>");
    html.push_str(&books_html(&digest.chinese_books, EMPTY_CHINESE));

    let _ = write!(html, r#"<hr><p style="color:#555;">{QUESTION_OF_THE_DAY}</p>"#);

    if !digest.errors.is_empty() {
        let notes = digest.errors.iter().map(|e| escape(e)).collect::<Vec<_>>().join("<br>");
        let _ = write!(
            html,
            r#"<hr><p style="color:#a00;"><b>Note:</b> {FAILURE_NOTE}<br>{notes}</p>"#
        );
    }
    html.push_str("</div>");
    html
}

fn news_html(news: &[NewsItem]) -> String {
    if news.is_empty() {
        return format!("<p><i>{EMPTY_NEWS}</i></p>");
    }
    let items: String = news
        .iter()
        .map(|n| format!(r#"<li><a href="{}">{}</a></li>"#, escape_attr(&n.link), escape(&n.title)))
        .collect();
    format!("<ol>{items}</ol>")
}

fn books_html(books: &[Book], empty: &str) -> String {
    if books.is_empty() {
        return format!("<p><i>{empty}</i></p>");
    }
    let mut out = String::from("<ol>");
    for b in books {
        let _ = write!(out, r#"<li><a href="{}">{}</a>"#, escape_attr(&b.link), escape(&b.title));
        if !b.authors.is_empty() {
            let _ = write!(out, r#" <span style="color:#555;">({})</span>"#, escape(&b.authors));
        }
        if !b.blurb.is_empty() {
            let _ = write!(out, r#"<div style="color:#333; margin-top:4px;">{}</div>"#, escape(&b.blurb));
        }
        out.push_str("</li>");
    }
    out.push_str("</ol>");
    out
}

/// Plaintext email body.
pub fn render_text(digest: &Digest) -> String {
    let mut lines = vec![greeting(&digest.reader_name), String::new()];

    lines.push(format!("{SECTION_NEWS}:"));
    if digest.news.is_empty() {
        lines.push(format!("({EMPTY_NEWS})"));
    }
    for (i, n) in digest.news.iter().enumerate() {
        lines.push(format!("{}. {}\n   {}", i + 1, n.title, n.link));
    }

    lines.push(format!("\n{SECTION_ENGLISH}:"));
    push_books_text(&mut lines, &digest.english_books, EMPTY_ENGLISH);

    lines.push(format!("\n{SECTION_CHINESE}:"));
    push_books_text(&mut lines, &digest.chinese_books, EMPTY_CHINESE);

    lines.push(format!("\n{QUESTION_OF_THE_DAY}"));

    if !digest.errors.is_empty() {
        lines.push(format!("\nNOTE: {FAILURE_NOTE}"));
        lines.extend(digest.errors.iter().map(|e| format!("- {e}")));
    }
    lines.join("\n")
}

fn push_books_text(lines: &mut Vec<String>, books: &[Book], empty: &str) {
    if books.is_empty() {
        lines.push(format!("({empty})"));
        return;
    }
    for (i, b) in books.iter().enumerate() {
        let mut entry = format!("{}. {}", i + 1, b.title);
        if !b.authors.is_empty() {
            let _ = write!(entry, " ({})", b.authors);
        }
        let _ = write!(entry, "\n   {}", b.link);
        if !b.blurb.is_empty() {
            let _ = write!(entry, "\n   {}", b.blurb);
        }
        lines.push(entry);
    }
}

/// Narration built straight from the lists.
pub fn template_script(digest: &Digest) -> String {
    let reader = &digest.reader_name;
    let mut parts = vec![format!(
        "Good morning, {reader}! Welcome to your daily news and books show for {}.",
        digest.date.format("%B %-d, %Y")
    )];

    if digest.news.is_empty() {
        parts.push("There are no news stories today, so let's jump straight to books.".into());
    } else {
        parts.push("Here are some stories from around the world.".into());
        for (i, n) in digest.news.iter().take(MAX_SPOKEN_HEADLINES).enumerate() {
            parts.push(format!("Story {}: {}.", i + 1, n.title.trim_end_matches('.')));
        }
    }

    if !digest.english_books.is_empty() {
        parts.push("Now for some popular books in English.".into());
        parts.extend(digest.english_books.iter().map(spoken_book));
    }
    if !digest.chinese_books.is_empty() {
        parts.push("And here are some Chinese books you might enjoy.".into());
        parts.extend(digest.chinese_books.iter().map(spoken_book));
    }

    parts.push(format!(
        "Here is today's question: which story sounds the most interesting, and why? \
Talk about it with your family. Have a wonderful day, {reader}! Bye for now!"
    ));
    parts.join(" ")
}

fn spoken_book(b: &Book) -> String {
    let title = b.title.trim_end_matches('.');
    match b.authors.split(", ").next().filter(|a| !a.is_empty()) {
        Some(author) => format!("{title}, by {author}."),
        None => format!("{title}."),
    }
}

/// User prompt for the generative script writer.
pub fn script_user_prompt(digest: &Digest) -> String {
    let mut prompt = format!(
        "Write today's podcast script for {} ({}).\n",
        digest.reader_name,
        digest.date.format("%Y-%m-%d")
    );

    prompt.push_str("\nNews headlines:\n");
    if digest.news.is_empty() {
        prompt.push_str("- (none today)\n");
    }
    for n in digest.news.iter().take(MAX_SPOKEN_HEADLINES) {
        let _ = writeln!(prompt, "- {}", n.title);
    }

    for (label, books) in [("English", &digest.english_books), ("Chinese", &digest.chinese_books)] {
        let _ = writeln!(prompt, "\n{label} books:");
        if books.is_empty() {
            prompt.push_str("- (none today)\n");
        }
        for b in books {
            let _ = write!(prompt, "- {}", b.title);
            if !b.authors.is_empty() {
                let _ = write!(prompt, " by {}", b.authors);
            }
            if !b.blurb.is_empty() {
                let _ = write!(prompt, ": {}", b.blurb);
            }
            prompt.push('\n');
        }
    }

    prompt.push_str("\nEnd by asking which story sounds the most interesting, and why.");
    prompt
}
