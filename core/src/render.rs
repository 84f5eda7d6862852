//! Markdown renderers for the dashboard panels
//!
//! Output is markdown; the page renders it client-side. `&nbsp;` runs are
//! spacing between inline fields and a trailing `\` is a hard line break.

use crate::enrich::Metadata;
use crate::event::{Event, EventLog};
use crate::vector::Document;

/// Number of events shown in the real-time panel
pub const UPDATE_VIEW_LEN: usize = 10;
/// Characters of article body shown under each entry
pub const SNIPPET_CHARS: usize = 400;

const NOT_PROVIDED: &str = "Not provided";

/// First `max_chars` characters of `text`, cut on a char boundary
pub fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Similarity in `[0, 1]` as a percentage rounded to one decimal
pub fn similarity_percent(similarity: f64) -> String {
    format!("{:.1}", similarity * 100.0)
}

pub fn render_update(event: &Event) -> String {
    let p = &event.payload;
    format!(
        "**[{}]({})**\\\n📅&nbsp;&nbsp;{}&nbsp;&nbsp;&nbsp;🕑&nbsp;{}&nbsp;&nbsp;&nbsp;#️⃣&nbsp;&nbsp;{}\n\n *{}*...\n\n",
        p.title,
        p.source,
        p.date,
        event.time_of_day(),
        event.count,
        snippet(&p.content, SNIPPET_CHARS)
    )
}

/// The real-time panel: most recent events, newest first
pub fn render_updates(log: &EventLog) -> String {
    log.latest(UPDATE_VIEW_LEN).map(render_update).collect()
}

fn date_or_placeholder(doc: &Document) -> &str {
    doc.date
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(NOT_PROVIDED)
}

fn render_source_line(doc: &Document) -> String {
    format!(
        "**[{}]({})**&nbsp;&nbsp;&nbsp;📅&nbsp;&nbsp;{}&nbsp;&nbsp;&nbsp;📈&nbsp;{}%",
        doc.title,
        doc.source,
        date_or_placeholder(doc),
        similarity_percent(doc.similarity)
    )
}

/// Citation list shown under a synthesized answer, in retrieval order
pub fn render_sources(docs: &[Document]) -> String {
    let lines: Vec<String> = docs.iter().map(render_source_line).collect();
    format!("#### Sources used\n{}", lines.join("\\\n"))
}

/// One search result with its extracted metadata
pub fn render_result_card(doc: &Document, metadata: &Metadata) -> String {
    format!(
        "**[{}]({})**\\\n📅&nbsp;&nbsp;{}&nbsp;&nbsp;&nbsp;\n📈&nbsp;{}%&nbsp;&nbsp;&nbsp;\n📍&nbsp;{}&nbsp;&nbsp;&nbsp;\n🗂️&nbsp;{}&nbsp;&nbsp;&nbsp;\n{}&nbsp;{}\n\n\n*{}*...\n\n",
        doc.title,
        doc.source,
        date_or_placeholder(doc),
        similarity_percent(doc.similarity),
        metadata.country,
        metadata.category,
        metadata.sentiment.mood().glyph(),
        metadata.sentiment.value(),
        snippet(&doc.content, SNIPPET_CHARS)
    )
}
