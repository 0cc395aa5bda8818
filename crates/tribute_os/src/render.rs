#![forbid(unsafe_code)]

use tribute_contracts::{ClientId, TributeRecord};

pub const ANONYMOUS_NAME: &str = "Anonymous";
pub const EMPTY_WALL_PLACEHOLDER: &str =
    r#"<p class="muted">No tributes yet. Be the first to share a memory.</p>"#;

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Markup for the tribute list, newest first.
///
/// A delete control is attached only to records the viewer owns that also carry an
/// id; an owned record still waiting for its id has nothing to delete by. Every field
/// that came from a visitor is escaped.
pub fn render_wall(records: &[TributeRecord], viewer: Option<&ClientId>) -> String {
    if records.is_empty() {
        return EMPTY_WALL_PLACEHOLDER.to_string();
    }
    let mut out = String::new();
    for record in records.iter().rev() {
        render_entry(&mut out, record, viewer);
    }
    out
}

fn render_entry(out: &mut String, record: &TributeRecord, viewer: Option<&ClientId>) {
    let name = if record.name.trim().is_empty() {
        ANONYMOUS_NAME
    } else {
        record.name.as_str()
    };
    let id_attr = record
        .id
        .as_ref()
        .map(|id| escape_html(&id.as_key()));

    match &id_attr {
        Some(id) => out.push_str(&format!("<article class=\"tribute\" data-id=\"{id}\">\n")),
        None => out.push_str("<article class=\"tribute\">\n"),
    }
    out.push_str(&format!("  <strong>{}</strong>\n", escape_html(name)));
    if !record.relation.trim().is_empty() {
        out.push_str(&format!(
            "  <small>&bull; {}</small>\n",
            escape_html(&record.relation)
        ));
    }
    out.push_str(&format!(
        "  <div class=\"tribute-message\">{}</div>\n",
        escape_html(&record.message)
    ));
    if let Some(ts) = &record.ts {
        out.push_str(&format!(
            "  <small class=\"muted\">{}</small>\n",
            escape_html(&ts.display_label())
        ));
    }
    let owned = viewer.is_some_and(|viewer| record.is_owned_by(viewer));
    if let (true, Some(id)) = (owned, &id_attr) {
        out.push_str(&format!(
            "  <button type=\"button\" class=\"tribute-delete\" data-id=\"{id}\">Delete</button>\n"
        ));
    }
    out.push_str("</article>\n");
}

/// Standalone page around already rendered wall markup.
pub fn render_wall_page(title: &str, wall_markup: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<section id=\"tributeList\">\n{wall_markup}</section>\n</body>\n</html>\n"
    )
}
