// src/answer/prompt.rs — Research context assembly
//
// Formats retrieved evidence into the system instruction handed to the
// generator: one numbered block per source kind, in the same order the
// citation assembler numbers items, so bracketed markers in the prose line
// up with the report's citation list.

use crate::retrieval::{RetrievalItem, SourceKind};

/// Build the full system instruction from the retrieved evidence.
pub fn build_context(items: &[RetrievalItem]) -> String {
    let mut out = String::from(
        "You are a research assistant. Generate a concise, evidence-based \
         report answering the user's question.\n\nCONTEXT INFORMATION:\n\n",
    );

    out.push_str(&format_section(
        items,
        SourceKind::Document,
        "Relevant information from uploaded documents:",
        "No relevant documents found in uploaded files.",
    ));
    out.push_str(&format_section(
        items,
        SourceKind::Web,
        "Current web information:",
        "No relevant web information found.",
    ));
    out.push_str(&format_section(
        items,
        SourceKind::Live,
        "Recent live data updates:",
        "No recent live data available.",
    ));

    out.push_str(
        "\nINSTRUCTIONS:\n\
         1. Answer the question directly, using the context above.\n\
         2. Cite evidence with bracketed markers like [1], [2] matching the \
         numbering of the context entries.\n\
         3. If sources conflict, mention the different perspectives.\n\
         4. Highlight recent updates when the live data is relevant.\n\
         5. Aim for 200-500 words unless the question requires more detail.\n",
    );
    out
}

/// Format one source kind's block. Numbering is global across kinds so the
/// markers match citation ids.
fn format_section(
    items: &[RetrievalItem],
    kind: SourceKind,
    header: &str,
    empty_note: &str,
) -> String {
    let mut section = format!("{header}\n");
    let mut any = false;

    for (i, item) in items.iter().enumerate() {
        if item.kind != kind {
            continue;
        }
        any = true;
        section.push_str(&format!("{}. {}\n   Source: {}\n", i + 1, item.content, item.origin));
        if let Some(ts) = item.published_at {
            section.push_str(&format!("   Updated: {}\n", ts.to_rfc3339()));
        }
    }

    if !any {
        section.push_str(empty_note);
        section.push('\n');
    }
    section.push('\n');
    section
}
