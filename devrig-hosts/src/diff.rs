//! Unified diff preview for dry-run hosts operations.

use similar::TextDiff;

/// Unified diff of `live` -> `rendered`, or `None` when they are equal.
pub fn preview(live: &str, rendered: &str, label: &str) -> Option<String> {
    let live = normalize_line_endings(live);
    let rendered = normalize_line_endings(rendered);
    if live == rendered {
        return None;
    }
    let old_header = format!("a/{label}");
    let new_header = format!("b/{label}");
    Some(
        TextDiff::from_lines(&live, &rendered)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string(),
    )
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
