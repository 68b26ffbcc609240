// Output formatting: terminal display of ranks, threads, and toggles.

pub mod terminal;

/// Shorten `text` to at most `max_chars` characters for one-line previews,
/// appending "..." when cut. Counts chars, not bytes, so multi-byte text
/// never splits mid-character. Newlines are flattened to spaces.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let truncated: String = flat.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
