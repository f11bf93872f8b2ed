//! Splitting long outbound text to fit platform message limits.

/// Split `content` into pieces of at most `max_len` bytes.
///
/// Splits at the last newline in range, else the last space, else at
/// the limit (rounded down to a char boundary). Newlines at a split
/// point are dropped; text is otherwise preserved.
pub(crate) fn chunk_message(content: &str, max_len: usize) -> Vec<&str> {
    if content.len() <= max_len {
        return vec![content];
    }

    let mut chunks = Vec::new();
    let mut remaining = content;

    while remaining.len() > max_len {
        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        if limit == 0 {
            limit = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(limit);

        let (chunk, rest) = remaining.split_at(split_at);
        let chunk = chunk.trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        remaining = rest.trim_start_matches('\n');
    }

    if !remaining.is_empty() {
        chunks.push(remaining);
    }
    if chunks.is_empty() {
        chunks.push(content);
    }
    chunks
}
