//! Fixed-size sliding-window text splitter.
//!
//! Lengths are counted in chars so a window never splits a code point.

/// Splits `text` into windows of `chunk_size` chars where each window starts
/// `overlap` chars before the previous one ended.
///
/// Text that fits in one window is returned whole. Every chunk but the last
/// is exactly `chunk_size` chars long.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total_chars = chars.len();
    let chunk_size = chunk_size.max(1);

    if total_chars <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(total_chars);
        chunks.push(chars[start..end].iter().collect());
        if end == total_chars {
            break;
        }
        let next = end.saturating_sub(overlap);
        // overlap >= chunk_size would never advance
        start = if next > start { next } else { start + 1 };
    }

    chunks
}
