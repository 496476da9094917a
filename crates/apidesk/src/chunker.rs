/// Default soft limit on the number of characters in a chunk
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// Split text into sentences, keeping the terminating punctuation.
///
/// A sentence ends after `.`, `?` or `!` when whitespace follows.
fn sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '?' | '!') {
            continue;
        }
        let Some(&(next, following)) = chars.peek() else {
            continue;
        };
        if !following.is_whitespace() {
            continue;
        }

        sentences.push(&text[start..next]);
        // consume the whole whitespace run so the next sentence starts on content
        let mut resume = next;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            resume = j + w.len_utf8();
            chars.next();
        }
        start = resume;
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Break documentation text into chunks of roughly `max_chunk_size` characters.
///
/// Sentences are joined with a single space until adding the next one would exceed the
/// limit. A single sentence longer than the limit becomes its own chunk, so the bound is
/// soft. Whitespace-only input produces no chunks.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count();

        if !current.is_empty() && current_len + 1 + sentence_len > max_chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += sentence_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
