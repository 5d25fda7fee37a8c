//! Size-bounded packing of log lines into notification messages.

/// Default maximum characters per message; stays under Discord's 2000 cap.
pub const DEFAULT_CHARACTER_LIMIT: usize = 1900;

const FENCE: &str = "```";

/// Characters added by [`wrap_chunk`] around a chunk body.
pub const WRAPPER_OVERHEAD: usize = 2 * FENCE.len();

/// Wrap a chunk body in a preformatted block.
pub fn wrap_chunk(body: &str) -> String {
    format!("{FENCE}{body}{FENCE}")
}

/// Pack `lines` into newline-joined chunk bodies.
///
/// A line is added to the current chunk unless doing so would bring the
/// wrapped chunk (`buffer + "\n" + line` plus fences) to `limit` characters or
/// more, in which case the current chunk is closed first, even when it is
/// still empty. A line that alone exceeds the limit therefore ends up as a
/// chunk of its own, preceded by an empty chunk if it is the first line. The
/// last chunk is always returned, so an empty input yields one empty chunk.
pub fn pack_chunks<S: AsRef<str>>(lines: &[S], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_chars = 0;

    for line in lines {
        let line = line.as_ref();
        let line_chars = line.chars().count();

        // Size of the joined buffer with the line appended after a newline
        let candidate = buffer_chars + buffer.len().saturating_sub(1) + 1 + line_chars;
        if candidate + WRAPPER_OVERHEAD >= limit {
            chunks.push(buffer.join("\n"));
            buffer.clear();
            buffer_chars = 0;
        }

        buffer.push(line);
        buffer_chars += line_chars;
    }

    chunks.push(buffer.join("\n"));
    chunks
}
