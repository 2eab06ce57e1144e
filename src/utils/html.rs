use std::collections::HashSet;

/// Text a browser would show for `input`, using the ammonia library.
///
/// Every tag is dropped; <script> and <style> lose their content as well.
/// The result is HTML-escaped, so it is only good for inspection (is there
/// anything left to read?) and must not be stored in place of the input.
///
/// Note: comment bodies are stored as sent. Clients render them with
/// `textContent` or escape them at render time.
pub fn visible_text(input: &str) -> String {
    ammonia::Builder::default()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}
