//! HTML-to-plaintext conversion for synthesizing a plaintext body.
//!
//! Deliberately small: not an HTML parser, only enough to turn a mail body
//! into readable text. Bold (`<b>`, `<strong>`) becomes `*text*`.

/// Block-level elements that end a line of text.
const LINE_BREAK_TAGS: [&str; 11] = [
    "br", "p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Elements whose content is never visible.
const HIDDEN_BLOCKS: [&str; 3] = ["head", "script", "style"];

/// Convert an HTML fragment to plain text.
///
/// - `<b>`/`<strong>` (opening and closing) become `*`
/// - `<br>` and block elements become line breaks
/// - `<head>`, `<script>`, `<style>` blocks and comments are removed
/// - all other tags are dropped, a `<` that starts no tag is kept
/// - common named and numeric entities are decoded
/// - lines are trimmed and blank-line runs collapsed
pub fn render(html: &str) -> String {
    let mut text = html.to_string();
    for tag in HIDDEN_BLOCKS {
        text = remove_tag_block(&text, tag);
    }

    let stripped = strip_tags(&text);
    let decoded = decode_entities(&stripped);
    collapse_lines(&decoded)
}

/// Replace tags by their plaintext marker (if any) and drop everything else.
fn strip_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut rest = html;
    // set once a tag start found no `>`: none of the later ones will either
    let mut unclosed = false;

    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        if let Some(comment) = after.strip_prefix("!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }

        let starts_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
        let close = if starts_tag && !unclosed {
            after.find('>')
        } else {
            None
        };
        unclosed |= starts_tag && close.is_none();
        match close {
            Some(close) => {
                result.push_str(tag_marker(&after[..close]));
                rest = &after[close + 1..];
            }
            None => {
                result.push('<');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// What a tag leaves behind in the text.
fn tag_marker(tag: &str) -> &'static str {
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match name.as_str() {
        "b" | "strong" => "*",
        n if LINE_BREAK_TAGS.contains(&n) => "\n",
        _ => "",
    }
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    // ASCII lower-casing keeps byte offsets aligned with the original
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(start) = find_open_tag(&lower, pos, &open) {
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

/// Find `<tag` at or after `from`, followed by `>`, `/` or whitespace, so
/// `<head` skips `<header>`.
fn find_open_tag(lower: &str, mut from: usize, open: &str) -> Option<usize> {
    while let Some(pos) = lower[from..].find(open) {
        let start = from + pos;
        match lower[start + open.len()..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => return Some(start),
            None => return Some(start),
            _ => from = start + open.len(),
        }
    }
    None
}

/// Decode `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;`, `&#NN;`, `&#xHH;`.
///
/// Single pass, so `&amp;lt;` stays `&lt;`. Unknown entities are kept.
fn decode_entities(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let entity = after
            .bytes()
            .take(11)
            .position(|b| b == b';')
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));
        match entity {
            Some((ch, end)) => {
                result.push(ch);
                rest = &after[end + 1..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return match char::from_u32(code)? {
            '\u{a0}' => Some(' '),
            c => Some(c),
        };
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    }
}

/// Trim every line, keep at most one blank line in a row, trim the result.
fn collapse_lines(text: &str) -> String {
    let mut prev_was_blank = false;
    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}
