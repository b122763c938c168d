//! Lenient JSON extraction from model output.
//!
//! Models asked for a JSON value often wrap it in prose or markdown fences,
//! leave a trailing comma, or stop before closing every bracket. The repair
//! pass here handles those cases before handing the text to `serde_json`:
//!
//! 1. Strip a surrounding `` ```json `` fence.
//! 2. Skip any prose before the first `[` or `{`.
//! 3. Drop commas directly before `]` or `}`.
//! 4. Close unterminated strings, arrays, and objects.

use serde_json::Value;

/// Parse `input` as JSON, repairing it when the plain parse fails.
pub fn parse_with_repair(input: &str) -> Result<Value, serde_json::Error> {
    if let Ok(value) = serde_json::from_str(input) {
        return Ok(value);
    }
    let repaired = repair_json(input);
    // Text after the first complete value is ignored.
    match serde_json::Deserializer::from_str(&repaired)
        .into_iter::<Value>()
        .next()
    {
        Some(result) => result,
        None => serde_json::from_str(&repaired),
    }
}

/// Apply every repair step to `input`.
pub fn repair_json(input: &str) -> String {
    let unfenced = strip_markdown_fences(input);
    let body = skip_leading_prose(&unfenced);
    let no_trailing = fix_trailing_commas(body);
    close_truncated(&no_trailing)
}

fn strip_markdown_fences(input: &str) -> String {
    let trimmed = input.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    let after_open = &trimmed[start + 3..];
    // Drop the info string (`json`, `JSON`, ...) up to the first newline.
    let after_open = match after_open.find('\n') {
        Some(nl) if after_open[..nl].chars().all(|c| c.is_ascii_alphanumeric()) => {
            &after_open[nl + 1..]
        }
        _ => after_open,
    };

    match after_open.find("```") {
        Some(end) => after_open[..end].trim().to_string(),
        None => after_open.trim().to_string(),
    }
}

fn skip_leading_prose(input: &str) -> &str {
    match input.find(['[', '{']) {
        Some(pos) => &input[pos..],
        None => input,
    }
}

/// Walks `input` tracking whether each char sits inside a string literal.
struct Scanner {
    in_string: bool,
    escape_next: bool,
}

impl Scanner {
    fn new() -> Self {
        Self {
            in_string: false,
            escape_next: false,
        }
    }

    /// Advance past `c`. Returns true if `c` is structural (outside strings).
    fn advance(&mut self, c: char) -> bool {
        if self.escape_next {
            self.escape_next = false;
            return false;
        }
        if self.in_string {
            match c {
                '\\' => self.escape_next = true,
                '"' => self.in_string = false,
                _ => {}
            }
            return false;
        }
        if c == '"' {
            self.in_string = true;
            return false;
        }
        true
    }
}

fn fix_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut result = String::with_capacity(input.len());
    let mut scanner = Scanner::new();

    for (i, &c) in chars.iter().enumerate() {
        if scanner.advance(c) && c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        result.push(c);
    }
    result
}

fn close_truncated(input: &str) -> String {
    let mut closers: Vec<char> = Vec::new();
    let mut scanner = Scanner::new();

    for c in input.chars() {
        if !scanner.advance(c) {
            continue;
        }
        match c {
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' if closers.last() == Some(&c) => {
                closers.pop();
            }
            _ => {}
        }
    }

    let mut result = input.trim_end().to_string();
    if scanner.in_string {
        result.push('"');
    }
    if result.ends_with(',') && !closers.is_empty() {
        result.pop();
    }
    result.extend(closers.into_iter().rev());
    result
}
