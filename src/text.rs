//! Line tokenizer for the LVM2 textual metadata grammar.
//!
//! Splits the payload into lines, trims the LVM whitespace set, and
//! classifies each non-empty line as a section header, a section
//! terminator, or a key/value assignment. The recursive-descent grammar
//! itself lives in `parser.rs`; this module only does lexical work, as
//! spec'd: "Three line shapes are recognized by the parser, not the
//! tokenizer."

use crate::error::Error;

/// Whitespace LVM2 metadata trims: space, tab, CR, LF, FF, VT.
fn is_lvm_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0c' | '\x0b')
}

fn trim_lvm(s: &str) -> &str {
    s.trim_matches(is_lvm_whitespace)
}

/// One element of a list value. Plain lists (`status`, `flags`) are all
/// `Str`; the `stripes` list alternates `Str`/`Int` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListElement {
    Str(String),
    Int(u64),
}

/// A parsed right-hand-side value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(u64),
    List(Vec<ListElement>),
}

/// A classified, trimmed metadata line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    SectionStart(String),
    SectionEnd,
    Assignment(String, Value),
}

/// Strips an inline `#` comment that is not inside a quoted string,
/// returning the (still untrimmed-at-the-comment-boundary) prefix.
fn strip_comment(s: &str) -> &str {
    let mut in_quote: Option<char> = None;
    for (idx, ch) in s.char_indices() {
        match in_quote {
            Some(q) => {
                if ch == q {
                    in_quote = None;
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    in_quote = Some(ch);
                } else if ch == '#' {
                    return &s[..idx];
                }
            }
        }
    }
    s
}

fn parse_quoted(value: &str) -> Result<String, Error> {
    let mut chars = value.char_indices();
    let (_, quote) = chars
        .next()
        .ok_or_else(|| Error::invalid_data("empty quoted value"))?;
    for (idx, ch) in chars {
        if ch == quote {
            return Ok(value[1..idx].to_string());
        }
    }
    Err(Error::invalid_data(format!(
        "unterminated quoted value: {value}"
    )))
}

fn parse_list(value: &str) -> Result<Vec<ListElement>, Error> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| Error::invalid_data(format!("malformed list value: {value}")))?;
    let inner = trim_lvm(inner);
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    split_top_level_commas(inner)
        .into_iter()
        .map(|token| {
            let token = trim_lvm(token);
            if token.starts_with('"') || token.starts_with('\'') {
                Ok(ListElement::Str(parse_quoted(token)?))
            } else {
                token
                    .parse::<u64>()
                    .map(ListElement::Int)
                    .map_err(|_| Error::invalid_data(format!("unrecognized list element: {token}")))
            }
        })
        .collect()
}

/// Splits on commas that are not inside a quoted string.
fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in s.char_indices() {
        match in_quote {
            Some(q) => {
                if ch == q {
                    in_quote = None;
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    in_quote = Some(ch);
                } else if ch == ',' {
                    parts.push(&s[start..idx]);
                    start = idx + 1;
                }
            }
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_value(raw: &str) -> Result<Value, Error> {
    let raw = trim_lvm(raw);
    if raw.is_empty() {
        return Err(Error::invalid_data("empty assignment value"));
    }
    if raw.starts_with('"') || raw.starts_with('\'') {
        Ok(Value::Str(parse_quoted(raw)?))
    } else if raw.starts_with('[') {
        Ok(Value::List(parse_list(raw)?))
    } else {
        raw.parse::<u64>()
            .map(Value::Int)
            .map_err(|_| Error::invalid_data(format!("unrecognized value: {raw}")))
    }
}

/// Reads the lines of a list value that was opened with a bare `ident = [`
/// (nothing after the bracket) and spans multiple lines -- the standard
/// layout for `stripes`, one pv-name/start-extent pair per line, a lone
/// `]` closing it. Mirrors the line-at-a-time loop in
/// `libvslvm_metadata_read_stripes_list`, which keeps reading lines until
/// one of them is just `]`.
fn collect_multiline_list<'a>(
    ident: &str,
    raw_lines: &mut std::str::Split<'a, char>,
) -> Result<String, Error> {
    let mut elements = String::new();
    loop {
        let next_raw = raw_lines
            .next()
            .ok_or_else(|| Error::invalid_data(format!("unterminated list value: {ident}")))?;
        let next_trimmed = trim_lvm(strip_comment(trim_lvm(next_raw)));
        if next_trimmed.is_empty() {
            continue;
        }
        if next_trimmed == "]" {
            break;
        }
        let element = next_trimmed.strip_suffix(',').map(trim_lvm).unwrap_or(next_trimmed);
        if !elements.is_empty() {
            elements.push(',');
        }
        elements.push_str(element);
    }
    Ok(format!("[{elements}]"))
}

/// Tokenizes the full metadata text payload into classified lines.
pub fn tokenize(text: &str) -> Result<Vec<Line>, Error> {
    let mut lines = Vec::new();
    let mut raw_lines = text.split('\n');
    while let Some(raw_line) = raw_lines.next() {
        let trimmed = trim_lvm(raw_line);
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "}" {
            lines.push(Line::SectionEnd);
            continue;
        }
        if let Some(name) = trimmed.strip_suffix('{') {
            let name = trim_lvm(name);
            if !name.is_empty() {
                lines.push(Line::SectionStart(name.to_string()));
                continue;
            }
        }
        let without_comment = trim_lvm(strip_comment(trimmed));
        let eq_index = without_comment.find('=').ok_or_else(|| {
            Error::invalid_data(format!("line is neither section nor assignment: {trimmed}"))
        })?;
        let ident = trim_lvm(&without_comment[..eq_index]);
        let value_str = trim_lvm(&without_comment[eq_index + 1..]);
        if ident.is_empty() {
            return Err(Error::invalid_data(format!(
                "assignment missing identifier: {trimmed}"
            )));
        }
        // A list opened with nothing after the `[` spans subsequent lines
        // up to a lone `]` (spec.md §4.3/§4.6 `stripes` grammar); a list
        // closed on the same line is handled by `parse_value` as before.
        let value = if value_str == "[" {
            parse_value(&collect_multiline_list(ident, &mut raw_lines)?)?
        } else {
            parse_value(value_str)?
        };
        lines.push(Line::Assignment(ident.to_string(), value));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_section_start_and_end() {
        let lines = tokenize("vg0 {\n}\n").unwrap();
        assert_eq!(
            lines,
            vec![Line::SectionStart("vg0".to_string()), Line::SectionEnd]
        );
    }

    #[test]
    fn recognizes_string_and_int_assignments() {
        let lines = tokenize("id = \"abc-123\"\nseqno = 7\n").unwrap();
        assert_eq!(
            lines,
            vec![
                Line::Assignment("id".to_string(), Value::Str("abc-123".to_string())),
                Line::Assignment("seqno".to_string(), Value::Int(7)),
            ]
        );
    }

    #[test]
    fn strips_inline_comment() {
        let lines = tokenize("extent_size = 8192 # sectors\n").unwrap();
        assert_eq!(
            lines,
            vec![Line::Assignment("extent_size".to_string(), Value::Int(8192))]
        );
    }

    #[test]
    fn parses_stripe_list() {
        let lines = tokenize("stripes = [\"pv0\", 0]\n").unwrap();
        assert_eq!(
            lines,
            vec![Line::Assignment(
                "stripes".to_string(),
                Value::List(vec![ListElement::Str("pv0".to_string()), ListElement::Int(0)])
            )]
        );
    }

    #[test]
    fn parses_stripe_list_spanning_multiple_lines() {
        let lines = tokenize("stripes = [\n\"pv0\", 4096\n]\n").unwrap();
        assert_eq!(
            lines,
            vec![Line::Assignment(
                "stripes".to_string(),
                Value::List(vec![ListElement::Str("pv0".to_string()), ListElement::Int(4096)])
            )]
        );
    }

    #[test]
    fn parses_multi_stripe_list_with_trailing_commas_per_line() {
        let lines = tokenize("stripes = [\n\"pv0\", 4096,\n\"pv1\", 8192\n]\n").unwrap();
        assert_eq!(
            lines,
            vec![Line::Assignment(
                "stripes".to_string(),
                Value::List(vec![
                    ListElement::Str("pv0".to_string()),
                    ListElement::Int(4096),
                    ListElement::Str("pv1".to_string()),
                    ListElement::Int(8192),
                ])
            )]
        );
    }

    #[test]
    fn parses_plain_string_list() {
        let lines = tokenize("status = [\"READ\", \"WRITE\"]\n").unwrap();
        assert_eq!(
            lines,
            vec![Line::Assignment(
                "status".to_string(),
                Value::List(vec![
                    ListElement::Str("READ".to_string()),
                    ListElement::Str("WRITE".to_string())
                ])
            )]
        );
    }

    #[test]
    fn ignores_blank_lines() {
        let lines = tokenize("\n\n  \nseqno = 1\n\n").unwrap();
        assert_eq!(lines, vec![Line::Assignment("seqno".to_string(), Value::Int(1))]);
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(tokenize("not a valid line without equals or brace\n").is_err());
    }
}
