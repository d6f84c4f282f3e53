//! Comment normalization ahead of parsing.
//!
//! Saved queries mix comment styles the target grammar does not accept:
//! `// line` comments and `/* block */` comments. [`normalize_comments`]
//! rewrites both into `-- ` line comments, one output line per input line.
//! Code stays code and comment text stays comment text; when a block comment
//! sits in the middle of code, its text moves to a `--` comment at the end of
//! that line. A line inside a block comment that carries no text becomes a
//! bare `--`, so the block's extent stays visible.
//!
//! Line terminators (`\n`, `\r\n`) and a trailing newline are kept. Lines
//! without foreign comments come out unchanged, apart from a bare `--text`
//! line, which becomes `-- text`.

/// Rewrite `//` and `/* */` comments into `-- ` comments.
pub fn normalize_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut in_block = false;

    for raw in sql.split_inclusive('\n') {
        let (line, terminator) = split_terminator(raw);
        out.push_str(&normalize_line(line, &mut in_block));
        out.push_str(terminator);
    }

    out
}

fn split_terminator(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}

/// Where the code part of a line stops.
enum CodeEnd {
    /// No comment marker; the rest is code.
    Eol,
    /// `/*` at the byte offset.
    BlockOpen(usize),
    /// `//` at the byte offset.
    Slashes(usize),
    /// `--` at the byte offset.
    Dashes(usize),
}

fn scan_code(code: &str) -> CodeEnd {
    let bytes = code.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        let next = bytes.get(i + 1).copied();
        match (b, next) {
            (b'\'' | b'"', _) => quote = Some(b),
            (b'-', Some(b'-')) => return CodeEnd::Dashes(i),
            (b'/', Some(b'*')) => return CodeEnd::BlockOpen(i),
            (b'/', Some(b'/')) => {
                let leading = code[..i].trim().is_empty();
                let spaced = i > 0 && matches!(bytes[i - 1], b' ' | b'\t');
                if leading || spaced {
                    return CodeEnd::Slashes(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    CodeEnd::Eol
}

fn push_comment(comments: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        comments.push(text.to_string());
    }
}

/// `--text` becomes `-- text`; separators such as `-----` are left alone.
fn space_dashes(comment: &str) -> String {
    let after = &comment[2..];
    if after.is_empty() || after.starts_with([' ', '\t', '-']) {
        comment.to_string()
    } else {
        format!("-- {after}")
    }
}

fn normalize_line(line: &str, in_block: &mut bool) -> String {
    let mut code = String::new();
    let mut comments: Vec<String> = Vec::new();
    let mut dashes: Option<&str> = None;
    let mut converted = false;
    let mut blank_in_block = false;
    let mut rest = line;

    loop {
        if *in_block {
            converted = true;
            match rest.find("*/") {
                None => {
                    blank_in_block = rest.trim().is_empty();
                    push_comment(&mut comments, rest);
                    break;
                }
                Some(close) => {
                    push_comment(&mut comments, &rest[..close]);
                    rest = &rest[close + 2..];
                    *in_block = false;
                }
            }
        }

        match scan_code(rest) {
            CodeEnd::Eol => {
                code.push_str(rest);
                break;
            }
            CodeEnd::BlockOpen(open) => {
                code.push_str(&rest[..open]);
                rest = &rest[open + 2..];
                *in_block = true;
            }
            CodeEnd::Slashes(at) => {
                converted = true;
                code.push_str(&rest[..at]);
                push_comment(&mut comments, &rest[at + 2..]);
                break;
            }
            CodeEnd::Dashes(at) => {
                code.push_str(&rest[..at]);
                dashes = Some(&rest[at..]);
                break;
            }
        }
    }

    let code_is_blank = code.trim().is_empty();

    if !converted {
        return match dashes {
            Some(comment) if code_is_blank => format!("{code}{}", space_dashes(comment)),
            Some(comment) => format!("{code}{comment}"),
            None => code,
        };
    }

    if let Some(comment) = dashes {
        push_comment(&mut comments, &comment[2..]);
    }
    if comments.is_empty() {
        if blank_in_block && code_is_blank {
            return format!("{code}--");
        }
        return code.trim_end().to_string();
    }

    let text = comments.join(" ");
    if code_is_blank {
        format!("{code}-- {text}")
    } else {
        format!("{} -- {text}", code.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_count(text: &str) -> usize {
        text.split_inclusive('\n').count()
    }

    #[test]
    fn test_identity_without_comments() {
        let sql = "SELECT a,\n    b\r\nFROM \"s\".\"t\"\n  WHERE x = '//not a comment'\n";
        assert_eq!(normalize_comments(sql), sql);
    }

    #[test]
    fn test_identity_for_target_form_comments() {
        let sql = "-- header\nSELECT 1 -- trailing\n  -- indented\n------\n";
        assert_eq!(normalize_comments(sql), sql);
    }

    #[test]
    fn test_dash_comment_gets_space() {
        assert_eq!(normalize_comments("--note\nselect 1"), "-- note\nselect 1");
    }

    #[test]
    fn test_slash_comments() {
        assert_eq!(normalize_comments("// note"), "-- note");
        assert_eq!(normalize_comments("//note"), "-- note");
        assert_eq!(normalize_comments("  // note\nselect 1"), "  -- note\nselect 1");
        assert_eq!(
            normalize_comments("select * from t o // comment\n"),
            "select * from t o -- comment\n"
        );
        assert_eq!(
            normalize_comments("select 'http://x' from t"),
            "select 'http://x' from t"
        );
    }

    #[test]
    fn test_block_comment_across_lines() {
        let sql = "select a, /* the b\n still inside\n column */ b\nfrom t";
        let out = normalize_comments(sql);
        assert_eq!(out, "select a, -- the b\n-- still inside\n b -- column\nfrom t");
        assert_eq!(line_count(&out), line_count(sql));
    }

    #[test]
    fn test_block_comment_within_one_line() {
        assert_eq!(
            normalize_comments("select a /* why */ from t"),
            "select a  from t -- why"
        );
        assert_eq!(normalize_comments("/* header */"), "-- header");
        assert_eq!(normalize_comments("select 1 /**/"), "select 1");
    }

    #[test]
    fn test_blank_line_inside_block_becomes_comment() {
        let sql = "/*\n\nend */\nselect 1\n";
        let out = normalize_comments(sql);
        assert_eq!(out, "--\n--\n-- end\nselect 1\n");
        assert_eq!(line_count(&out), line_count(sql));
    }

    #[test]
    fn test_crlf_preserved() {
        let sql = "// a\r\nselect 1\r\n";
        assert_eq!(normalize_comments(sql), "-- a\r\nselect 1\r\n");
    }

    #[test]
    fn test_dashes_inside_block_line_merge() {
        assert_eq!(
            normalize_comments("select 1 /* a */ -- b"),
            "select 1 -- a b"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_comments(""), "");
    }
}
