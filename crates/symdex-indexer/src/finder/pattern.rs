//! Glob mask compilation.
//!
//! Masks support `*` (any run of non-separator characters), `?` (one
//! non-separator character), `[...]` / `[!...]` character classes and `**/`
//! meaning zero or more intervening directories. Compiled matchers are
//! evaluated against forward-slash relative paths.

use crate::IndexerError;
use regex::Regex;

/// Compiled, immutable form of a glob mask.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// The bare `*` mask: accepts every candidate.
    Any,
    /// Anchored regular expression.
    Pattern(Regex),
}

impl Matcher {
    /// Compile a mask.
    ///
    /// A mask starting with `./` is anchored at the start of the relative
    /// path; any other mask may start at any segment boundary. The match is
    /// always anchored at the end.
    pub fn compile(mask: &str) -> Result<Self, IndexerError> {
        let mask = mask.replace('\\', "/");

        if mask == "*" {
            return Ok(Matcher::Any);
        }

        let (anchor, body) = match mask.strip_prefix("./") {
            Some(rest) => ("^", rest),
            None => ("(?:^|/)", mask.as_str()),
        };

        let case = if cfg!(windows) { "(?i)" } else { "" };
        let source = format!("{}{}{}$", case, anchor, translate(body));

        Regex::new(&source)
            .map(Matcher::Pattern)
            .map_err(|e| IndexerError::Config(format!("Invalid mask '{}': {}", mask, e)))
    }

    /// Test a normalized (forward-slash) relative path.
    pub fn is_match(&self, relative_path: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Pattern(re) => re.is_match(relative_path),
        }
    }
}

/// Translate glob syntax into regex syntax, escaping everything else.
fn translate(mask: &str) -> String {
    let chars: Vec<char> = mask.chars().collect();
    let mut out = String::with_capacity(mask.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') && chars.get(i + 2) == Some(&'/') => {
                out.push_str("(?:.+/)?");
                i += 3;
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut j = i + 1;
                    if chars[j] == '!' {
                        out.push('^');
                        j += 1;
                    }
                    for &c in &chars[j..end] {
                        if c == '-' {
                            out.push('-');
                        } else {
                            push_escaped(&mut out, c);
                        }
                    }
                    out.push(']');
                    i = end + 1;
                }
                None => {
                    push_escaped(&mut out, '[');
                    i += 1;
                }
            },
            c => {
                push_escaped(&mut out, c);
                i += 1;
            }
        }
    }

    out
}

/// Index of the `]` closing the class opened at `start`, if any.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    // An empty class is not a class.
    if chars.get(j) == Some(&']') {
        return None;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(mask: &str, path: &str) -> bool {
        Matcher::compile(mask).unwrap().is_match(path)
    }

    #[test]
    fn test_bare_star_accepts_everything() {
        assert!(matches("*", ""));
        assert!(matches("*", "a/b/c.txt"));
    }

    #[test]
    fn test_star_stays_within_segment() {
        assert!(matches("*.php", "Foo.php"));
        assert!(matches("*.php", "a/b/Foo.php"));
        assert!(!matches("*.php", "Foo.php.bak"));
        assert!(!matches("a*.php", "a/b.php"));
    }

    #[test]
    fn test_unanchored_mask_matches_at_segment_boundary() {
        assert!(matches("Foo.php", "lib/Foo.php"));
        assert!(!matches("Foo.php", "lib/XFoo.php"));
    }

    #[test]
    fn test_dot_slash_anchors_at_start() {
        assert!(matches("./Foo.php", "Foo.php"));
        assert!(!matches("./Foo.php", "lib/Foo.php"));
    }

    #[test]
    fn test_question_mark_is_single_char() {
        assert!(matches("?.txt", "a.txt"));
        assert!(!matches("?.txt", "ab.txt"));
        assert!(!matches("a?b", "a/b"));
    }

    #[test]
    fn test_character_classes() {
        assert!(matches("[ab].txt", "a.txt"));
        assert!(!matches("[ab].txt", "c.txt"));
        assert!(matches("[!ab].txt", "c.txt"));
        assert!(!matches("[!ab].txt", "a.txt"));
        assert!(matches("file[0-9].txt", "file7.txt"));
    }

    #[test]
    fn test_double_star_segment() {
        assert!(matches("./src/**/Foo.php", "src/Foo.php"));
        assert!(matches("./src/**/Foo.php", "src/a/b/Foo.php"));
        assert!(!matches("./src/**/Foo.php", "lib/Foo.php"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("a+b(1).txt", "a+b(1).txt"));
        assert!(!matches("a.txt", "abtxt"));
        assert!(matches("[x", "[x"));
    }

    #[test]
    fn test_anchored_at_end() {
        assert!(!matches("Foo", "Foo.php"));
        assert!(matches("Foo", "lib/Foo"));
    }

    #[test]
    fn test_invalid_class_range_is_config_error() {
        let err = Matcher::compile("[z-a].txt").unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }
}
