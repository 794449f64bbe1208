//! Glob Pattern Module
//!
//! Shell-style key matching with the same rules as the Redis `MATCH` option,
//! so `clear(pattern)` selects the same keys on either backend.
//!
//! Supported syntax:
//! - `*` any run of characters (including none)
//! - `?` exactly one character
//! - `[abc]`, `[a-z]`, `[^a]` character classes
//! - `\x` matches `x` literally

/// Returns true if `text` matches the glob `pattern`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
            continue;
        }

        if p < pattern.len() {
            if let Some(next) = match_one(&pattern, p, text[t]) {
                p = next;
                t += 1;
                continue;
            }
        }

        match backtrack {
            Some((star, absorbed)) => {
                p = star + 1;
                t = absorbed + 1;
                backtrack = Some((star, absorbed + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Backslash-escapes glob metacharacters so `literal` only matches itself.
pub fn escape(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Matches the single pattern token starting at `p` against `c`.
///
/// Returns the index of the next token on success.
fn match_one(pattern: &[char], p: usize, c: char) -> Option<usize> {
    match pattern[p] {
        '?' => Some(p + 1),
        '\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        '[' => match match_class(pattern, p, c) {
            Some((matched, next)) => matched.then_some(next),
            // Unterminated class: treat the bracket literally.
            None => (c == '[').then_some(p + 1),
        },
        literal => (literal == c).then_some(p + 1),
    }
}

/// Evaluates the character class opening at `open`.
///
/// Returns `(matched, index after the closing bracket)`, or None when the
/// class is never closed.
fn match_class(pattern: &[char], open: usize, c: char) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = i < pattern.len() && pattern[i] == '^';
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (mut lo, mut hi) = (pattern[i], pattern[i + 2]);
            if lo > hi {
                std::mem::swap(&mut lo, &mut hi);
            }
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "user:42"));
    }

    #[test]
    fn test_literal_and_prefix() {
        assert!(glob_match("user:42", "user:42"));
        assert!(!glob_match("user:42", "user:421"));
        assert!(glob_match("user:*", "user:42"));
        assert!(!glob_match("user:*", "session:42"));
    }

    #[test]
    fn test_star_in_the_middle_backtracks() {
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(glob_match("*:stats:*", "dash:stats:weekly"));
        assert!(!glob_match("a*b*c", "axxbyy"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("h?llo", "hello"));
        assert!(!glob_match("h?llo", "hllo"));
    }

    #[test]
    fn test_character_classes() {
        assert!(glob_match("h[ae]llo", "hallo"));
        assert!(!glob_match("h[ae]llo", "hillo"));
        assert!(glob_match("h[^e]llo", "hallo"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("v[0-9]", "v7"));
        assert!(glob_match("v[9-0]", "v3"));
        assert!(!glob_match("v[0-9]", "vx"));
    }

    #[test]
    fn test_escapes() {
        assert!(glob_match(r"a\*b", "a*b"));
        assert!(!glob_match(r"a\*b", "axb"));
        assert!(glob_match(r"[\]]", "]"));
    }

    #[test]
    fn test_escape_matches_only_the_literal() {
        let prefix = r"t*[1]?\";
        assert_eq!(escape(prefix), r"t\*\[1\]\?\\");
        assert!(glob_match(&escape(prefix), prefix));
        assert!(!glob_match(&escape(prefix), r"tx1y\"));
        assert!(glob_match(&format!("{}*", escape("a*:")), "a*:user:1"));
        assert!(!glob_match(&format!("{}*", escape("a*:")), "abc:user:1"));
    }

    #[test]
    fn test_unterminated_class_is_literal() {
        assert!(glob_match("a[b", "a[b"));
        assert!(!glob_match("a[b", "ab"));
    }
}
