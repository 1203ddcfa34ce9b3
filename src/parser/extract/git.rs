//! Commit hash extraction

use regex::Regex;
use std::sync::LazyLock;

/// `[branch abc1234]` as printed by `git commit`
static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]\n]*?\b([0-9a-f]{7,40})\]").unwrap());

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(git|commit|commits|committed|sha|hash|merge|merged|cherry-pick|revert|rebase|head)\b")
        .unwrap()
});

static HASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9a-f]{7,40}\b").unwrap());

/// Pure-decimal tokens are almost always counts, ports or timestamps.
fn has_hex_letter(token: &str) -> bool {
    token.chars().any(|c| matches!(c, 'a'..='f'))
}

/// Extract commit hashes from command text or command output.
///
/// A token counts when it sits inside a git-log style bracket or on a line
/// mentioning a git keyword. Order of first appearance is preserved.
pub fn extract_commit_hashes(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |hash: &str| {
        if has_hex_letter(hash) && !out.iter().any(|h| h == hash) {
            out.push(hash.to_string());
        }
    };

    for line in text.lines() {
        for caps in BRACKET_RE.captures_iter(line) {
            if let Some(m) = caps.get(1) {
                push(m.as_str());
            }
        }
        if KEYWORD_RE.is_match(line) {
            for m in HASH_RE.find_iter(line) {
                push(m.as_str());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_output_bracket() {
        assert_eq!(extract_commit_hashes("[main abc1234] x"), vec!["abc1234"]);
        assert_eq!(
            extract_commit_hashes("[main (root-commit) 9f8e7d6] initial\n 1 file changed"),
            vec!["9f8e7d6"]
        );
    }

    #[test]
    fn test_keyword_lines() {
        let text = "commit 3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b\nAuthor: dev\n\n    fix 1234567";
        assert_eq!(
            extract_commit_hashes(text),
            vec!["3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b"]
        );
        assert_eq!(extract_commit_hashes("git show deadbee"), vec!["deadbee"]);
    }

    #[test]
    fn test_rejects_decimal_and_unrelated() {
        assert!(extract_commit_hashes("git log -n 1234567").is_empty());
        assert!(extract_commit_hashes("the value cafebabe appears here").is_empty());
        assert!(extract_commit_hashes("git commit -m 'x'").is_empty());
    }

    #[test]
    fn test_dedup() {
        let text = "[main abc1234] x\nmerged abc1234 into main";
        assert_eq!(extract_commit_hashes(text), vec!["abc1234"]);
    }
}
