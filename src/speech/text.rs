//! Text preparation for speech output.

/// Strip markdown so a reply reads naturally when spoken.
///
/// Links `[text](url)` become `text`, `**` and `*` markers are dropped and
/// runs of whitespace collapse to a single space.
pub fn clean_for_speech(text: &str) -> String {
    let unlinked = collapse_links(text);
    let unmarked = unlinked.replace('*', "");
    unmarked.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace every `[label](target)` with `label`.
fn collapse_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let (before, from_open) = rest.split_at(open);
        out.push_str(before);

        match parse_link(from_open) {
            Some((label, consumed)) => {
                out.push_str(label);
                rest = &from_open[consumed..];
            }
            None => {
                out.push('[');
                rest = &from_open[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse `[label](target)` at the start of `s`, returning the label and the
/// number of bytes consumed.
fn parse_link(s: &str) -> Option<(&str, usize)> {
    let close = s.find(']')?;
    let label = &s[1..close];
    if label.contains('[') {
        return None;
    }
    let after = &s[close + 1..];
    if !after.starts_with('(') {
        return None;
    }
    let target_end = after.find(')')?;
    Some((label, close + 1 + target_end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_collapse_to_their_text() {
        assert_eq!(
            clean_for_speech(
                "Here is what I found:\n[Listen on YouTube](https://www.youtube.com/results?search_query=x)"
            ),
            "Here is what I found: Listen on YouTube"
        );
    }

    #[test]
    fn emphasis_markers_are_removed() {
        assert_eq!(clean_for_speech("**Sources:** *one*"), "Sources: one");
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(clean_for_speech("  a \n\n b\t c  "), "a b c");
    }

    #[test]
    fn search_reply_reads_cleanly() {
        let reply = "Sunny.\n\n**Sources:**\n* [Met Office](https://m.example)\n* [BBC](https://b.example)";
        assert_eq!(clean_for_speech(reply), "Sunny. Sources: Met Office BBC");
    }

    #[test]
    fn unmatched_brackets_are_kept() {
        assert_eq!(clean_for_speech("array[0] and [note]"), "array[0] and [note]");
        assert_eq!(clean_for_speech("[a] (b)"), "[a] (b)");
    }
}
