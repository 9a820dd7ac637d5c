//! Speech-friendly text cleanup for model output.

use std::sync::OnceLock;

use regex::Regex;

const BANNED_SYMBOLS: &str = "•*#>_`~|$%^<>[]{}@+=";

fn multi_space() -> &'static Regex {
    static MULTI_SPACE: OnceLock<Regex> = OnceLock::new();
    MULTI_SPACE.get_or_init(|| Regex::new(" {2,}").expect("static regex is valid"))
}

fn is_banned(c: char) -> bool {
    // Supplementary-plane chars are the ones encoded as surrogate pairs (emoji).
    (c as u32) > 0xFFFF || ('\u{2600}'..='\u{27BF}').contains(&c) || BANNED_SYMBOLS.contains(c)
}

/// Strips emoji, pictographs and markdown symbols, collapses repeated spaces
/// and trims. Idempotent.
pub fn sanitize(text: &str) -> String {
    sanitize_fragment(text).trim().to_string()
}

/// `sanitize` without the trim, for streamed fragments that must still
/// concatenate with their neighbours.
pub fn sanitize_fragment(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !is_banned(*c)).collect();
    multi_space().replace_all(&stripped, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_and_emoji() {
        assert_eq!(
            sanitize("## **Summary** 🚀 Reset the *packer* ☀ now!"),
            "Summary Reset the packer now!"
        );
        assert_eq!(sanitize("• Step one\n• Step two"), "Step one\n Step two");
        assert_eq!(sanitize("Press [OK] then {Enter} @ 50% speed + 5 = done"), "Press OK then Enter 50 speed 5 done");
    }

    #[test]
    fn banned_only_input_becomes_empty() {
        assert_eq!(sanitize("•*#>_`~|$%^<>[]{}@+="), "");
        assert_eq!(sanitize("  ** ## ~~  >> "), "");
        assert_eq!(sanitize("😀 ✅ ⚠"), "");
    }

    #[test]
    fn keeps_ordinary_punctuation_and_accents() {
        assert_eq!(
            sanitize("Conveyor A: check belt tension (aisle 4), then restart."),
            "Conveyor A: check belt tension (aisle 4), then restart."
        );
        assert_eq!(sanitize("Café déjà vu"), "Café déjà vu");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "plain text",
            "a  b   c",
            " * leading and trailing * ",
            "emoji 🤖 inside ⚙ text",
            "mixed #tags and `code` | pipes",
            "line one  \n  line two",
            "\t tab *  star",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "input: {:?}", sample);
        }
    }

    #[test]
    fn fragments_keep_boundary_spaces() {
        assert_eq!(sanitize_fragment("Hello **"), "Hello ");
        assert_eq!(sanitize_fragment("  world"), " world");
        assert_eq!(sanitize_fragment("**"), "");
        assert_eq!(
            format!("{}{}", sanitize_fragment("Check the "), sanitize_fragment("belt.")),
            "Check the belt."
        );
    }
}
