//! IRC inline formatting removal.
//!
//! Color codes are `\x03` followed by an optional foreground (up to two
//! digits) and an optional `,background`. The search bot follows most color
//! codes with a `\x02\x02` bold toggle pair, which is removed with them.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex_lite::Regex;

static FORMATTING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x03\d{0,2}(?:,\d{0,2})?(?:\x02\x02)?").expect("formatting pattern is valid")
});

/// Remove IRC color/style escapes from `text`.
///
/// Stripping is idempotent: the output never contains a color escape.
pub fn strip_formatting(text: &str) -> Cow<'_, str> {
    FORMATTING.replace_all(text, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FORMATTED: &str = "\x031,9\x02\x02<<SearchBot>> Your search for \"\x0312,9\x02\x02alias grace\x031,9\x02\x02\" returned 8 matches. Sending results to you as\x0312\x02\x02 SearchOok_results_for_ alias grace.txt.zip\x031,9\x02\x02. Search took 0.67 seconds.";

    #[test]
    fn test_strip_formatting() {
        let expected = "<<SearchBot>> Your search for \"alias grace\" returned 8 matches. Sending results to you as SearchOok_results_for_ alias grace.txt.zip. Search took 0.67 seconds.";
        assert_eq!(strip_formatting(FORMATTED), expected);
    }

    #[test]
    fn test_strip_formatting_is_idempotent() {
        let samples = [
            FORMATTED,
            "plain text",
            "\x03\x02\x03\x02",
            "\x0312,34\x02\x02\x0399",
            "\x02\x02 bold pair without color",
            "",
        ];
        for sample in samples {
            let once = strip_formatting(sample).into_owned();
            let twice = strip_formatting(&once).into_owned();
            assert_eq!(once, twice, "sample: {sample:?}");
            assert!(!once.contains('\x03'));
        }
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(strip_formatting("nothing to strip"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_bare_color_reset() {
        assert_eq!(strip_formatting("a\x03b"), "ab");
    }

    proptest! {
        #[test]
        fn prop_strip_is_idempotent(text in "[\x02\x03,0-9a-z \"<>]{0,64}") {
            let once = strip_formatting(&text).into_owned();
            let twice = strip_formatting(&once).into_owned();
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.contains('\x03'));
        }

        #[test]
        fn prop_text_without_color_codes_is_untouched(text in "[^\x03]{0,64}") {
            prop_assert_eq!(strip_formatting(&text), text.as_str());
        }
    }
}
