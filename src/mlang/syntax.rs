//! Placeholder syntax normalization for string texts.
//!
//! Strings of the legacy branches (1.x) are evaluated as double-quoted PHP
//! literals, so dollars, quotes and percent signs must be escaped and the
//! only live placeholders are `$a` and `$a->field`. Strings of 2.x branches
//! use `{$a}` placeholders and carry no escaping at all.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mlang::errors::{MlangError, MlangResult};

/// marker protecting an escaped dollar while backslashes are stripped
const ESCAPED_DOLLAR: &str = "@@@___XXX_ESCAPED_DOLLAR__@@@";

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank lines pattern"));

static PERCENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%+").expect("valid percent pattern"));

/// bare `$a` / `$a->field` not already inside braces
static BARE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^{])\$a(?-u:\b)(->[a-zA-Z0-9_]+)?").expect("valid placeholder pattern")
});

/// escaped `\$a` / `\$a->field`
static ESCAPED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\\$a(?-u:\b)(->[a-zA-Z0-9_]+)?").expect("valid escaped placeholder pattern")
});

/// Version of the placeholder syntax a string is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SyntaxFormat {
    /// 1.x strings: `$a`, escaped dollars, quotes and percents
    Legacy = 1,
    /// 2.x strings: `{$a}`, no escaping
    Modern = 2,
}

impl SyntaxFormat {
    /// numeric code of the format
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Legacy),
            2 => Some(Self::Modern),
            _ => None,
        }
    }
}

impl fmt::Display for SyntaxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Trim the characters PHP's `trim()` strips, and nothing else.
pub(crate) fn trim_blank(text: &str) -> &str {
    text.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B'))
}

/// Format `text` for storing on a branch using the `target` syntax.
///
/// `source` defaults to `target`. Converting legacy strings into the modern
/// syntax is supported, the other direction is not.
pub fn fix_syntax(
    text: &str,
    target: SyntaxFormat,
    source: Option<SyntaxFormat>,
) -> MlangResult<String> {
    let source = source.unwrap_or(target);
    let clean = trim_blank(text).replace('\r', "");

    let clean = match (target, source) {
        (SyntaxFormat::Modern, SyntaxFormat::Modern) => {
            let clean = clean.replace('\\', "");
            BLANK_LINES.replace_all(&clean, "\n\n\n").into_owned()
        }
        (SyntaxFormat::Modern, SyntaxFormat::Legacy) => {
            let clean = BLANK_LINES.replace_all(&clean, "\n\n\n");
            let clean = PERCENTS.replace_all(&clean, "%");
            let clean = clean.replace("\\$", ESCAPED_DOLLAR).replace('\\', "");
            let clean = BARE_PLACEHOLDER.replace_all(&clean, "${1}{$$a${2}}");
            clean.replace(ESCAPED_DOLLAR, "$").replace("&#36;", "$")
        }
        (SyntaxFormat::Legacy, SyntaxFormat::Legacy) => {
            let clean = BLANK_LINES.replace_all(&clean, "\n\n");
            let clean = clean
                .replace("\\$", ESCAPED_DOLLAR)
                .replace('\\', "")
                .replace('$', "\\$");
            let clean = ESCAPED_PLACEHOLDER.replace_all(&clean, "$$a${1}");
            let clean = clean.replace(ESCAPED_DOLLAR, "\\$").replace('"', "\\\"");
            PERCENTS.replace_all(&clean, "%").replace('%', "%%")
        }
        (SyntaxFormat::Legacy, SyntaxFormat::Modern) => {
            return Err(MlangError::UnsupportedConversion {
                from: source.code(),
                to: target.code(),
            });
        }
    };

    Ok(clean)
}

/// Like [`fix_syntax`] with formats given as their numeric codes.
pub fn fix_syntax_codes(text: &str, target: u8, source: Option<u8>) -> MlangResult<String> {
    let unsupported = || MlangError::UnsupportedConversion {
        from: source.unwrap_or(target),
        to: target,
    };
    let target_format = SyntaxFormat::from_code(target).ok_or_else(unsupported)?;
    let source_format = match source {
        Some(code) => Some(SyntaxFormat::from_code(code).ok_or_else(unsupported)?),
        None => None,
    };
    fix_syntax(text, target_format, source_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modern(text: &str) -> String {
        fix_syntax(text, SyntaxFormat::Modern, None).unwrap()
    }

    fn upgrade(text: &str) -> String {
        fix_syntax(text, SyntaxFormat::Modern, Some(SyntaxFormat::Legacy)).unwrap()
    }

    fn legacy(text: &str) -> String {
        fix_syntax(text, SyntaxFormat::Legacy, None).unwrap()
    }

    #[test]
    fn test_modern_sanitizing() {
        assert_eq!(modern("  Hello \\\"world\\\"  "), "Hello \"world\"");
        assert_eq!(modern("a\r\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(modern("a\n\nb"), "a\n\nb");
        assert_eq!(modern("Hi {$a}, 50%"), "Hi {$a}, 50%");
    }

    #[test]
    fn test_modern_is_idempotent() {
        for text in ["  x\\y\r\n\n\n\n z ", "{$a->name} \\$", "plain"] {
            let once = modern(text);
            assert_eq!(modern(&once), once);
        }
    }

    #[test]
    fn test_upgrade_wraps_placeholders() {
        assert_eq!(upgrade("Hello $a"), "Hello {$a}");
        assert_eq!(upgrade("$a->name is here"), "{$a->name} is here");
        assert_eq!(upgrade("Keep {$a} as is"), "Keep {$a} as is");
        assert_eq!(upgrade("Value: $abc"), "Value: $abc");
    }

    #[test]
    fn test_upgrade_unescapes() {
        assert_eq!(upgrade("Price \\$5 and 100%%"), "Price $5 and 100%");
        assert_eq!(upgrade("It\\'s &#36;x"), "It's $x");
        assert_eq!(upgrade("Say \\\"hi\\\""), "Say \"hi\"");
    }

    #[test]
    fn test_upgrade_then_modern_is_fixed_point() {
        for text in ["Hello $a", "\\$a->x and $a->y", "100%% of $a\n\n\n\n"] {
            let upgraded = upgrade(text);
            assert_eq!(modern(&upgraded), upgraded);
        }
    }

    #[test]
    fn test_legacy_escaping() {
        assert_eq!(legacy("Hello $a, you have $b"), "Hello $a, you have \\$b");
        assert_eq!(legacy("$a->foo"), "$a->foo");
        assert_eq!(legacy("Say \"hi\""), "Say \\\"hi\\\"");
        assert_eq!(legacy("50%"), "50%%");
        assert_eq!(legacy("100%%"), "100%%");
        assert_eq!(legacy("keep \\$a escaped"), "keep \\$a escaped");
        assert_eq!(legacy("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_downgrade_is_unsupported() {
        let result = fix_syntax("{$a}", SyntaxFormat::Legacy, Some(SyntaxFormat::Modern));
        assert!(matches!(
            result,
            Err(MlangError::UnsupportedConversion { from: 2, to: 1 })
        ));
    }

    #[test]
    fn test_numeric_codes() {
        assert_eq!(fix_syntax_codes("Hi $a", 2, Some(1)).unwrap(), "Hi {$a}");
        assert!(fix_syntax_codes("x", 3, None).is_err());
        assert!(fix_syntax_codes("x", 2, Some(0)).is_err());
    }

    #[test]
    fn test_trim_blank_keeps_other_whitespace() {
        assert_eq!(trim_blank("\u{a0}x \t\n"), "\u{a0}x");
        assert_eq!(trim_blank("\0\x0Bx\r"), "x");
    }
}
