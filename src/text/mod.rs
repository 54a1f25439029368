use log::debug;
use once_cell::sync::Lazy;
use regex::{ Captures, Regex };

static HTML_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[r"(?is)<script[^>]*>.*?</script>", r"<[^>]+>", r"(?i)javascript:", r"(?i)data:"])
});

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(
        &[
            r"\b\d{3}-\d{3}-\d{4}\b",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b",
            r"\b\d{5}(?:-\d{4})?\b",
            r"\b\d{3}-\d{2}-\d{4}\b",
        ]
    )
});

static INAPPROPRIATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(
        &[
            r"(?i)\b(?:fuck|shit|bitch|ass|damn|hell)\b",
            r"(?i)\b(?:kill|murder|suicide|death|die)\b",
            r"(?i)\b(?:hate|racist|sexist|discriminatory)\b",
        ]
    )
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static INLINE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\f\v]+").unwrap());
static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").unwrap());
static NUMERIC_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(x?[0-9A-Fa-f]+);").unwrap());

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    // Last so "&amp;lt;" decodes to "&lt;" and not "<".
    ("&amp;", "&"),
];

const SPECIAL_CHARS: &[(char, &str)] = &[
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{2026}', "..."),
    ('\u{00AE}', "(R)"),
    ('\u{00A9}', "(C)"),
    ('\u{2122}', "(TM)"),
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
}

/// Which cleaning passes to run.
#[derive(Debug, Clone, Copy)]
pub struct CleanOptions {
    pub strip_html: bool,
    pub redact_sensitive: bool,
    pub filter_inappropriate: bool,
    /// Collapse whitespace but keep single line breaks.
    pub keep_line_breaks: bool,
}

impl CleanOptions {
    /// Every pass, whitespace fully collapsed. Used for user input.
    pub const STRICT: CleanOptions = CleanOptions {
        strip_html: true,
        redact_sensitive: true,
        filter_inappropriate: true,
        keep_line_breaks: false,
    };

    /// Markup removal only. Used for outbound text that must keep phone
    /// numbers and addresses intact (SMS bodies, speech, model replies).
    pub const OUTBOUND: CleanOptions = CleanOptions {
        strip_html: true,
        redact_sensitive: false,
        filter_inappropriate: false,
        keep_line_breaks: true,
    };
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self::STRICT
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextCleaner;

impl TextCleaner {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, text: &str) -> String {
        self.clean_with(text, CleanOptions::STRICT)
    }

    pub fn clean_outbound(&self, text: &str) -> String {
        self.clean_with(text, CleanOptions::OUTBOUND)
    }

    pub fn clean_with(&self, text: &str, options: CleanOptions) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut cleaned = text.to_string();
        if options.strip_html {
            cleaned = replace_all(&HTML_PATTERNS, &cleaned, "");
        }
        if options.redact_sensitive {
            cleaned = replace_all(&SENSITIVE_PATTERNS, &cleaned, "[REDACTED]");
        }
        if options.filter_inappropriate {
            cleaned = replace_all(&INAPPROPRIATE_PATTERNS, &cleaned, "[INAPPROPRIATE]");
        }

        cleaned = if options.keep_line_breaks {
            let lines = INLINE_WHITESPACE.replace_all(&cleaned, " ");
            let lines = NEWLINES.replace_all(&lines, "\n");
            lines
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            WHITESPACE.replace_all(&cleaned, " ").into_owned()
        };

        cleaned = decode_entities(&cleaned);
        cleaned = replace_special_chars(&cleaned);

        let cleaned = cleaned.trim().to_string();
        debug!("Text cleaned. Original length: {}, cleaned length: {}", text.len(), cleaned.len());
        cleaned
    }
}

fn replace_all(patterns: &[Regex], text: &str, replacement: &str) -> String {
    patterns.iter().fold(text.to_string(), |acc, re| re.replace_all(&acc, replacement).into_owned())
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x').or_else(|| raw.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    NAMED_ENTITIES.iter().fold(numeric.into_owned(), |acc, (entity, plain)| acc.replace(entity, plain))
}

fn replace_special_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match SPECIAL_CHARS.iter().find(|(special, _)| *special == c) {
            Some((_, ascii)) => out.push_str(ascii),
            None => out.push(c),
        }
    }
    out
}
