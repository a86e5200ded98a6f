//! Lightweight language detection over raw error text
//!
//! Each language contributes weighted signals (literal markers or short
//! regexes). A signal counts once no matter how often it occurs. The
//! language with the highest total wins; no signal or a tie at the top means
//! detection failed.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::Language;

enum Signal {
    Literal(&'static str),
    Pattern(Option<Regex>),
}

impl Signal {
    fn hit(&self, text: &str) -> bool {
        match self {
            Signal::Literal(s) => text.contains(s),
            Signal::Pattern(re) => re.as_ref().is_some_and(|re| re.is_match(text)),
        }
    }
}

struct LanguageSignals {
    language: Language,
    signals: Vec<(Signal, u32)>,
}

fn lit(s: &'static str, weight: u32) -> (Signal, u32) {
    (Signal::Literal(s), weight)
}

fn re(pattern: &str, weight: u32) -> (Signal, u32) {
    (Signal::Pattern(Regex::new(pattern).ok()), weight)
}

fn signals() -> &'static [LanguageSignals] {
    static SIGNALS: OnceLock<Vec<LanguageSignals>> = OnceLock::new();
    SIGNALS.get_or_init(|| {
        vec![
            LanguageSignals {
                language: Language::Python,
                signals: vec![
                    lit("Traceback (most recent call last)", 5),
                    re(r#"File "[^"]+\.py", line \d+"#, 5),
                    re(
                        r"\b(?:IndexError|KeyError|AttributeError|ModuleNotFoundError|ImportError|NameError|ZeroDivisionError|ValueError|FileNotFoundError|IndentationError|RecursionError|UnboundLocalError|StopIteration):",
                        3,
                    ),
                    lit("site-packages", 2),
                    re(r"\.py\b", 1),
                ],
            },
            LanguageSignals {
                language: Language::JavaScript,
                signals: vec![
                    re(r"at .+\.(?:m|c)?jsx?:\d+:\d+", 4),
                    lit("node:internal", 4),
                    lit("UnhandledPromiseRejection", 4),
                    re(r"\b(?:ReferenceError|RangeError|EvalError|URIError):", 3),
                    lit("Cannot read properties of", 3),
                    lit("node_modules", 2),
                    lit("is not a function", 2),
                    lit("ECONNREFUSED", 2),
                    lit("ENOENT", 1),
                ],
            },
            LanguageSignals {
                language: Language::TypeScript,
                signals: vec![
                    re(r"error TS\d+", 5),
                    re(r"\.tsx?[:(]\d+", 4),
                    lit("ts-node", 2),
                ],
            },
            LanguageSignals {
                language: Language::Java,
                signals: vec![
                    lit("Exception in thread \"", 5),
                    re(r"\bat [\w.$]+\([\w$]+\.java:\d+\)", 5),
                    lit("java.lang.", 4),
                    re(r"\b(?:java|javax|jakarta)\.[a-z]+\.", 2),
                    re(r"\.kt:\d+", 2),
                    lit("Caused by: ", 1),
                ],
            },
            LanguageSignals {
                language: Language::Rust,
                signals: vec![
                    lit("panicked at", 5),
                    re(r"error\[E\d{4}\]", 5),
                    lit("RUST_BACKTRACE", 4),
                    re(r"`(?:Option|Result)::unwrap\(\)`", 4),
                    re(r"\.rs:\d+", 3),
                ],
            },
            LanguageSignals {
                language: Language::Go,
                signals: vec![
                    lit("panic: runtime error", 5),
                    lit("fatal error: all goroutines", 5),
                    re(r"(?m)^goroutine \d+ \[", 4),
                    re(r"\.go:\d+", 3),
                    lit("go.mod", 1),
                ],
            },
            LanguageSignals {
                language: Language::Ruby,
                signals: vec![
                    re(r"\.rb:\d+", 4),
                    lit("NoMethodError", 4),
                    lit("ActiveRecord::", 4),
                    lit("undefined method", 3),
                    lit("uninitialized constant", 3),
                    lit("LoadError", 2),
                ],
            },
            LanguageSignals {
                language: Language::CSharp,
                signals: vec![
                    re(r"\bSystem\.[\w.]*Exception\b", 5),
                    re(r"\.cs:line \d+", 5),
                    lit("Microsoft.", 1),
                ],
            },
            LanguageSignals {
                language: Language::Php,
                signals: vec![
                    lit("PHP Fatal error", 5),
                    lit("PHP Warning", 5),
                    re(r"\.php(?: on line |:|\()\d+", 4),
                    lit("Parse error:", 2),
                    lit("Allowed memory size of", 2),
                ],
            },
        ]
    })
}

/// Score every language against `text`.
///
/// # Returns
/// `(language, score)` pairs for languages with a non-zero score, in
/// declaration order.
pub fn score_languages(text: &str) -> Vec<(Language, u32)> {
    signals()
        .iter()
        .map(|ls| {
            let score = ls
                .signals
                .iter()
                .filter(|(signal, _)| signal.hit(text))
                .map(|(_, weight)| weight)
                .sum::<u32>();
            (ls.language, score)
        })
        .filter(|(_, score)| *score > 0)
        .collect()
}

/// Detect the most likely language of `text`.
///
/// # Returns
/// `None` when nothing matched or the top score is tied.
pub fn detect_language(text: &str) -> Option<Language> {
    let scores = score_languages(text);
    let best = scores.iter().map(|(_, s)| *s).max()?;
    let mut leaders = scores.iter().filter(|(_, s)| *s == best);
    let (language, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(*language)
}
