// harvester-core/src/infrastructure/config/env.rs

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn re_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

/// Replaces `${VAR}` with the value of `VAR`. Unset variables stay as written.
pub fn substitute_env(raw: &str) -> String {
    substitute_with(raw, |name| std::env::var(name).ok())
}

pub fn substitute_with<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    re_placeholder()
        .replace_all(raw, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
