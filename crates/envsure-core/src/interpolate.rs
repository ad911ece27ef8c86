//! `${KEY}` substitution over a merged raw environment
//!
//! Each reference is expanded recursively against the merged raw values,
//! never against partially expanded ones. A reference is left as literal
//! text when it names an absent key, when it would re-enter a key already
//! being expanded (a cycle), when it sits [`MAX_DEPTH`] levels deep, or when
//! expanding it would exceed [`MAX_EXPANDED_LEN`].

use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::providers::RawEnv;

/// Maximum nesting of references
pub const MAX_DEPTH: usize = 8;

/// Upper bound on the bytes substituted into a single value
pub const MAX_EXPANDED_LEN: usize = 64 * 1024;

fn reference_regex() -> &'static Regex {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    REFERENCE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("reference pattern is valid")
    })
}

/// Result of an interpolation pass
#[derive(Debug, Clone, Default)]
pub struct Interpolated {
    /// Values with references expanded
    pub values: RawEnv,
    /// For each key, every key whose value was substituted into it
    pub sources: HashMap<String, BTreeSet<String>>,
}

impl Interpolated {
    /// Keys substituted into `key`, directly or through nesting
    pub fn sources_of(&self, key: &str) -> impl Iterator<Item = &str> {
        self.sources
            .get(key)
            .into_iter()
            .flat_map(|keys| keys.iter().map(String::as_str))
    }
}

/// Expand references in every value of `env`
pub fn interpolate(env: &RawEnv) -> RawEnv {
    interpolate_traced(env).values
}

/// Expand references and record which keys fed each value
pub fn interpolate_traced(env: &RawEnv) -> Interpolated {
    let mut out = Interpolated::default();
    for (key, value) in env {
        let mut expansion = Expansion {
            env,
            stack: vec![key.as_str()],
            used: BTreeSet::new(),
            budget: MAX_EXPANDED_LEN,
        };
        let expanded = expansion.expand(value, 0);
        if !expansion.used.is_empty() {
            tracing::trace!(key = %key, references = expansion.used.len(), "expanded references");
            out.sources.insert(key.clone(), expansion.used);
        }
        out.values.insert(key.clone(), expanded);
    }
    out
}

struct Expansion<'a> {
    env: &'a RawEnv,
    /// Keys currently being expanded, outermost first
    stack: Vec<&'a str>,
    used: BTreeSet<String>,
    budget: usize,
}

impl<'a> Expansion<'a> {
    fn expand(&mut self, value: &str, depth: usize) -> String {
        if !value.contains("${") {
            return value.to_string();
        }
        let env = self.env;
        reference_regex()
            .replace_all(value, |caps: &Captures| {
                let literal = caps[0].to_string();
                let Some((name, inner)) = env.get_key_value(&caps[1]) else {
                    return literal;
                };
                if depth >= MAX_DEPTH || self.budget == 0 || self.stack.contains(&name.as_str()) {
                    tracing::debug!(reference = %name, depth, "reference left unexpanded");
                    return literal;
                }

                self.stack.push(name.as_str());
                let replacement = self.expand(inner, depth + 1);
                self.stack.pop();

                if replacement.len() > self.budget {
                    self.budget = 0;
                    return literal;
                }
                self.budget -= replacement.len();
                self.used.insert(name.clone());
                replacement
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> RawEnv {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_simple_reference() {
        let out = interpolate(&env(&[
            ("HOST", "db.internal"),
            ("DATABASE_URL", "postgres://${HOST}:5432/app"),
        ]));
        assert_eq!(out["DATABASE_URL"], "postgres://db.internal:5432/app");
        assert_eq!(out["HOST"], "db.internal");
    }

    #[test]
    fn test_nested_references() {
        let out = interpolate(&env(&[
            ("A", "${B}/a"),
            ("B", "${C}/b"),
            ("C", "root"),
        ]));
        assert_eq!(out["A"], "root/b/a");
        assert_eq!(out["B"], "root/b");
    }

    #[test]
    fn test_unresolved_reference_left_literal() {
        let out = interpolate(&env(&[("URL", "https://${MISSING}/x"), ("BAD", "${not valid}")]));
        assert_eq!(out["URL"], "https://${MISSING}/x");
        assert_eq!(out["BAD"], "${not valid}");
    }

    #[test]
    fn test_cycle_terminates() {
        let out = interpolate(&env(&[("A", "${B}"), ("B", "${A}")]));
        assert_eq!(out["A"], "${A}");
        assert_eq!(out["B"], "${B}");
    }

    #[test]
    fn test_self_reference_is_left_literal() {
        let out = interpolate(&env(&[("A", "x${A}")]));
        assert_eq!(out["A"], "x${A}");
    }

    #[test]
    fn test_repeated_self_reference_does_not_grow() {
        let out = interpolate(&env(&[("A", "${A}${A}"), ("B", "${A}${A}${A}${A}")]));
        assert_eq!(out["A"], "${A}${A}");
        assert_eq!(out["B"], "${A}${A}".repeat(4));
    }

    #[test]
    fn test_mutual_cycle_with_repeated_references() {
        let out = interpolate(&env(&[("A", "${B}${B}"), ("B", "${A}${A}")]));
        assert_eq!(out["A"], "${A}".repeat(4));
        assert_eq!(out["B"], "${B}".repeat(4));
    }

    #[test]
    fn test_depth_bound_leaves_deepest_reference() {
        let pairs: Vec<(String, String)> = (0..=MAX_DEPTH + 1)
            .map(|i| (format!("K{}", i), format!("${{K{}}}", i + 1)))
            .collect();
        let env: RawEnv = pairs.into_iter().collect();
        let out = interpolate(&env);
        assert_eq!(out["K0"], format!("${{K{}}}", MAX_DEPTH + 1));
        assert_eq!(out[&format!("K{}", MAX_DEPTH + 1)], format!("${{K{}}}", MAX_DEPTH + 2));
    }

    #[test]
    fn test_wide_fan_out_is_bounded() {
        let mut pairs = vec![("L0".to_string(), "x".repeat(64))];
        for i in 1..=MAX_DEPTH {
            pairs.push((format!("L{}", i), format!("${{L{}}}", i - 1).repeat(16)));
        }
        let env: RawEnv = pairs.into_iter().collect();
        let out = interpolate(&env);
        let top = &out[&format!("L{}", MAX_DEPTH)];
        assert!(top.len() <= MAX_EXPANDED_LEN + 16 * 8);
    }

    #[test]
    fn test_sources_are_recorded_transitively() {
        let out = interpolate_traced(&env(&[
            ("PASSWORD", "hunter2"),
            ("DSN", "${USER}:${PASSWORD}"),
            ("USER", "app"),
            ("URL", "postgres://${DSN}@db"),
        ]));
        assert_eq!(out.values["URL"], "postgres://app:hunter2@db");
        let sources: Vec<&str> = out.sources_of("URL").collect();
        assert_eq!(sources, vec!["DSN", "PASSWORD", "USER"]);
        assert_eq!(out.sources_of("USER").count(), 0);
    }
}
