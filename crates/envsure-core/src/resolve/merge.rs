//! Merging of schemas and raw environments

use std::sync::Arc;

use crate::error::{PolicyViolation, ResolveError};
use crate::providers::{Provider, RawEnv};
use crate::schema::Schema;

/// Merge compiled schemas into one, keyed by field name
///
/// A key declared twice is accepted only when both compile to the same
/// rule; the first declaration keeps its position.
pub(super) fn merge_schemas(schemas: &[Schema]) -> Result<Schema, ResolveError> {
    let mut merged = Schema::default();
    for schema in schemas {
        for field in schema.iter() {
            match merged.get(field.key()) {
                Some(existing) if existing.same_rule(field) => {}
                Some(_) => {
                    return Err(ResolveError::DuplicateKey {
                        key: field.key().to_string(),
                    })
                }
                None => merged.push(field.clone()),
            }
        }
    }
    Ok(merged)
}

/// Reject file-sourced values when production policy forbids them
///
/// Only the first offending provider is reported.
pub(super) fn check_policy(
    providers: &[Arc<dyn Provider>],
    envs: &[RawEnv],
) -> Result<(), PolicyViolation> {
    for (provider, env) in providers.iter().zip(envs) {
        if !provider.kind().is_file() || env.is_empty() {
            continue;
        }
        let mut keys: Vec<String> = env.keys().cloned().collect();
        keys.sort();
        return Err(PolicyViolation {
            provider: provider.name().to_string(),
            keys,
        });
    }
    Ok(())
}

/// Merge raw environments in declared order; later providers win
pub(super) fn merge_envs(envs: Vec<RawEnv>) -> RawEnv {
    let mut merged = RawEnv::new();
    for env in envs {
        merged.extend(env);
    }
    merged
}
