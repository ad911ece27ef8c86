//! Options controlling a resolution call
//!
//! Options can be set directly or loaded from environment variables:
//!
//! | Variable                              | Option                                 |
//! |---------------------------------------|----------------------------------------|
//! | `ENVSURE_STRICT`                      | [`ResolveOptions::strict`]             |
//! | `ENVSURE_INTERPOLATE`                 | [`ResolveOptions::interpolate`]        |
//! | `ENVSURE_ALLOW_DOTENV_IN_PRODUCTION`  | [`Policies::allow_dotenv_in_production`] |
//! | `APP_ENV`, then `NODE_ENV`            | [`ResolveOptions::environment`]        |

/// Value of the runtime indicator that enables production policies
pub const PRODUCTION: &str = "production";

/// Production safety policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policies {
    /// Accept values from file-backed providers when running in production
    pub allow_dotenv_in_production: bool,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            allow_dotenv_in_production: true,
        }
    }
}

impl Policies {
    pub fn with_allow_dotenv_in_production(mut self, allow: bool) -> Self {
        self.allow_dotenv_in_production = allow;
        self
    }
}

/// Options for one resolution call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Expand `${KEY}` references before typing
    pub interpolate: bool,
    /// Reject keys present in the merged environment but declared nowhere
    pub strict: bool,
    /// Runtime environment indicator; falls back to `APP_ENV` then `NODE_ENV`
    pub environment: Option<String>,
    pub policies: Policies,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interpolate: env_flag("ENVSURE_INTERPOLATE").unwrap_or(defaults.interpolate),
            strict: env_flag("ENVSURE_STRICT").unwrap_or(defaults.strict),
            environment: runtime_environment_from_process(),
            policies: Policies {
                allow_dotenv_in_production: env_flag("ENVSURE_ALLOW_DOTENV_IN_PRODUCTION")
                    .unwrap_or(defaults.policies.allow_dotenv_in_production),
            },
        }
    }

    pub fn with_interpolation(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the runtime environment indicator explicitly
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.policies = policies;
        self
    }

    /// The effective runtime environment indicator
    pub fn runtime_environment(&self) -> Option<String> {
        self.environment
            .clone()
            .or_else(runtime_environment_from_process)
    }

    /// Whether the runtime indicator equals `production` (case-insensitive)
    pub fn is_production(&self) -> bool {
        self.runtime_environment()
            .map_or(false, |env| env.trim().eq_ignore_ascii_case(PRODUCTION))
    }
}

fn runtime_environment_from_process() -> Option<String> {
    std::env::var("APP_ENV")
        .or_else(|_| std::env::var("NODE_ENV"))
        .ok()
        .filter(|env| !env.trim().is_empty())
}

/// Read a boolean flag; unrecognised values are ignored
fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(variable = name, "ignoring unrecognised boolean flag");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ResolveOptions::default();
        assert!(!options.strict);
        assert!(!options.interpolate);
        assert!(options.policies.allow_dotenv_in_production);
    }

    #[test]
    fn test_explicit_environment_wins() {
        let options = ResolveOptions::new().with_environment("Production");
        assert!(options.is_production());

        let options = ResolveOptions::new().with_environment("staging");
        assert!(!options.is_production());
    }

    #[test]
    fn test_builder() {
        let options = ResolveOptions::new()
            .with_strict(true)
            .with_interpolation(true)
            .with_policies(Policies::default().with_allow_dotenv_in_production(false));
        assert!(options.strict);
        assert!(options.interpolate);
        assert!(!options.policies.allow_dotenv_in_production);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("ENVSURE_STRICT", "TRUE");
        std::env::set_var("ENVSURE_INTERPOLATE", "0");
        std::env::set_var("ENVSURE_ALLOW_DOTENV_IN_PRODUCTION", "false");

        let options = ResolveOptions::from_env();

        std::env::remove_var("ENVSURE_STRICT");
        std::env::remove_var("ENVSURE_INTERPOLATE");
        std::env::remove_var("ENVSURE_ALLOW_DOTENV_IN_PRODUCTION");

        assert!(options.strict);
        assert!(!options.interpolate);
        assert!(!options.policies.allow_dotenv_in_production);
    }

    #[test]
    fn test_env_flag_ignores_garbage() {
        std::env::set_var("ENVSURE_OPTIONS_TEST_FLAG", "maybe");
        assert_eq!(env_flag("ENVSURE_OPTIONS_TEST_FLAG"), None);
        std::env::remove_var("ENVSURE_OPTIONS_TEST_FLAG");
        assert_eq!(env_flag("ENVSURE_OPTIONS_TEST_FLAG"), None);
    }
}
