//! End-to-end resolution scenarios
//!
//! Covers:
//! - Defaults, typed values and aggregated validation errors
//! - Declaration-order precedence across providers
//! - The production dotenv policy
//! - File-backed providers, interpolation and struct deserialization
//! - Synchronous resolution over warmed caches

use envsure_cache::{cached, CacheConfig};
use envsure_core::providers::{
    BundleFormat, BundleProvider, DotEnvProvider, Provider, StaticProvider,
};
use envsure_core::{
    ConfigHandle, FieldRule, IssueKind, Policies, ResolveError, ResolveOptions, Resolver, Schema,
    Value,
};
use envsure_integration_tests::CountingProvider;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn production_without_dotenv() -> ResolveOptions {
    ResolveOptions::new()
        .with_environment("production")
        .with_policies(Policies::default().with_allow_dotenv_in_production(false))
}

#[tokio::test]
async fn test_defaults_for_empty_environment() -> anyhow::Result<()> {
    let schema = Schema::compile(&json!({
        "PORT": { "type": "port", "default": 3000 },
        "NODE_ENV": {
            "type": "string",
            "enum": ["development", "production", "test"],
            "default": "development"
        }
    }))?;

    let config = Resolver::new()
        .with_source(StaticProvider::new("empty", Vec::<(String, String)>::new()), schema)
        .resolve()
        .await?;

    assert_eq!(config.get("PORT"), Some(&Value::Port(3000)));
    assert_eq!(config.get("NODE_ENV"), Some(&Value::String("development".into())));
    assert_eq!(config.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_port() -> anyhow::Result<()> {
    let err = Resolver::new()
        .with_source(
            StaticProvider::new("env", [("PORT", "99999")]),
            Schema::compile(&json!({ "PORT": { "type": "port" } }))?,
        )
        .resolve()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "ValidationError");
    assert_eq!(err.issues().len(), 1);
    assert_eq!(err.issues()[0].kind, IssueKind::InvalidPort);
    Ok(())
}

#[tokio::test]
async fn test_every_invalid_field_reported() -> anyhow::Result<()> {
    let err = Resolver::new()
        .with_source(
            StaticProvider::new("env", [("A", "abc")]),
            Schema::compile(&json!({ "A": "number", "B": "url" }))?,
        )
        .resolve()
        .await
        .unwrap_err();

    let kinds: Vec<(&str, IssueKind)> = err
        .issues()
        .iter()
        .map(|issue| (issue.key.as_str(), issue.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![("A", IssueKind::InvalidNumber), ("B", IssueKind::MissingRequired)]
    );
    Ok(())
}

#[tokio::test]
async fn test_later_provider_wins_for_shared_key() -> anyhow::Result<()> {
    let rule = json!({ "K": "string" });
    let config = Resolver::new()
        .with_source(StaticProvider::new("a", [("K", "x")]), Schema::compile(&rule)?)
        .with_source(StaticProvider::new("b", [("K", "y")]), Schema::compile(&rule)?)
        .resolve()
        .await?;

    assert_eq!(config.get_str("K"), Some("y"));
    Ok(())
}

#[tokio::test]
async fn test_declaration_order_not_arrival_order() -> anyhow::Result<()> {
    // The file provider is declared first but finishes last
    let file = CountingProvider::with_delay(
        "file",
        [("DATABASE_URL", "postgres://file/app")],
        Duration::from_millis(50),
    );
    let secrets = CountingProvider::with_delay(
        "secrets",
        [("DATABASE_URL", "postgres://secrets/app")],
        Duration::from_millis(1),
    );

    let config = Resolver::new()
        .with_arc_provider(file)
        .with_arc_provider(secrets)
        .with_schema(Schema::compile(&json!({ "DATABASE_URL": "url" }))?)
        .resolve()
        .await?;

    assert_eq!(config.get_url("DATABASE_URL").map(|u| u.as_str()), Some("postgres://secrets/app"));
    Ok(())
}

#[tokio::test]
async fn test_dotenv_secret_rejected_in_production() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "DATABASE_PASSWORD=hunter2")?;

    let schema = Schema::builder()
        .field("DATABASE_PASSWORD", FieldRule::string().secret())
        .build()?;

    let err = Resolver::new()
        .with_source(DotEnvProvider::from_file(file.path()), schema)
        .with_options(production_without_dotenv())
        .resolve()
        .await
        .unwrap_err();

    match err {
        ResolveError::Policy(ref violation) => {
            assert_eq!(violation.provider, "dotenv");
            assert_eq!(violation.keys, vec!["DATABASE_PASSWORD".to_string()]);
        }
        ref other => panic!("expected a policy violation, got {other:?}"),
    }
    assert!(err.issues().is_empty());
    assert!(!err.to_string().contains("hunter2"));
    Ok(())
}

#[tokio::test]
async fn test_dotenv_allowed_outside_production_and_by_default() -> anyhow::Result<()> {
    let file = CountingProvider::file("dotenv", [("API_KEY", "sk_test")]);
    let schema = Schema::builder().field("API_KEY", FieldRule::string().secret()).build()?;

    let resolver = Resolver::new()
        .with_arc_provider(file)
        .with_schema(schema);

    let staging = resolver
        .clone()
        .with_options(production_without_dotenv().with_environment("staging"))
        .resolve()
        .await?;
    assert_eq!(staging.get_str("API_KEY"), Some("sk_test"));

    let permissive = resolver
        .with_options(ResolveOptions::new().with_environment("production"))
        .resolve()
        .await?;
    assert_eq!(permissive.get_str("API_KEY"), Some("sk_test"));
    Ok(())
}

#[tokio::test]
async fn test_secret_values_never_in_errors() -> anyhow::Result<()> {
    let schema = Schema::compile(&json!({
        "STRIPE_KEY": { "type": "string", "secret": true, "pattern": "^sk_live_" },
        "PUBLIC_URL": "url",
    }))?;

    let err = Resolver::new()
        .with_source(
            StaticProvider::new("env", [("STRIPE_KEY", "pk_oops_123"), ("PUBLIC_URL", "nope")]),
            schema,
        )
        .resolve()
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(!message.contains("pk_oops_123"));
    assert!(message.contains("STRIPE_KEY"));
    assert!(message.contains("nope"));
    Ok(())
}

#[tokio::test]
async fn test_file_sources_with_interpolation_and_deserialize() -> anyhow::Result<()> {
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    struct AppConfig {
        port: u16,
        #[serde(rename = "DATABASE__HOST")]
        database_host: String,
        database_url: String,
        log_level: String,
        features: serde_json::Value,
        #[serde(default)]
        sentry_dsn: Option<String>,
    }

    let dir = tempfile::tempdir()?;
    let bundle_path = dir.path().join("app.toml");
    std::fs::write(
        &bundle_path,
        "PORT = 8080\nFEATURES = '{\"beta\": true}'\n\n[DATABASE]\nHOST = \"db.internal\"\n",
    )?;
    let dotenv_path = dir.path().join(".env");
    std::fs::write(
        &dotenv_path,
        "# local overrides\nexport DATABASE_URL=\"postgres://${DATABASE__HOST}:5432/app\"\nLOG_LEVEL=debug\n",
    )?;

    let schema = Schema::from_yaml_str(
        "PORT: port\n\
         DATABASE__HOST: string\n\
         DATABASE_URL: url\n\
         LOG_LEVEL: [\"*info\", debug, warn]\n\
         FEATURES: json\n\
         SENTRY_DSN: url?\n",
    )?;

    let config = Resolver::new()
        .with_provider(BundleProvider::from_file(&bundle_path)?)
        .with_source(DotEnvProvider::from_file(&dotenv_path), schema)
        .with_options(ResolveOptions::new().with_interpolation(true))
        .resolve()
        .await?;

    assert_eq!(config.get_port("PORT"), Some(8080));
    assert_eq!(config.get_json("FEATURES"), Some(&json!({ "beta": true })));
    assert!(config.get("SENTRY_DSN").is_none());

    let app: AppConfig = config.deserialize()?;
    assert_eq!(app.port, 8080);
    assert_eq!(app.database_host, "db.internal");
    assert_eq!(app.database_url, "postgres://db.internal:5432/app");
    assert_eq!(app.log_level, "debug");
    assert_eq!(app.features["beta"], json!(true));
    assert!(app.sentry_dsn.is_none());
    Ok(())
}

#[tokio::test]
async fn test_strict_mode_rejects_typos() -> anyhow::Result<()> {
    let resolver = Resolver::new()
        .with_source(
            BundleProvider::inline(BundleFormat::Json, r#"{"PORT": 80, "DATABSE_URL": "x"}"#),
            Schema::compile(&json!({ "PORT": "port", "DATABASE_URL": "url?" }))?,
        )
        .with_options(ResolveOptions::new().with_strict(true));

    let outcome = resolver.resolve_safe().await;
    assert!(!outcome.is_resolved());
    assert_eq!(outcome.issues().len(), 1);
    assert_eq!(outcome.issues()[0].key, "DATABSE_URL");
    assert_eq!(outcome.issues()[0].kind, IssueKind::UnknownKey);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_repeat_resolution_within_ttl_is_identical() -> anyhow::Result<()> {
    let secrets = CountingProvider::new("secrets", [("API_KEY", "sk_live_1")]);
    let cache = Arc::new(cached(secrets.clone(), CacheConfig::new(Duration::from_secs(300)))?);

    let resolver = Resolver::new()
        .with_arc_provider(cache.clone())
        .with_schema(Schema::compile(&json!({
            "API_KEY": { "type": "string", "secret": true },
            "LOAD_COUNT": "integer",
        }))?);

    let first = resolver.resolve().await?;
    tokio::time::advance(Duration::from_secs(120)).await;
    let second = resolver.resolve().await?;

    assert_eq!(first, second);
    assert_eq!(secrets.calls(), 1);
    assert_eq!(cache.stats().hits, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sync_resolution_needs_warm_cache() -> anyhow::Result<()> {
    let secrets = CountingProvider::new("secrets", [("TOKEN", "abc")]);
    let cache = Arc::new(cached(secrets.clone(), CacheConfig::new(Duration::from_secs(60)))?);
    let resolver = Resolver::new()
        .with_provider(StaticProvider::new("defaults", [("REGION", "eu-west-1")]))
        .with_arc_provider(cache.clone())
        .with_schema(Schema::compile(&json!({ "REGION": "string", "TOKEN": "string" }))?);

    let err = resolver.resolve_sync().unwrap_err();
    assert!(matches!(
        err,
        ResolveError::AsyncProviderInSyncContext { ref provider } if provider == "secrets"
    ));

    cache.load().await?;
    let config = resolver.resolve_sync()?;
    assert_eq!(config.get_str("TOKEN"), Some("abc"));
    assert_eq!(config.get_str("REGION"), Some("eu-west-1"));
    assert_eq!(secrets.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_handle_resolves_once() -> anyhow::Result<()> {
    let secrets = CountingProvider::new("secrets", [("PORT", "9000")]);
    let handle = ConfigHandle::new(
        Resolver::new()
            .with_arc_provider(secrets.clone())
            .with_schema(Schema::compile(&json!({ "PORT": "port" }))?),
    );

    let (a, b) = tokio::join!(handle.get_or_resolve(), handle.get_or_resolve());
    assert_eq!(a?.get_port("PORT"), Some(9000));
    assert_eq!(b?.get_port("PORT"), Some(9000));
    assert_eq!(secrets.calls(), 1);
    assert!(handle.get().is_some());
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_aborts_resolution() -> anyhow::Result<()> {
    let healthy = CountingProvider::new("defaults", [("PORT", "80")]);
    let broken = CountingProvider::new("vault", [("TOKEN", "x")]);
    broken.set_failing(true);

    let err = Resolver::new()
        .with_arc_provider(healthy)
        .with_arc_provider(broken)
        .with_schema(Schema::compile(&json!({ "PORT": "port" }))?)
        .resolve()
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Provider { ref provider, .. } if provider == "vault"));
    assert!(err.issues().is_empty());
    Ok(())
}
