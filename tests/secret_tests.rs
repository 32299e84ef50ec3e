//! Encrypted-value handling through the full pipeline.

use stratacfg::interceptor::AesGcmSecretHandler;
use stratacfg::source::MapSource;
use stratacfg::{Config, ConfigError};

fn encrypted_config(encryption_key: &str, plaintext: &str) -> Config {
    let handler = AesGcmSecretHandler::new(encryption_key);
    let literal = handler.encrypt_to_expression(plaintext).unwrap();
    Config::builder()
        .with_source(MapSource::new("app").set("db.password", literal))
        .with_secret_handler(handler)
        .build()
}

#[test]
fn test_encrypted_value_decodes_transparently() {
    let config = encrypted_config("sekret-key", "12345678");
    assert_eq!(config.get::<String>("db.password").unwrap(), "12345678");
}

#[test]
fn test_repeated_lookups_decode_consistently() {
    let config = encrypted_config("sekret-key", "12345678");
    assert_eq!(config.get::<String>("db.password").unwrap(), "12345678");
    assert_eq!(config.get::<String>("db.password").unwrap(), "12345678");
}

#[test]
fn test_lineage_records_the_secret_step() {
    let config = encrypted_config("sekret-key", "12345678");
    let value = config.config_value("db.password").unwrap();
    assert_eq!(value.value.as_deref(), Some("12345678"));
    assert!(value.lineage.iter().any(|step| step.contains("expression")));
    assert!(value.lineage.iter().any(|step| step.contains("aes-gcm-nopadding")));
    // The raw value still shows the undecoded form.
    assert!(value.raw_value.as_deref().unwrap().starts_with("${aes-gcm-nopadding::"));
}

#[test]
fn test_unknown_handler_is_an_error() {
    let config = Config::builder()
        .with_source(MapSource::new("app").set("key", "${vault::abc}"))
        .build();

    assert!(matches!(
        config.get::<String>("key").unwrap_err(),
        ConfigError::UnknownSecretHandler(ref name) if name == "vault"
    ));
}

#[test]
fn test_wrong_key_fails_to_decode() {
    let encrypting = AesGcmSecretHandler::new("sekret-key");
    let literal = encrypting.encrypt_to_expression("12345678").unwrap();

    let config = Config::builder()
        .with_source(MapSource::new("app").set("db.password", literal))
        .with_secret_handler(AesGcmSecretHandler::new("different-key"))
        .build();

    assert!(matches!(
        config.get::<String>("db.password").unwrap_err(),
        ConfigError::SecretDecode { .. }
    ));
}

#[test]
fn test_disabled_secrets_leave_payload_in_place() {
    let handler = AesGcmSecretHandler::new("sekret-key");
    let literal = handler.encrypt_to_expression("12345678").unwrap();
    let payload = literal
        .trim_start_matches("${aes-gcm-nopadding::")
        .trim_end_matches('}')
        .to_string();

    let config = Config::builder()
        .with_source(MapSource::new("app").set("db.password", literal))
        .with_secret_handler(handler)
        .secrets(false)
        .build();

    // Expression expansion still splices the payload, but no decoding runs.
    assert_eq!(config.get::<String>("db.password").unwrap(), payload);
}

#[test]
fn test_schema_default_may_be_encrypted() {
    let handler = AesGcmSecretHandler::new("sekret-key");
    let literal = handler.encrypt_to_expression("fallback-secret").unwrap();

    let config = Config::builder()
        .with_secret_handler(handler)
        .with_default("db.password", literal)
        .build();

    assert_eq!(config.get::<String>("db.password").unwrap(), "fallback-secret");
}
