use std::time::Duration;

use app_config::AppConfig;

#[test]
fn test_defaults_apply_without_variables() {
    let cfg = AppConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
    assert_eq!(cfg.db_host, "localhost");
    assert_eq!(cfg.db_port, 5432);
    assert_eq!(cfg.db_pool_size, 16);
    assert_eq!(cfg.migrations_dir, "migrations");
    assert_eq!(cfg.http_port, 8081);
    assert_eq!(cfg.shutdown_timeout, Duration::from_secs(5));
    assert_eq!(cfg.log_level, "info");
}

#[test]
fn test_variables_override_defaults() {
    let cfg = AppConfig::from_vars([
        ("DB_HOST", "postgres"),
        ("DB_PORT", "6543"),
        ("DB_POOL_SIZE", "4"),
        ("HTTP_PORT", "9000"),
        ("SHUTDOWN_TIMEOUT", "1m 30s"),
        ("LOG_LEVEL", "debug,tokio_postgres=warn"),
    ])
    .unwrap();
    assert_eq!(cfg.db_host, "postgres");
    assert_eq!(cfg.db_port, 6543);
    assert_eq!(cfg.db_pool_size, 4);
    assert_eq!(cfg.http_port, 9000);
    assert_eq!(cfg.shutdown_timeout, Duration::from_secs(90));
    assert_eq!(cfg.log_level, "debug,tokio_postgres=warn");
    assert!(cfg.database_dsn().contains("host=postgres port=6543"));
}

#[test]
fn test_invalid_duration_is_rejected() {
    let err = AppConfig::from_vars([("SHUTDOWN_TIMEOUT", "soon")]).unwrap_err();
    assert!(format!("{err:#}").contains("Invalid duration"));
}
