use anyhow::{Context, Result};
use sqlx::{Executor, PgPool};
use tracing::info;

/// Embedded migration scripts as `(file name, sql)`
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_create_users.sql", include_str!("sql/001_create_users.sql")),
    ("002_create_alerts.sql", include_str!("sql/002_create_alerts.sql")),
    (
        "003_create_camera_logs.sql",
        include_str!("sql/003_create_camera_logs.sql"),
    ),
    (
        "004_widen_label_columns.sql",
        include_str!("sql/004_widen_label_columns.sql"),
    ),
];

/// Numeric prefix of a migration file name; unnumbered files run last
fn order_value(name: &str) -> usize {
    name.split('_')
        .next()
        .and_then(|prefix| prefix.parse::<usize>().ok())
        .unwrap_or(usize::MAX)
}

/// Migrations in the order they are applied
fn ordered() -> Vec<(&'static str, &'static str)> {
    let mut entries = MIGRATIONS.to_vec();
    entries.sort_by_key(|(name, _)| order_value(name));
    entries
}

/// Apply every migration. Scripts are idempotent, so this is safe to run on
/// every startup.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for (name, sql) in ordered() {
        pool.execute(sql)
            .await
            .with_context(|| format!("Failed to apply migration {}", name))?;
        info!("Applied migration: {}", name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_in_numeric_order() {
        let names: Vec<&str> = ordered().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "001_create_users.sql",
                "002_create_alerts.sql",
                "003_create_camera_logs.sql",
                "004_widen_label_columns.sql"
            ]
        );
        assert_eq!(order_value("add_indexes.sql"), usize::MAX);
    }

    #[test]
    fn camera_logs_reference_alerts() {
        let (_, sql) = ordered()[2];
        assert!(sql.contains("REFERENCES alerts"));
    }

    #[test]
    fn caller_labels_are_unbounded_text() {
        let (_, alerts) = ordered()[1];
        let (_, logs) = ordered()[2];
        for column in ["severity TEXT", "alert_type TEXT"] {
            assert!(alerts.contains(column), "alerts.{}", column);
        }
        for column in ["camera_id TEXT", "camera_status TEXT"] {
            assert!(logs.contains(column), "camera_logs.{}", column);
        }

        let (name, widen) = ordered()[3];
        assert_eq!(name, "004_widen_label_columns.sql");
        assert_eq!(widen.matches("TYPE TEXT").count(), 4);
    }
}
