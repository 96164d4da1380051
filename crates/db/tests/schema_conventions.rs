use sqlx::PgPool;

/// Append-only tables carry `created_at` but no `updated_at`.
const APPEND_ONLY: &[&str] = &["audit_log"];

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_pks_are_bigint(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, data_type
         FROM information_schema.columns
         WHERE column_name = 'id'
           AND table_schema = 'public'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(!rows.is_empty());
    for (table, data_type) in &rows {
        assert_eq!(data_type, "bigint", "Table {table}.id should be bigint");
    }
}

/// Every table has timestamptz timestamps.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_all_tables_have_timestamps(pool: PgPool) {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name
         FROM information_schema.tables
         WHERE table_schema = 'public'
           AND table_type = 'BASE TABLE'
           AND table_name != '_sqlx_migrations'
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for (table,) in &tables {
        let cols: &[&str] = if APPEND_ONLY.contains(&table.as_str()) {
            &["created_at"]
        } else {
            &["created_at", "updated_at"]
        };
        for col in cols {
            let result: Option<(String,)> = sqlx::query_as(
                "SELECT data_type
                 FROM information_schema.columns
                 WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
            )
            .bind(table)
            .bind(col)
            .fetch_optional(&pool)
            .await
            .unwrap();

            let (data_type,) =
                result.unwrap_or_else(|| panic!("Table {table} is missing column {col}"));
            assert_eq!(
                data_type, "timestamp with time zone",
                "Table {table}.{col} should be timestamptz, got {data_type}"
            );
        }
    }
}

/// No character varying columns; TEXT is preferred.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_no_varchar_columns(pool: PgPool) {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name, column_name
         FROM information_schema.columns
         WHERE table_schema = 'public'
           AND data_type = 'character varying'
           AND table_name != '_sqlx_migrations'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert!(rows.is_empty(), "Found varchar columns: {rows:?}");
}

/// Every GUID dependent column exists with the expected type.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_guid_dependents_match_schema(pool: PgPool) {
    use sitecheck_core::element::{DependentKind, GUID_DEPENDENTS};

    for dep in GUID_DEPENDENTS {
        let (data_type,): (String,) = sqlx::query_as(
            "SELECT data_type FROM information_schema.columns
             WHERE table_schema = 'public' AND table_name = $1 AND column_name = $2",
        )
        .bind(dep.table)
        .bind(dep.column)
        .fetch_one(&pool)
        .await
        .unwrap_or_else(|e| panic!("{}.{} missing: {e}", dep.table, dep.column));

        let expected = match dep.kind {
            DependentKind::Scalar => "text",
            DependentKind::Array => "ARRAY",
        };
        assert_eq!(data_type, expected, "{}.{}", dep.table, dep.column);

        let has_project: Option<(String,)> = sqlx::query_as(
            "SELECT column_name FROM information_schema.columns
             WHERE table_schema = 'public' AND table_name = $1 AND column_name = 'project_id'",
        )
        .bind(dep.table)
        .fetch_optional(&pool)
        .await
        .unwrap();
        assert!(has_project.is_some(), "{} needs project_id", dep.table);
    }
}
