//! Database migrations
//!
//! Migrations are embedded as SQL strings with one variant per backend and
//! applied in version order. Applied versions are tracked in `_migrations`.
//!
//! Column types follow the field kinds in [`crate::models::FieldKind`]:
//! text as `TEXT`, lists and JSON as JSON-encoded `TEXT`, booleans as
//! `BOOLEAN`, numbers as `REAL`/`DOUBLE`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_destinations",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS destinations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                region TEXT NOT NULL,
                slug TEXT,
                tagline TEXT,
                description TEXT,
                image_url TEXT,
                images TEXT NOT NULL DEFAULT '[]',
                starting_price REAL NOT NULL DEFAULT 0,
                rating REAL NOT NULL DEFAULT 5,
                best_time_to_visit TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_destinations_region_position ON destinations(region, position);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS destinations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                position INT NOT NULL DEFAULT 0,
                name VARCHAR(255) NOT NULL,
                region VARCHAR(100) NOT NULL,
                slug VARCHAR(255),
                tagline TEXT,
                description TEXT,
                image_url TEXT,
                images TEXT NOT NULL,
                starting_price DOUBLE NOT NULL DEFAULT 0,
                rating DOUBLE NOT NULL DEFAULT 5,
                best_time_to_visit TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_destinations_region_position ON destinations(region, position);
        "#,
    },
    Migration {
        version: 2,
        name: "create_blog_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                slug TEXT,
                excerpt TEXT,
                content TEXT,
                cover_image TEXT,
                author TEXT,
                category TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                read_time_minutes INTEGER NOT NULL DEFAULT 0,
                published BOOLEAN NOT NULL DEFAULT 0,
                published_at TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_blog_posts_position ON blog_posts(position);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                position INT NOT NULL DEFAULT 0,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255),
                excerpt TEXT,
                content LONGTEXT,
                cover_image TEXT,
                author VARCHAR(255),
                category VARCHAR(255),
                tags TEXT NOT NULL,
                read_time_minutes BIGINT NOT NULL DEFAULT 0,
                published BOOLEAN NOT NULL DEFAULT FALSE,
                published_at VARCHAR(64),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_blog_posts_position ON blog_posts(position);
        "#,
    },
    Migration {
        version: 3,
        name: "create_banners",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS banners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                subtitle TEXT,
                image_url TEXT NOT NULL,
                mobile_image_url TEXT,
                link_url TEXT,
                button_text TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS banners (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                position INT NOT NULL DEFAULT 0,
                title VARCHAR(255) NOT NULL,
                subtitle TEXT,
                image_url TEXT NOT NULL,
                mobile_image_url TEXT,
                link_url TEXT,
                button_text VARCHAR(100),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_offers",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS offers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                description TEXT,
                discount_text TEXT,
                discount_percent INTEGER NOT NULL DEFAULT 0,
                image_url TEXT,
                valid_until TEXT,
                destinations TEXT NOT NULL DEFAULT '[]',
                terms TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS offers (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                position INT NOT NULL DEFAULT 0,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                discount_text VARCHAR(255),
                discount_percent BIGINT NOT NULL DEFAULT 0,
                image_url TEXT,
                valid_until VARCHAR(64),
                destinations TEXT NOT NULL,
                terms TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 5,
        name: "create_partners",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS partners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                logo_url TEXT,
                website_url TEXT,
                category TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS partners (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                position INT NOT NULL DEFAULT 0,
                name VARCHAR(255) NOT NULL,
                logo_url TEXT,
                website_url TEXT,
                category VARCHAR(100),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 6,
        name: "create_popups",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS popups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                message TEXT,
                image_url TEXT,
                cta_text TEXT,
                cta_link TEXT,
                delay_seconds INTEGER NOT NULL DEFAULT 3,
                is_active BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS popups (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                position INT NOT NULL DEFAULT 0,
                title VARCHAR(255) NOT NULL,
                message TEXT,
                image_url TEXT,
                cta_text VARCHAR(100),
                cta_link TEXT,
                delay_seconds BIGINT NOT NULL DEFAULT 3,
                is_active BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 7,
        name: "create_packages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                slug TEXT,
                destination TEXT NOT NULL,
                duration TEXT,
                price REAL NOT NULL DEFAULT 0,
                original_price REAL NOT NULL DEFAULT 0,
                rating REAL NOT NULL DEFAULT 5,
                images TEXT NOT NULL DEFAULT '[]',
                includes TEXT NOT NULL DEFAULT '[]',
                excludes TEXT NOT NULL DEFAULT '[]',
                highlights TEXT NOT NULL DEFAULT '[]',
                itinerary TEXT,
                publish_to TEXT NOT NULL DEFAULT '[]',
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS packages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                position INT NOT NULL DEFAULT 0,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255),
                destination VARCHAR(255) NOT NULL,
                duration VARCHAR(64),
                price DOUBLE NOT NULL DEFAULT 0,
                original_price DOUBLE NOT NULL DEFAULT 0,
                rating DOUBLE NOT NULL DEFAULT 5,
                images TEXT NOT NULL,
                includes TEXT NOT NULL,
                excludes TEXT NOT NULL,
                highlights TEXT NOT NULL,
                itinerary LONGTEXT,
                publish_to TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 8,
        name: "create_package_listings",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS package_listings (
                listing VARCHAR(50) NOT NULL,
                package_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                slug TEXT,
                destination TEXT,
                duration TEXT,
                price REAL NOT NULL DEFAULT 0,
                original_price REAL NOT NULL DEFAULT 0,
                rating REAL NOT NULL DEFAULT 5,
                image TEXT,
                PRIMARY KEY (listing, package_id),
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_package_listings_package ON package_listings(package_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS package_listings (
                listing VARCHAR(50) NOT NULL,
                package_id BIGINT NOT NULL,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255),
                destination VARCHAR(255),
                duration VARCHAR(64),
                price DOUBLE NOT NULL DEFAULT 0,
                original_price DOUBLE NOT NULL DEFAULT 0,
                rating DOUBLE NOT NULL DEFAULT 5,
                image TEXT,
                PRIMARY KEY (listing, package_id),
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_package_listings_package ON package_listings(package_id);
        "#,
    },
    Migration {
        version: 9,
        name: "create_drafts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS drafts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_type VARCHAR(50) NOT NULL,
                original_id INTEGER,
                data TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_drafts_type_original ON drafts(content_type, original_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS drafts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                content_type VARCHAR(50) NOT NULL,
                original_id BIGINT,
                data LONGTEXT NOT NULL,
                version BIGINT NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX idx_drafts_type_original ON drafts(content_type, original_id);
        "#,
    },
];

/// Apply every pending migration, returning how many ran
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match (pool.as_sqlite(), pool.as_mysql()) {
        (Some(sqlite), _) => get_applied_migrations_sqlite(sqlite).await,
        (_, Some(mysql)) => get_applied_migrations_mysql(mysql).await,
        _ => anyhow::bail!("Database pool exposes no backend"),
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: i64::from(row.get::<i32, _>("version")),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match (pool.as_sqlite(), pool.as_mysql()) {
        (Some(sqlite), _) => apply_migration_sqlite(sqlite, migration).await,
        (_, Some(mysql)) => apply_migration_mysql(mysql, migration).await,
        _ => anyhow::bail!("Database pool exposes no backend"),
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(())
}

// MySQL commits DDL implicitly, so statements run one by one.
async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration body into individual statements
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::ContentKind;

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
        assert!(is_up_to_date(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_count_before_and_after() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());

        run_migrations(&pool).await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[test]
    fn test_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1);
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n  -- comment only\n;\nCREATE INDEX i ON a(id);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements, vec!["CREATE TABLE a (id INT)", "CREATE INDEX i ON a(id)"]);
    }

    /// Every schema column must exist in its table, or dynamic queries break.
    #[tokio::test]
    async fn test_every_schema_column_exists() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();

        for kind in ContentKind::ALL {
            let schema = kind.schema();
            let sql = format!("SELECT {} FROM {} LIMIT 1", schema.select_list(), schema.table);
            sqlx::query(&sql)
                .fetch_optional(sqlite)
                .await
                .unwrap_or_else(|e| panic!("{} columns out of sync: {}", kind, e));
        }
    }
}
