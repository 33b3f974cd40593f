//! Table definitions

use crate::Result;
use sqlx::SqlitePool;

const CREATE_SPECIES: &str = r#"
    CREATE TABLE IF NOT EXISTS species (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
        common_name TEXT,
        description TEXT CHECK (description IS NULL OR length(description) <= 1000),
        active INTEGER NOT NULL DEFAULT 1
    )
"#;

const CREATE_PREDICTIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        image_name TEXT NOT NULL,
        image_url TEXT,
        species_id INTEGER NOT NULL REFERENCES species(id),
        confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
        model_version TEXT,
        created_at TEXT NOT NULL
    )
"#;

// Predictions are audit records: created_at is written once
const CREATE_CREATED_AT_GUARD: &str = r#"
    CREATE TRIGGER IF NOT EXISTS predictions_created_at_immutable
    BEFORE UPDATE OF created_at ON predictions
    BEGIN
        SELECT RAISE(ABORT, 'predictions.created_at is immutable');
    END
"#;

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_predictions_species_id ON predictions(species_id)",
    "CREATE INDEX IF NOT EXISTS idx_predictions_model_version ON predictions(model_version)",
];

/// Create the species and predictions tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_SPECIES).execute(pool).await?;
    sqlx::query(CREATE_PREDICTIONS).execute(pool).await?;
    sqlx::query(CREATE_CREATED_AT_GUARD).execute(pool).await?;
    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database tables initialized (species, predictions)");

    Ok(())
}
