//! Prediction record store
//!
//! Predictions are immutable audit records: there is no update path, and
//! `created_at` is stamped here, once, at insert time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use wildlife_common::{Error, NewPrediction, Prediction, Result, Species};

const SELECT_PREDICTIONS: &str = r#"
    SELECT p.id, p.image_name, p.image_url, p.confidence, p.model_version, p.created_at,
           s.id AS species_id, s.name AS species_name, s.common_name AS species_common_name,
           s.description AS species_description, s.active AS species_active
    FROM predictions p
    JOIN species s ON s.id = p.species_id
"#;

fn prediction_from_row(row: &SqliteRow) -> Result<Prediction> {
    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| Error::Internal(format!("Invalid created_at '{}': {}", created_at_str, e)))?
        .with_timezone(&Utc);

    Ok(Prediction {
        id: row.try_get("id")?,
        image_name: row.try_get("image_name")?,
        image_url: row.try_get("image_url")?,
        predicted_species: Species {
            id: row.try_get("species_id")?,
            name: row.try_get("species_name")?,
            common_name: row.try_get("species_common_name")?,
            description: row.try_get("species_description")?,
            active: row.try_get("species_active")?,
        },
        confidence: row.try_get("confidence")?,
        model_version: row.try_get("model_version")?,
        created_at,
    })
}

/// Count and mean confidence, always reported together
///
/// An empty store reports an average of 0.0, which only means "no data"
/// when `total` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionStats {
    pub total: i64,
    pub average_confidence: f64,
}

/// CRUD over prediction records
#[derive(Clone)]
pub struct PredictionRecordStore {
    pool: SqlitePool,
}

impl PredictionRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one prediction row and return it joined with its species
    ///
    /// The confidence range is already guaranteed by `Confidence`; the
    /// species reference is checked by the foreign key.
    pub async fn save(&self, prediction: &NewPrediction) -> Result<Prediction> {
        if prediction.image_name.trim().is_empty() {
            return Err(Error::InvalidInput("Image name is required".to_string()));
        }

        let id = sqlx::query(
            r#"
            INSERT INTO predictions (image_name, image_url, species_id, confidence, model_version, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&prediction.image_name)
        .bind(&prediction.image_url)
        .bind(prediction.species_id)
        .bind(prediction.confidence.value())
        .bind(&prediction.model_version)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Prediction {} vanished after insert", id)))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Prediction>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_PREDICTIONS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(prediction_from_row).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<Prediction>> {
        let rows = sqlx::query(&format!("{} ORDER BY p.id", SELECT_PREDICTIONS))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    pub async fn find_by_species(&self, species_id: i64) -> Result<Vec<Prediction>> {
        let rows = sqlx::query(&format!("{} WHERE p.species_id = ? ORDER BY p.id", SELECT_PREDICTIONS))
            .bind(species_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    pub async fn find_by_model_version(&self, model_version: &str) -> Result<Vec<Prediction>> {
        let rows = sqlx::query(&format!("{} WHERE p.model_version = ? ORDER BY p.id", SELECT_PREDICTIONS))
            .bind(model_version)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    /// Returns false when nothing was deleted
    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM predictions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Arithmetic mean of all stored confidences, 0.0 when the store is empty
    pub async fn average_confidence(&self) -> Result<f64> {
        let average: Option<f64> = sqlx::query_scalar("SELECT AVG(confidence) FROM predictions")
            .fetch_one(&self.pool)
            .await?;
        Ok(average.unwrap_or(0.0))
    }

    pub async fn stats(&self) -> Result<PredictionStats> {
        Ok(PredictionStats {
            total: self.count().await?,
            average_confidence: self.average_confidence().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SpeciesCatalog;
    use wildlife_common::db::init_in_memory_pool;
    use wildlife_common::{Confidence, NewSpecies};

    async fn stores() -> (SpeciesCatalog, PredictionRecordStore) {
        let pool = init_in_memory_pool().await.unwrap();
        (SpeciesCatalog::new(pool.clone()), PredictionRecordStore::new(pool))
    }

    fn prediction(species_id: i64, confidence: f64, model_version: &str) -> NewPrediction {
        NewPrediction {
            image_name: "lion.jpg".to_string(),
            image_url: Some("/uploads/predictions/20240101_120000_lion.jpg".to_string()),
            species_id,
            confidence: Confidence::new(confidence).unwrap(),
            model_version: Some(model_version.to_string()),
        }
    }

    #[tokio::test]
    async fn test_average_confidence_empty_store() {
        let (_, store) = stores().await;
        assert_eq!(store.average_confidence().await.unwrap(), 0.0);
        assert_eq!(
            store.stats().await.unwrap(),
            PredictionStats { total: 0, average_confidence: 0.0 }
        );
    }

    #[tokio::test]
    async fn test_average_confidence() {
        let (catalog, store) = stores().await;
        let lion = catalog.save(&NewSpecies::auto_created("lion")).await.unwrap();

        for confidence in [0.2, 0.4, 0.6] {
            store.save(&prediction(lion.id, confidence, "v1")).await.unwrap();
        }

        let average = store.average_confidence().await.unwrap();
        assert!((average - 0.4).abs() < 1e-9, "average was {}", average);
        assert_eq!(store.stats().await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn test_save_returns_joined_record() {
        let (catalog, store) = stores().await;
        let lion = catalog.save(&NewSpecies::auto_created("lion")).await.unwrap();

        let before = Utc::now();
        let saved = store.save(&prediction(lion.id, 0.95, "v1")).await.unwrap();

        assert_eq!(saved.predicted_species, lion);
        assert_eq!(saved.confidence, 0.95);
        assert_eq!(saved.model_version.as_deref(), Some("v1"));
        assert!(saved.created_at >= before - chrono::Duration::seconds(1));
        assert_eq!(store.find_by_id(saved.id).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_unknown_species_rejected() {
        let (_, store) = stores().await;
        let err = store.save(&prediction(42, 0.5, "v1")).await.unwrap_err();
        assert!(err.is_foreign_key_violation(), "unexpected error: {}", err);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_relation() {
        let (catalog, store) = stores().await;
        let lion = catalog.save(&NewSpecies::auto_created("lion")).await.unwrap();
        let zebra = catalog.save(&NewSpecies::auto_created("zebra")).await.unwrap();

        store.save(&prediction(lion.id, 0.9, "v1")).await.unwrap();
        store.save(&prediction(zebra.id, 0.8, "v1")).await.unwrap();
        store.save(&prediction(lion.id, 0.7, "v2")).await.unwrap();

        assert_eq!(store.find_by_species(lion.id).await.unwrap().len(), 2);
        assert_eq!(store.find_by_species(zebra.id).await.unwrap().len(), 1);
        assert_eq!(store.find_by_model_version("v1").await.unwrap().len(), 2);
        assert!(store.find_by_model_version("v3").await.unwrap().is_empty());
        assert_eq!(store.find_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let (catalog, store) = stores().await;
        let lion = catalog.save(&NewSpecies::auto_created("lion")).await.unwrap();
        let saved = store.save(&prediction(lion.id, 0.9, "v1")).await.unwrap();

        assert!(store.delete_by_id(saved.id).await.unwrap());
        assert!(!store.delete_by_id(saved.id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
        // species outlives its predictions
        assert_eq!(catalog.count().await.unwrap(), 1);
    }
}
