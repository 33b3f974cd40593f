//! Species catalog

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use wildlife_common::{NewSpecies, Result, Species};

const SELECT_SPECIES: &str =
    "SELECT id, name, common_name, description, active FROM species";

fn species_from_row(row: &SqliteRow) -> Result<Species> {
    Ok(Species {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        common_name: row.try_get("common_name")?,
        description: row.try_get("description")?,
        active: row.try_get("active")?,
    })
}

/// Lookup and insert of species by unique name
#[derive(Clone)]
pub struct SpeciesCatalog {
    pool: SqlitePool,
}

impl SpeciesCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new species
    ///
    /// A duplicate name surfaces as the store's unique-violation error
    /// (see `Error::is_unique_violation`).
    pub async fn save(&self, species: &NewSpecies) -> Result<Species> {
        species.validate()?;

        let id = sqlx::query(
            "INSERT INTO species (name, common_name, description, active) VALUES (?, ?, ?, ?)",
        )
        .bind(&species.name)
        .bind(&species.common_name)
        .bind(&species.description)
        .bind(species.active)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Species {
            id,
            name: species.name.clone(),
            common_name: species.common_name.clone(),
            description: species.description.clone(),
            active: species.active,
        })
    }

    /// Replace every field of an existing species; `None` if the id is unknown
    pub async fn update(&self, id: i64, species: &NewSpecies) -> Result<Option<Species>> {
        species.validate()?;

        let rows = sqlx::query(
            "UPDATE species SET name = ?, common_name = ?, description = ?, active = ? WHERE id = ?",
        )
        .bind(&species.name)
        .bind(&species.common_name)
        .bind(&species.description)
        .bind(species.active)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Species>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_SPECIES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(species_from_row).transpose()
    }

    /// Exact, case-sensitive name match
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Species>> {
        let row = sqlx::query(&format!("{} WHERE name = ?", SELECT_SPECIES))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(species_from_row).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<Species>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_SPECIES))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(species_from_row).collect()
    }

    /// Returns false when nothing was deleted
    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM species WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM species")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildlife_common::db::init_in_memory_pool;

    async fn catalog() -> SpeciesCatalog {
        SpeciesCatalog::new(init_in_memory_pool().await.unwrap())
    }

    fn species(name: &str) -> NewSpecies {
        NewSpecies {
            name: name.to_string(),
            common_name: None,
            description: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let catalog = catalog().await;
        let saved = catalog.save(&species("Panthera leo")).await.unwrap();

        assert_eq!(catalog.find_by_id(saved.id).await.unwrap(), Some(saved.clone()));
        assert_eq!(catalog.find_by_name("Panthera leo").await.unwrap(), Some(saved));
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_name_is_case_sensitive() {
        let catalog = catalog().await;
        catalog.save(&species("lion")).await.unwrap();

        assert!(catalog.find_by_name("Lion").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_unique_violation() {
        let catalog = catalog().await;
        catalog.save(&species("lion")).await.unwrap();

        let err = catalog.save(&species("lion")).await.unwrap_err();
        assert!(err.is_unique_violation(), "unexpected error: {}", err);
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let catalog = catalog().await;
        assert!(catalog.save(&species("  ")).await.is_err());
        assert_eq!(catalog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let catalog = catalog().await;
        let saved = catalog.save(&species("lion")).await.unwrap();

        let mut changed = species("Panthera leo");
        changed.common_name = Some("Lion".to_string());
        changed.active = false;
        let updated = catalog.update(saved.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.name, "Panthera leo");
        assert_eq!(updated.common_name.as_deref(), Some("Lion"));
        assert!(!updated.active);

        assert!(catalog.update(999, &changed).await.unwrap().is_none());

        assert!(catalog.delete_by_id(saved.id).await.unwrap());
        assert!(!catalog.delete_by_id(saved.id).await.unwrap());
        assert!(catalog.find_all().await.unwrap().is_empty());
    }
}
