//! Predicted label → catalog species
//!
//! Matching is exact and case-sensitive: "Lion" and "lion" are different
//! catalog entries.

use thiserror::Error;
use wildlife_common::{NewSpecies, Species};

use crate::db::SpeciesCatalog;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Species '{0}' not found in database. Auto-create is disabled. Please add this species manually.")]
    UnknownSpecies(String),

    #[error(transparent)]
    Store(#[from] wildlife_common::Error),
}

/// Resolves labels against the catalog, inserting unseen ones when allowed
#[derive(Clone)]
pub struct SpeciesResolver {
    catalog: SpeciesCatalog,
    auto_create: bool,
}

impl SpeciesResolver {
    pub fn new(catalog: SpeciesCatalog, auto_create: bool) -> Self {
        Self { catalog, auto_create }
    }

    pub fn auto_create(&self) -> bool {
        self.auto_create
    }

    pub async fn resolve(&self, label: &str) -> Result<Species, ResolveError> {
        if let Some(species) = self.catalog.find_by_name(label).await? {
            return Ok(species);
        }

        if !self.auto_create {
            return Err(ResolveError::UnknownSpecies(label.to_string()));
        }

        match self.catalog.save(&NewSpecies::auto_created(label)).await {
            Ok(species) => {
                tracing::info!(species = %species.name, id = species.id, "Auto-created new species");
                Ok(species)
            }
            Err(e) if e.is_unique_violation() => {
                // A concurrent request inserted the same label between our
                // lookup and our insert; the unique constraint picked its row.
                tracing::debug!(species = %label, "Lost auto-create race, re-reading species");
                self.catalog
                    .find_by_name(label)
                    .await?
                    .ok_or_else(|| ResolveError::Store(e))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildlife_common::db::init_in_memory_pool;
    use wildlife_common::models::AUTO_CREATED_DESCRIPTION;

    async fn catalog() -> SpeciesCatalog {
        SpeciesCatalog::new(init_in_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_existing_species_returned_unchanged() {
        let catalog = catalog().await;
        let existing = catalog
            .save(&NewSpecies {
                name: "lion".to_string(),
                common_name: Some("African lion".to_string()),
                description: None,
                active: false,
            })
            .await
            .unwrap();

        let resolver = SpeciesResolver::new(catalog.clone(), true);
        assert_eq!(resolver.resolve("lion").await.unwrap(), existing);
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_auto_create() {
        let catalog = catalog().await;
        let resolver = SpeciesResolver::new(catalog.clone(), true);

        let created = resolver.resolve("lion").await.unwrap();
        assert_eq!(created.name, "lion");
        assert_eq!(created.common_name.as_deref(), Some("lion"));
        assert_eq!(created.description.as_deref(), Some(AUTO_CREATED_DESCRIPTION));
        assert!(created.active);

        // Second resolution finds the row instead of inserting again
        assert_eq!(resolver.resolve("lion").await.unwrap(), created);
        assert_eq!(catalog.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_species_when_auto_create_disabled() {
        let catalog = catalog().await;
        let resolver = SpeciesResolver::new(catalog.clone(), false);

        match resolver.resolve("lion").await {
            Err(ResolveError::UnknownSpecies(label)) => assert_eq!(label, "lion"),
            other => panic!("expected UnknownSpecies, got {:?}", other),
        }
        assert_eq!(catalog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_case_sensitive_labels_are_distinct() {
        let catalog = catalog().await;
        let resolver = SpeciesResolver::new(catalog.clone(), true);

        let lower = resolver.resolve("lion").await.unwrap();
        let upper = resolver.resolve("Lion").await.unwrap();
        assert_ne!(lower.id, upper.id);
        assert_eq!(catalog.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_auto_create_yields_one_row() {
        let catalog = catalog().await;
        let resolver = SpeciesResolver::new(catalog.clone(), true);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve("okapi").await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(catalog.count().await.unwrap(), 1);
    }
}
