use crate::models::IndexFailure;
use crate::storage::CatalogStore;

/// Drop every non-identity index, then recreate `fields` one by one.
///
/// Failures never propagate: each one is logged and returned so the run can
/// report them while still counting as successful.
pub async fn maintain_indexes<S>(store: &S, fields: &[String]) -> Vec<IndexFailure>
where
    S: CatalogStore + ?Sized,
{
    let mut failures = Vec::new();

    tracing::info!("Dropping existing indexes");
    if let Err(e) = store.drop_indexes().await {
        tracing::warn!(error = %e, "Failed to drop existing indexes; recreating on top of them");
        failures.push(IndexFailure { field: "*".to_string(), message: e.to_string() });
    }

    for field in fields {
        match store.create_index(field).await {
            Ok(()) => tracing::info!(field = %field, "Created index"),
            Err(e) => {
                tracing::warn!(field = %field, error = %e, "Failed to create index");
                failures.push(IndexFailure { field: field.clone(), message: e.to_string() });
            }
        }
    }

    tracing::info!(requested = fields.len(), failed = failures.len(), "Index maintenance completed");
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryCatalogStore, StoreCall};

    #[tokio::test]
    async fn one_failing_index_does_not_block_the_rest() {
        let store = InMemoryCatalogStore::new();
        store.fail_index("sku");
        let fields: Vec<String> = ["title", "sku", "deleted"].into_iter().map(String::from).collect();

        let failures = maintain_indexes(&store, &fields).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "sku");
        assert_eq!(store.indexes(), vec!["deleted".to_string(), "title".to_string()]);
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::DropIndexes,
                StoreCall::CreateIndex("title".into()),
                StoreCall::CreateIndex("sku".into()),
                StoreCall::CreateIndex("deleted".into()),
            ]
        );
    }
}
