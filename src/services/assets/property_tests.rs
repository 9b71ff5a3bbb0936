//! Property-based tests for the primary-image invariant.
//!
//! Random sequences of uploads, deletions and primary reassignments run
//! against an [`AssetManager`] over the in-memory backend and an in-memory
//! catalog holding two products.
//!
//! # Tested Invariants
//!
//! - A product with at least one image has exactly one primary image
//! - A product with no images has none
//! - Operations on one product never change the other product's images
//! - Backend failures during image deletion do not break the invariant
//!
//! # Running Tests
//!
//! ```bash
//! cargo test assets::property_tests
//! ```

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use bytes::Bytes;
    use proptest::prelude::*;

    use crate::services::assets::{AssetManager, UploadedFile};
    use crate::services::catalog::test_support::catalog_with_product;
    use crate::services::catalog::{CatalogStore, ProductInput};
    use crate::services::storage::{InjectedFailure, MemoryImageStore};

    // ============================================================================
    // Test Strategies - Input Generation
    // ============================================================================

    #[derive(Debug, Clone)]
    enum Op {
        Upload { product: usize },
        SetPrimary { product: usize, pick: usize },
        Delete { product: usize, pick: usize, backend: Option<InjectedFailure> },
    }

    fn failure_strategy() -> impl Strategy<Value = Option<InjectedFailure>> {
        prop_oneof![
            4 => Just(None),
            1 => Just(Some(InjectedFailure::NotFound)),
            1 => Just(Some(InjectedFailure::Unavailable)),
        ]
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0usize..2).prop_map(|product| Op::Upload { product }),
            2 => (0usize..2, any::<usize>())
                .prop_map(|(product, pick)| Op::SetPrimary { product, pick }),
            2 => (0usize..2, any::<usize>(), failure_strategy())
                .prop_map(|(product, pick, backend)| Op::Delete { product, pick, backend }),
        ]
    }

    fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(op_strategy(), 1..40)
    }

    // ============================================================================
    // Harness
    // ============================================================================

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn two_products() -> (AssetManager, Arc<MemoryImageStore>, CatalogStore, [String; 2]) {
        let (catalog, first) = catalog_with_product().await;
        let second = catalog
            .create_product(ProductInput {
                name: "Oak Table".to_string(),
                slug: "oak-table".to_string(),
                description: String::new(),
                price_cents: 49_900,
                stock: 1,
                status: None,
                category: "furniture".to_string(),
            })
            .await
            .unwrap()
            .id;
        let store = Arc::new(MemoryImageStore::new());
        let manager = AssetManager::new(store.clone(), catalog.clone());
        (manager, store, catalog, [first, second])
    }

    fn png(n: usize) -> UploadedFile {
        UploadedFile {
            file_name: format!("{n}.png"),
            content_type: "image/png".to_string(),
            bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        }
    }

    /// Checks every product against the expected image ids.
    async fn check_invariant(
        catalog: &CatalogStore,
        products: &[String; 2],
        expected: &HashMap<usize, Vec<String>>,
    ) -> Result<(), TestCaseError> {
        for (index, product) in products.iter().enumerate() {
            let images = catalog.images_for_product(product).await.unwrap();

            let mut ids: Vec<String> = images.iter().map(|i| i.id.clone()).collect();
            ids.sort();
            let mut want = expected.get(&index).cloned().unwrap_or_default();
            want.sort();
            prop_assert_eq!(ids, want);

            let primaries = images.iter().filter(|i| i.is_primary).count();
            if images.is_empty() {
                prop_assert_eq!(primaries, 0);
            } else {
                prop_assert_eq!(primaries, 1, "product {} has {} primaries", index, primaries);
            }
        }
        Ok(())
    }

    // ============================================================================
    // Primary Image Invariants
    // ============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Invariant: exactly one primary per non-empty product after every step.
        #[test]
        fn exactly_one_primary_after_any_sequence(ops in ops_strategy()) {
            runtime().block_on(async {
                let (manager, store, catalog, products) = two_products().await;
                let mut expected: HashMap<usize, Vec<String>> = HashMap::new();

                for (step, op) in ops.into_iter().enumerate() {
                    match op {
                        Op::Upload { product } => {
                            let had_images = expected.get(&product).is_some_and(|v| !v.is_empty());
                            let image = manager.upload(&products[product], png(step)).await.unwrap();
                            prop_assert_eq!(image.is_primary, !had_images);
                            expected.entry(product).or_default().push(image.id);
                        },
                        Op::SetPrimary { product, pick } => {
                            let Some(ids) = expected.get(&product).filter(|v| !v.is_empty()) else {
                                continue;
                            };
                            let target = ids[pick % ids.len()].clone();
                            let image = manager.set_primary(&target, &products[product]).await.unwrap();
                            prop_assert!(image.is_primary);

                            // Another product's image is never accepted.
                            let other = &products[1 - product];
                            prop_assert!(manager.set_primary(&target, other).await.is_err());
                        },
                        Op::Delete { product, pick, backend } => {
                            let Some(ids) = expected.get_mut(&product).filter(|v| !v.is_empty()) else {
                                continue;
                            };
                            let target = ids.remove(pick % ids.len());
                            let image = catalog
                                .find_image(&target, &products[product])
                                .await
                                .unwrap()
                                .unwrap();
                            if let Some(failure) = backend {
                                store.fail_removal_of(&image.storage_path, failure);
                            }

                            let deletion = manager.delete_image(&target, &products[product]).await.unwrap();
                            prop_assert_eq!(&deletion.deleted.id, &target);
                            let remaining = ids.len();
                            if image.is_primary && remaining > 0 {
                                prop_assert!(deletion.promoted.is_some());
                            } else {
                                prop_assert!(deletion.promoted.is_none());
                            }
                        },
                    }

                    check_invariant(&catalog, &products, &expected).await?;
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
