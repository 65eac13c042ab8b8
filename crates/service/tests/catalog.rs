mod common;

use common::{cart, catalog, product, variant};
use model::{CategoryId, GstMode, PriceModifier, SubcategoryId};
use repository::memory::{Fault, MemoryStore, Tables};
use rust_decimal_macros::dec;
use service::{CartService, CatalogService, ServiceError};

/// A category with two subcategories of three products each. Every product
/// has an image and a specification keyed by its subcategory's spec key.
fn seed_tree(store: &MemoryStore) -> (CategoryId, Vec<SubcategoryId>) {
    let category = store.insert_category("Apparel");
    store.insert_spec_key("Fabric", Some(category), None);

    let mut subcategories = Vec::new();
    for name in ["Sarees", "Kurtas"] {
        let sub = store.insert_subcategory(category, name);
        let key = store.insert_spec_key("Length", None, Some(sub));
        for _ in 0..3 {
            let mut p = product(category, dec!(999), dec!(5), GstMode::Inclusive);
            p.subcategory_id = Some(sub);
            p.variants = vec![variant("Free", true, PriceModifier::None)];
            let p = store.insert_product(p);
            store.insert_image(p.id, "https://cdn.example/p.jpg");
            store.insert_specification(p.id, Some(key), "5.5m");
        }
        subcategories.push(sub);
    }
    (category, subcategories)
}

fn row_count(t: &Tables) -> usize {
    t.categories.len()
        + t.subcategories.len()
        + t.spec_keys.len()
        + t.products.len()
        + t.size_variants.len()
        + t.images.len()
        + t.specifications.len()
        + t.cart_items.len()
}

#[tokio::test]
async fn test_delete_category_removes_whole_subtree() {
    let store = MemoryStore::new();
    let (category, _) = seed_tree(&store);
    let other = store.insert_category("Footwear");
    let keep = store.insert_product(product(other, dec!(1500), dec!(12), GstMode::Exclusive));

    let report = catalog(&store).delete_category(category).await.unwrap();

    assert_eq!(report.categories, 1);
    assert_eq!(report.subcategories, 2);
    assert_eq!(report.products, 6);
    assert_eq!(report.images, 6);
    assert_eq!(report.specifications, 6);
    assert_eq!(report.size_variants, 6);
    assert_eq!(report.spec_keys, 3);

    let tables = store.snapshot();
    assert!(tables.subcategories.is_empty());
    assert!(tables.images.is_empty());
    assert!(tables.specifications.is_empty());
    assert!(tables.spec_keys.is_empty());
    assert_eq!(tables.categories.keys().copied().collect::<Vec<_>>(), [other]);
    assert_eq!(tables.products.keys().copied().collect::<Vec<_>>(), [keep.id]);
}

#[tokio::test]
async fn test_failure_on_last_subcategory_keeps_every_row() {
    let store = MemoryStore::new();
    let (category, subcategories) = seed_tree(&store);
    let before = store.snapshot();
    store.fail(Fault::on("delete_subcategory").for_id(subcategories[1]));

    let err = catalog(&store).delete_category(category).await.unwrap_err();

    assert!(matches!(err, ServiceError::Persistence(_)));
    let after = store.snapshot();
    assert_eq!(row_count(&after), row_count(&before));
    assert!(after.subcategories.contains_key(&subcategories[0]));
    assert_eq!(after.products.len(), 6);
    assert_eq!(after.images.len(), 6);
}

#[tokio::test]
async fn test_delete_category_includes_products_without_subcategory() {
    let store = MemoryStore::new();
    let category = store.insert_category("Home");
    let direct = store.insert_product(product(category, dec!(250), dec!(12), GstMode::Exclusive));
    store.insert_image(direct.id, "https://cdn.example/lamp.jpg");
    let sub = store.insert_subcategory(category, "Cushions");
    let mut nested = product(category, dec!(300), dec!(12), GstMode::Exclusive);
    nested.subcategory_id = Some(sub);
    store.insert_product(nested);

    store.fail(Fault::on("delete_product").for_id(direct.id));
    let err = catalog(&store).delete_category(category).await.unwrap_err();
    assert!(matches!(err, ServiceError::Persistence(_)));
    let tables = store.snapshot();
    assert_eq!(tables.products.len(), 2);
    assert!(tables.subcategories.contains_key(&sub));
    assert_eq!(tables.images.len(), 1);

    store.clear_faults();
    let report = catalog(&store).delete_category(category).await.unwrap();
    assert_eq!(report.products, 2);
    assert_eq!(report.images, 1);
    assert_eq!(report.subcategories, 1);
    assert_eq!(report.categories, 1);
    assert_eq!(row_count(&store.snapshot()), 0);
}

#[tokio::test]
async fn test_delete_subcategory_leaves_siblings() {
    let store = MemoryStore::new();
    let (_, subcategories) = seed_tree(&store);

    let report = catalog(&store)
        .delete_subcategory(subcategories[0])
        .await
        .unwrap();
    assert_eq!(report.products, 3);
    assert_eq!(report.spec_keys, 1);

    let tables = store.snapshot();
    assert_eq!(
        tables.subcategories.keys().copied().collect::<Vec<_>>(),
        [subcategories[1]]
    );
    assert_eq!(tables.products.len(), 3);
    assert!(tables
        .products
        .values()
        .all(|p| p.subcategory_id == Some(subcategories[1])));
}

#[tokio::test]
async fn test_delete_product_clears_cart_rows() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));
    store.insert_image(p.id, "https://cdn.example/a.jpg");
    cart(&store).add_item(3, p.id, None, 2).await.unwrap();
    cart(&store).add_item(4, p.id, None, 1).await.unwrap();

    let report = catalog(&store).delete_product(p.id).await.unwrap();
    assert_eq!(report.products, 1);
    assert_eq!(report.images, 1);
    assert_eq!(report.cart_items, 2);
    assert!(store.snapshot().cart_items.is_empty());
}

#[tokio::test]
async fn test_deleting_missing_rows_is_not_found() {
    let store = MemoryStore::new();
    let service = catalog(&store);
    assert!(matches!(service.delete_product(42).await, Err(ServiceError::NotFound)));
    assert!(matches!(service.delete_subcategory(42).await, Err(ServiceError::NotFound)));
    assert!(matches!(service.delete_category(42).await, Err(ServiceError::NotFound)));
}

#[tokio::test]
async fn test_quote_gst_examples() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let exclusive = store.insert_product(product(category, dec!(1000), dec!(18), GstMode::Exclusive));
    let inclusive = store.insert_product(product(category, dec!(1000), dec!(18), GstMode::Inclusive));
    let service = catalog(&store);

    let quote = service.quote_product(exclusive.id, None).await.unwrap();
    assert_eq!(quote.before_tax, dec!(1000.00));
    assert_eq!(quote.tax_amount, dec!(180.00));
    assert_eq!(quote.final_price, dec!(1180.00));

    let quote = service.quote_product(inclusive.id, None).await.unwrap();
    assert_eq!(quote.before_tax, dec!(847.46));
    assert_eq!(quote.tax_amount, dec!(152.54));
    assert_eq!(quote.final_price, dec!(1000.00));
}

#[tokio::test]
async fn test_quote_with_size_and_discount() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let mut p = product(category, dec!(500), dec!(12), GstMode::Exclusive);
    p.mrp = Some(dec!(800));
    p.variants = vec![
        variant("M", true, PriceModifier::None),
        variant(
            "XL",
            true,
            PriceModifier::Percentage {
                value: Some(dec!(110)),
            },
        ),
        variant("XXL", false, PriceModifier::None),
    ];
    let p = store.insert_product(p);
    let service = catalog(&store);

    let quote = service.quote_product(p.id, Some("XL".into())).await.unwrap();
    assert_eq!(quote.price, dec!(550.00));
    assert_eq!(quote.mrp, Some(dec!(880.00)));
    assert_eq!(quote.final_price, dec!(616.00));
    assert_eq!(quote.discount_percent, 30);

    assert!(matches!(
        service.quote_product(p.id, Some("XXL".into())).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        service.quote_product(9999, None).await,
        Err(ServiceError::ProductNotFound(ids)) if ids == [9999]
    ));
}
