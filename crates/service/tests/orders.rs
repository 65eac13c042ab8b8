mod common;

use common::{catalog, line, orders, place, product, variant};
use model::{GstMode, OrderStatus, PriceModifier, StatusTransitionError, StatusUpdate};
use repository::memory::{Fault, MemoryStore};
use rust_decimal_macros::dec;
use service::{CatalogService, Caller, OrderService, ServiceError};

#[tokio::test]
async fn test_exclusive_gst_order_totals() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(1000), dec!(18), GstMode::Exclusive));

    let service = orders(&store);
    let id = service
        .create_order(7, place(vec![line(p.id, 1, None)], Some(dec!(50))))
        .await
        .unwrap();

    let order = service.get_order(Caller::user(7), id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].item.price_at_purchase, dec!(1000));
    assert_eq!(order.items[0].pricing.before_tax, dec!(1000.00));
    assert_eq!(order.items[0].pricing.tax_amount, dec!(180.00));
    assert_eq!(order.items[0].pricing.final_price, dec!(1180.00));
    assert_eq!(order.totals.subtotal_before_gst, dec!(1000));
    assert_eq!(order.totals.total_gst, dec!(180));
    assert_eq!(order.totals.shipping_charge, dec!(50));
    assert_eq!(order.totals.grand_total, dec!(1230));
}

#[tokio::test]
async fn test_percentage_variant_freezes_adjusted_price() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let mut kurta = product(category, dec!(500), dec!(12), GstMode::Exclusive);
    kurta.variants = vec![
        variant("M", true, PriceModifier::None),
        variant(
            "XL",
            true,
            PriceModifier::Percentage {
                value: Some(dec!(110)),
            },
        ),
    ];
    let p = store.insert_product(kurta);

    let service = orders(&store);
    let id = service
        .create_order(7, place(vec![line(p.id, 2, Some("xl"))], None))
        .await
        .unwrap();

    let order = service.get_order(Caller::user(7), id).await.unwrap();
    let item = &order.items[0];
    assert_eq!(item.item.price_at_purchase, dec!(550.00));
    assert_eq!(item.item.selected_size.as_deref(), Some("XL"));
    assert_eq!(item.pricing.final_price, dec!(616.00));
    assert_eq!(order.totals.subtotal_before_gst, dec!(1100));
    assert_eq!(order.totals.total_gst, dec!(132));
    assert_eq!(order.totals.grand_total, dec!(1232));
}

#[tokio::test]
async fn test_unknown_product_writes_nothing() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));

    let err = orders(&store)
        .create_order(7, place(vec![line(p.id, 1, None), line(9999, 1, None)], None))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::ProductNotFound(ref ids) if ids == &[9999]));
    let tables = store.snapshot();
    assert!(tables.orders.is_empty());
    assert!(tables.order_items.is_empty());
}

#[tokio::test]
async fn test_item_insert_failure_rolls_back_header() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let a = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));
    let b = store.insert_product(product(category, dec!(200), dec!(5), GstMode::Inclusive));
    store.fail(Fault::on("insert_order_items"));

    let err = orders(&store)
        .create_order(7, place(vec![line(a.id, 1, None), line(b.id, 3, None)], None))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Persistence(_)));
    let tables = store.snapshot();
    assert!(tables.orders.is_empty(), "orphan order header left behind");
    assert!(tables.order_items.is_empty());

    store.clear_faults();
    let id = orders(&store)
        .create_order(7, place(vec![line(a.id, 1, None), line(b.id, 3, None)], None))
        .await
        .unwrap();
    assert_eq!(store.snapshot().orders.len(), 1);
    assert!(store.snapshot().orders.contains_key(&id));
}

#[tokio::test]
async fn test_failed_commit_leaves_no_order() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));
    store.fail(Fault::on("commit"));

    let err = orders(&store)
        .create_order(7, place(vec![line(p.id, 1, None)], None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Persistence(_)));
    assert!(store.snapshot().orders.is_empty());
}

#[tokio::test]
async fn test_invalid_request_never_opens_a_transaction() {
    let store = MemoryStore::new();
    store.fail(Fault::on("begin"));

    let mut order = place(vec![line(1, 0, None)], None);
    order.payment_mode = String::new();
    let err = orders(&store).create_order(7, order).await.unwrap_err();

    let ServiceError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, ["paymentMode", "items[0].quantity"]);
}

#[tokio::test]
async fn test_status_lifecycle() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));
    let service = orders(&store);
    let admin = Caller::admin(1);
    let id = service
        .create_order(7, place(vec![line(p.id, 1, None)], None))
        .await
        .unwrap();

    let same = service
        .update_status(admin, id, StatusUpdate::to(OrderStatus::Pending))
        .await
        .unwrap_err();
    assert!(matches!(
        same,
        ServiceError::StatusTransition(StatusTransitionError::Illegal { .. })
    ));

    let dispatched = service
        .update_status(
            admin,
            id,
            StatusUpdate {
                tracking_number: Some("AWB123".into()),
                tracking_url: Some("https://track.example/AWB123".into()),
                rejection_reason: Some("ignored".into()),
                ..StatusUpdate::to(OrderStatus::Dispatched)
            },
        )
        .await
        .unwrap();
    assert_eq!(dispatched.status, OrderStatus::Dispatched);
    assert_eq!(dispatched.tracking_number.as_deref(), Some("AWB123"));
    assert_eq!(dispatched.rejection_reason, None);

    let delivered = service
        .update_status(admin, id, StatusUpdate::to(OrderStatus::Delivered))
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.tracking_number.as_deref(), Some("AWB123"));

    let err = service
        .update_status(admin, id, StatusUpdate::to(OrderStatus::Cancelled))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::StatusTransition(StatusTransitionError::Illegal {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        })
    ));
    assert_eq!(store.snapshot().orders[&id].status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_cancellation_stores_reason() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));
    let service = orders(&store);
    let id = service
        .create_order(7, place(vec![line(p.id, 1, None)], None))
        .await
        .unwrap();

    let cancelled = service
        .update_status(
            Caller::admin(1),
            id,
            StatusUpdate {
                rejection_reason: Some("out of stock".into()),
                ..StatusUpdate::to(OrderStatus::Cancelled)
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.rejection_reason.as_deref(), Some("out of stock"));
}

#[tokio::test]
async fn test_status_of_missing_order_is_not_found() {
    let store = MemoryStore::new();
    let err = orders(&store)
        .update_status(Caller::admin(1), 404, StatusUpdate::to(OrderStatus::Dispatched))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}

#[tokio::test]
async fn test_access_control() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));
    let service = orders(&store);
    let id = service
        .create_order(7, place(vec![line(p.id, 1, None)], None))
        .await
        .unwrap();

    let stranger = Caller::user(8);
    assert!(matches!(
        service.get_order(stranger, id).await,
        Err(ServiceError::Forbidden(8))
    ));
    assert!(matches!(
        service.delete_order(stranger, id).await,
        Err(ServiceError::Forbidden(8))
    ));
    assert!(matches!(
        service.list_all_orders(Caller::user(7)).await,
        Err(ServiceError::Forbidden(7))
    ));
    assert!(matches!(
        service
            .update_status(Caller::user(7), id, StatusUpdate::to(OrderStatus::Cancelled))
            .await,
        Err(ServiceError::Forbidden(7))
    ));

    assert_eq!(service.get_order(Caller::admin(1), id).await.unwrap().id, id);
    assert_eq!(service.list_all_orders(Caller::admin(1)).await.unwrap().len(), 1);
    assert!(service.list_user_orders(8).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_is_newest_first_and_delete_cascades() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(100), dec!(5), GstMode::Exclusive));
    let service = orders(&store);
    let first = service
        .create_order(7, place(vec![line(p.id, 1, None)], None))
        .await
        .unwrap();
    let second = service
        .create_order(7, place(vec![line(p.id, 2, None)], None))
        .await
        .unwrap();

    let history: Vec<_> = service
        .list_user_orders(7)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(history, [second, first]);

    service.delete_order(Caller::user(7), first).await.unwrap();
    let tables = store.snapshot();
    assert!(!tables.orders.contains_key(&first));
    assert!(tables.order_items.values().all(|i| i.order_id != first));
    assert!(matches!(
        service.delete_order(Caller::user(7), first).await,
        Err(ServiceError::NotFound)
    ));
}

#[tokio::test]
async fn test_order_lines_survive_product_deletion() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(1000), dec!(18), GstMode::Exclusive));
    let service = orders(&store);
    let id = service
        .create_order(7, place(vec![line(p.id, 1, None)], None))
        .await
        .unwrap();

    let before = service.get_order(Caller::user(7), id).await.unwrap();
    assert_eq!(before.items[0].product_name.as_deref(), Some("Kurta"));
    assert_eq!(before.totals.total_gst, dec!(180));

    catalog(&store).delete_product(p.id).await.unwrap();

    let after = service.get_order(Caller::user(7), id).await.unwrap();
    assert_eq!(after.items[0].item.price_at_purchase, dec!(1000));
    assert_eq!(after.items[0].product_name, None);
    assert_eq!(after.items[0].gst_rate, dec!(0));
    assert_eq!(after.totals.grand_total, dec!(1000));
}

#[tokio::test]
async fn test_order_view_follows_current_gst() {
    let store = MemoryStore::new();
    let category = store.insert_category("Apparel");
    let p = store.insert_product(product(category, dec!(1000), dec!(18), GstMode::Exclusive));
    let service = orders(&store);
    let id = service
        .create_order(7, place(vec![line(p.id, 1, None)], None))
        .await
        .unwrap();

    assert!(store.update_product(p.id, |p| {
        p.price = dec!(2000);
        p.gst_rate = dec!(5);
    }));
    let view = service.get_order(Caller::user(7), id).await.unwrap();
    assert_eq!(view.items[0].item.price_at_purchase, dec!(1000));
    assert_eq!(view.items[0].gst_rate, dec!(5));
    assert_eq!(view.totals.subtotal_before_gst, dec!(1000));
    assert_eq!(view.totals.total_gst, dec!(50));
    assert_eq!(view.totals.grand_total, dec!(1050));

    assert!(store.update_product(p.id, |p| {
        p.gst_rate = dec!(18);
        p.gst_mode = GstMode::Inclusive;
    }));
    let view = service.get_order(Caller::user(7), id).await.unwrap();
    assert_eq!(view.items[0].item.price_at_purchase, dec!(1000));
    assert_eq!(view.items[0].gst_mode, GstMode::Inclusive);
    assert_eq!(view.items[0].pricing.final_price, dec!(1000));
    assert_eq!(view.totals.subtotal_before_gst, dec!(847.46));
    assert_eq!(view.totals.total_gst, dec!(152.54));
    assert_eq!(view.totals.grand_total, dec!(1000));
}
