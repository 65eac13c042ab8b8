#![allow(dead_code)]

use model::{
    CategoryId, GstMode, OrderLine, PlaceOrder, PriceModifier, Product, ShippingInfo, SizeVariant,
};
use repository::memory::MemoryStore;
use rust_decimal::Decimal;
use service::{CartServiceImpl, CatalogServiceImpl, OrderServiceImpl};

pub type Orders = OrderServiceImpl<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;
pub type Catalog = CatalogServiceImpl<MemoryStore, MemoryStore, MemoryStore, MemoryStore>;
pub type Cart = CartServiceImpl<MemoryStore, MemoryStore, MemoryStore>;

pub fn orders(store: &MemoryStore) -> Orders {
    OrderServiceImpl::new(store.clone(), store.clone(), store.clone(), store.clone())
}

pub fn catalog(store: &MemoryStore) -> Catalog {
    CatalogServiceImpl::new(store.clone(), store.clone(), store.clone(), store.clone())
}

pub fn cart(store: &MemoryStore) -> Cart {
    CartServiceImpl::new(store.clone(), store.clone(), store.clone())
}

pub fn product(category_id: CategoryId, price: Decimal, gst_rate: Decimal, gst_mode: GstMode) -> Product {
    Product {
        id: 0,
        name: "Kurta".into(),
        category_id,
        subcategory_id: None,
        price,
        mrp: None,
        gst_rate,
        gst_mode,
        legacy_sizes: None,
        variants: Vec::new(),
    }
}

pub fn variant(size: &str, available: bool, modifier: PriceModifier) -> SizeVariant {
    SizeVariant {
        id: 0,
        product_id: 0,
        size: size.into(),
        available,
        display_order: 0,
        modifier,
    }
}

pub fn shipping() -> ShippingInfo {
    ShippingInfo {
        full_name: "Asha Rao".into(),
        email: "asha@example.com".into(),
        phone: "9800000000".into(),
        address_street: "12 MG Road".into(),
        city: "Pune".into(),
        state: "MH".into(),
        zip_code: "411001".into(),
        country: "India".into(),
    }
}

pub fn line(product_id: i64, quantity: i32, size: Option<&str>) -> OrderLine {
    OrderLine {
        product_id,
        quantity,
        selected_size: size.map(Into::into),
    }
}

pub fn place(items: Vec<OrderLine>, shipping_charge: Option<Decimal>) -> PlaceOrder {
    PlaceOrder {
        items,
        shipping: shipping(),
        payment_mode: "cod".into(),
        shipping_charge,
    }
}
