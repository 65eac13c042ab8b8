//! Domain model of the storefront: catalog, carts and orders.
//!
//! Money and percentages are [`rust_decimal::Decimal`] throughout.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod request;

pub use cart::{CartItem, CartItemId, NewCartItem};
pub use catalog::{
    Category, CategoryId, GstMode, ImageId, PriceModifier, Product, ProductId, ProductImage,
    SizeVariant, SizeVariantId, SpecKey, SpecKeyId, Specification, SpecificationId, Subcategory,
    SubcategoryId,
};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderItemId, OrderLine, OrderStatus,
    PlaceOrder, ShippingInfo, StatusTransitionError, StatusUpdate, UserId,
};
