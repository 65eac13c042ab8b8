//! Request bodies as clients send them.
//!
//! Clients spell the same field several ways (`productId`, `product_id`, ...)
//! and send ids as numbers or strings. Everything is normalized here into the
//! canonical types in [`crate::order`]; nothing past this module sees aliases.

use std::fmt::Display;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::catalog::ProductId;
use crate::order::{OrderLine, OrderStatus, PlaceOrder, ShippingInfo, StatusTransitionError, StatusUpdate};

/// Accepts either a JSON number or a string holding one.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    Text(String),
}

fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    use serde::de::Error;
    match NumberOrString::<T>::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid number '{s}': {e}"))),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Blank size labels mean "no size".
pub fn normalize_size(size: Option<String>) -> Option<String> {
    blank_to_none(size)
}

/// One line of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineBody {
    #[serde(alias = "product_id", alias = "productID", deserialize_with = "number_or_string")]
    pub product_id: ProductId,
    #[serde(default, alias = "qty", deserialize_with = "number_or_string")]
    pub quantity: i32,
    #[serde(default, alias = "selected_size", alias = "size")]
    pub selected_size: Option<String>,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderBody {
    pub items: Vec<OrderLineBody>,
    #[serde(alias = "payment_mode", alias = "paymentMethod")]
    pub payment_mode: String,
    #[serde(alias = "full_name", alias = "name")]
    pub full_name: String,
    pub email: String,
    pub phone: String,
    #[serde(alias = "address_street", alias = "address", alias = "street")]
    pub address_street: String,
    pub city: String,
    pub state: String,
    #[serde(alias = "zip_code", alias = "zip", alias = "pincode", alias = "postalCode")]
    pub zip_code: String,
    pub country: String,
    #[serde(alias = "shipping_charge")]
    pub shipping_charge: Option<Decimal>,
}

impl From<CreateOrderBody> for PlaceOrder {
    fn from(body: CreateOrderBody) -> Self {
        PlaceOrder {
            items: body
                .items
                .into_iter()
                .map(|line| OrderLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    selected_size: normalize_size(line.selected_size),
                })
                .collect(),
            shipping: ShippingInfo {
                full_name: body.full_name.trim().to_string(),
                email: body.email.trim().to_string(),
                phone: body.phone.trim().to_string(),
                address_street: body.address_street.trim().to_string(),
                city: body.city.trim().to_string(),
                state: body.state.trim().to_string(),
                zip_code: body.zip_code.trim().to_string(),
                country: body.country.trim().to_string(),
            },
            payment_mode: body.payment_mode.trim().to_string(),
            shipping_charge: body.shipping_charge,
        }
    }
}

/// Body of `PATCH /api/admin/orders/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateBody {
    pub status: String,
    #[serde(default, alias = "tracking_number", alias = "trackingId")]
    pub tracking_number: Option<String>,
    #[serde(default, alias = "tracking_url", alias = "trackingLink")]
    pub tracking_url: Option<String>,
    #[serde(default, alias = "rejection_reason", alias = "reason")]
    pub rejection_reason: Option<String>,
}

impl TryFrom<StatusUpdateBody> for StatusUpdate {
    type Error = StatusTransitionError;

    fn try_from(body: StatusUpdateBody) -> Result<Self, Self::Error> {
        Ok(StatusUpdate {
            status: body.status.parse::<OrderStatus>()?,
            tracking_number: blank_to_none(body.tracking_number),
            tracking_url: blank_to_none(body.tracking_url),
            rejection_reason: blank_to_none(body.rejection_reason),
        })
    }
}

/// Body of `POST /api/cart`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartBody {
    #[serde(alias = "product_id", alias = "productID", deserialize_with = "number_or_string")]
    pub product_id: ProductId,
    #[serde(default, alias = "selected_size", alias = "size")]
    pub selected_size: Option<String>,
    #[serde(default = "one", alias = "qty", deserialize_with = "number_or_string")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

/// Body of `PATCH /api/cart/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartBody {
    #[serde(alias = "qty", deserialize_with = "number_or_string")]
    pub quantity: i32,
}
