//! Orders, their frozen line items and the status lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ProductId;

pub type UserId = i64;
pub type OrderId = i64;
pub type OrderItemId = i64;

/// OrderStatus is the admin-driven order lifecycle.
///
/// `pending -> dispatched -> delivered` or `pending -> cancelled`.
/// `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Dispatched,
    Delivered,
    Cancelled,
}

/// Rejected status changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusTransitionError {
    #[error("unknown order status '{0}'")]
    Unknown(String),
    #[error("cannot move order from {from} to {to}")]
    Illegal { from: OrderStatus, to: OrderStatus },
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Dispatched)
                | (Self::Pending, Self::Cancelled)
                | (Self::Dispatched, Self::Delivered)
        )
    }

    /// Validates a move to `next` against the lifecycle.
    pub fn transition_to(self, next: OrderStatus) -> Result<OrderStatus, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError::Illegal {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StatusTransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| StatusTransitionError::Unknown(s.to_string()))
    }
}

/// ShippingInfo is the contact and address snapshot taken when the order is placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address_street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl ShippingInfo {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("fullName", &self.full_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("addressStreet", &self.address_street),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// OrderItem is one frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    /// Size-adjusted unit price at order time; never recomputed.
    pub price_at_purchase: Decimal,
    pub selected_size: Option<String>,
}

/// Order header together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    pub payment_mode: String,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub rejection_reason: Option<String>,
    pub shipping_charge: Decimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// Header row written when an order is created. Status always starts as pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub shipping: ShippingInfo,
    pub payment_mode: String,
    pub shipping_charge: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub selected_size: Option<String>,
}

/// One requested line of an order, in canonical shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub selected_size: Option<String>,
}

/// PlaceOrder is the canonical order-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub items: Vec<OrderLine>,
    pub shipping: ShippingInfo,
    pub payment_mode: String,
    pub shipping_charge: Option<Decimal>,
}

/// Admin status change plus the optional fields that travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub rejection_reason: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            tracking_number: None,
            tracking_url: None,
            rejection_reason: None,
        }
    }
}
