use serde::{Deserialize, Serialize};

use crate::catalog::ProductId;
use crate::order::UserId;

pub type CartItemId = i64;

/// CartItem is one cart row. At most one row exists per (user, product, size);
/// "no size" and a concrete size are different rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub size: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub size: Option<String>,
    pub quantity: i32,
}

impl CartItem {
    /// True when this row is the cart line for `product` in `size`.
    pub fn is_line(&self, product: ProductId, size: Option<&str>) -> bool {
        self.product_id == product && self.size.as_deref() == size
    }
}
