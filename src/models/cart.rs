use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::order::MAX_LINE_QUANTITY;

/// One product entry; quantity is always at least 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    /// Price captured when the product was added.
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// A shopping cart holding at most one line per product id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(lines: Vec<CartLine>) -> Self {
        let mut cart = Cart::default();
        for line in lines {
            cart.add(line);
        }
        cart
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.line(product_id).map(|l| l.quantity).unwrap_or(0)
    }

    /// Sums into an existing line or appends. Zero-quantity lines are dropped.
    pub fn add(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }
        match self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .saturating_add(line.quantity)
                    .min(MAX_LINE_QUANTITY);
            }
            None => self.lines.push(CartLine {
                quantity: line.quantity.min(MAX_LINE_QUANTITY),
                ..line
            }),
        }
    }

    /// Returns whether a line was removed.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    /// Quantities below 1 are rejected; returns whether anything changed.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        if quantity < 1 {
            return false;
        }
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity.min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    /// Folds `local` into `self`, which acts as the authoritative base.
    /// Shared products sum their quantities; local-only products are appended.
    pub fn merge_from(&mut self, local: Cart) {
        for line in local.lines {
            self.add(line);
        }
    }

    /// `None` if the total does not fit in a `Decimal`.
    pub fn total(&self) -> Option<Decimal> {
        self.lines.iter().try_fold(Decimal::ZERO, |acc, l| {
            acc.checked_add(l.unit_price.checked_mul(Decimal::from(l.quantity))?)
        })
    }
}

/// Whose cart this is: a pre-auth device or a signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CartOwner {
    Device(String),
    User(String),
}

impl CartOwner {
    pub fn is_user(&self) -> bool {
        matches!(self, CartOwner::User(_))
    }

    pub fn id(&self) -> &str {
        match self {
            CartOwner::Device(id) | CartOwner::User(id) => id,
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartOwner::Device(id) => write!(f, "device:{}", id),
            CartOwner::User(id) => write!(f, "user:{}", id),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cart owner must look like device:<id> or user:<id>, got {0:?}")]
pub struct InvalidCartOwner(pub String);

impl FromStr for CartOwner {
    type Err = InvalidCartOwner;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| InvalidCartOwner(s.to_string()))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(InvalidCartOwner(s.to_string()));
        }
        match kind {
            "device" => Ok(CartOwner::Device(id.to_string())),
            "user" => Ok(CartOwner::User(id.to_string())),
            _ => Err(InvalidCartOwner(s.to_string())),
        }
    }
}
