pub mod cart;
pub mod order;
pub mod product;

pub use cart::{Cart, CartLine, CartOwner};
pub use order::{
    is_valid_unit_price, snapshot_total, FulfillmentStatus, NewOrder, OrderChanges, OrderItem,
    OrderOrigin, OrderRecord, OrderStatus, UpdateOutcome, GUEST_USER, MAX_LINE_QUANTITY,
    MAX_UNIT_PRICE,
};
pub use product::{discounted_price, is_valid_discount, PriceChange, Product};
