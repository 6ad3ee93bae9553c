// Storefront core
pub mod cart;
pub mod checkout;
pub mod reconciler;

// Back office
pub mod admin;

pub use admin::AdminService;
pub use cart::CartService;
pub use checkout::{CheckoutService, CheckoutSettings};
pub use reconciler::{PaymentReconciler, ReconcileOutcome};
