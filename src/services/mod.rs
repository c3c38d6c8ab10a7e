//! Domain services behind the HTTP handlers. The checkout orchestrator is
//! the only writer of orders; everything else here is a focused helper it
//! composes, plus read/lifecycle access for existing orders.

pub mod checkout;
pub mod customers;
pub mod order_numbers;
pub mod orders;
pub mod stock_validation;
pub mod totals;

pub use checkout::CheckoutService;
pub use orders::OrderService;
