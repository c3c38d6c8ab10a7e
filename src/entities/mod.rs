pub mod customer;
pub mod item;
pub mod order;
pub mod order_item;
pub mod project;
pub mod stock_movement;

pub use customer::Entity as Customer;
pub use item::Entity as Item;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use project::Entity as Project;
pub use stock_movement::Entity as StockMovement;
