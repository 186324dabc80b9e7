mod handler;
mod model;

pub use handler::checkout;
pub use model::{Order, OrderDetail, OrderItem, OrderStatus, order_number};
