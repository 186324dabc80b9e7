mod handler;
mod model;

pub use handler::{
    create_discount, create_product, delete_discount, delete_product, get_order, get_telegram,
    list_discounts, list_orders, list_products, set_telegram, stats, update_discount,
    update_order_status, update_product,
};
pub use model::{AdminStats, DailySales};
