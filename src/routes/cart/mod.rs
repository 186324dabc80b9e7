mod handler;
mod model;

pub use handler::{add_to_cart, get_cart, remove_cart_item, update_cart_item};
pub use model::{CartItem, CartLine, CartRow, LineOptions};
