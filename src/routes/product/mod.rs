mod handler;
mod model;

pub use handler::{get_product, list_products};
pub use model::{NewProduct, Product, ProductUpdate, ProductView};
