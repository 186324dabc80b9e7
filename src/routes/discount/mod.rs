mod handler;
mod model;

pub use handler::validate_discount;
pub use model::{Discount, DiscountPayload, DiscountRejection, compute_discount};
