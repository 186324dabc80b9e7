mod google;
mod handler;
mod model;

pub use google::{GoogleProfile, verify_google_token};
pub use handler::{google_login, login, me, register, verify_email};
pub use model::User;
