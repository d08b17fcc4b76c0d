mod database {
    pub mod actions;
    pub mod error;
    pub mod pagination;
    pub mod registry;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod permissions;
}
mod uploads {
    pub mod images;
}
mod config;
mod constants;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use uploads::*;
