pub mod audit;
pub mod bulk_updates;
pub mod health;
pub mod modules;
pub mod permissions;
