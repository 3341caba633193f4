pub mod health;
pub mod menus;
pub mod metrics;
