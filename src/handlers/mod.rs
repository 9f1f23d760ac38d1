pub mod health;
pub mod signals;
