//! CLI 하위 명령.

pub mod health;
pub mod prices;
