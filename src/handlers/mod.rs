pub mod orders;
pub mod points;
pub mod webhook;
