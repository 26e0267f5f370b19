pub mod modes;
pub mod sessions;
