mod admin;
mod authorize;
mod commands;

pub use admin::health;
pub use authorize::authorize;
pub use commands::command;
