pub mod database;
pub mod duration;
pub mod logging;
pub mod parameter;
pub mod settings;
