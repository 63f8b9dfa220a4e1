pub mod events;
pub mod history;
pub mod models;
pub mod runs;
pub mod session;
pub mod settings;
