pub mod app_state;
pub mod notices;
pub mod timeline;
