pub mod api;
pub mod http_api;
pub mod normalize;
pub mod poller;
pub mod timeline_service;
pub mod visit_board;
