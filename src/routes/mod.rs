pub mod api;
pub mod guards;
pub mod response;
