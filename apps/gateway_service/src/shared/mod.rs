pub mod api_response;
pub mod auth_middleware;
pub mod request_guard;
