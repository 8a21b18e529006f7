//! HTTP API - Diffusion-server compatible routes, admin routes and stubs

pub mod admin;
pub mod routes;
pub mod sdapi;
pub mod stubs;

pub use routes::create_router;
