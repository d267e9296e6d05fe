// handlers/mod.rs - Route handlers
//
// Public:    /health, /login, /api/auth, /api/map-config
// Protected: /, /api/polygons[/:id] (session cookie required)

pub mod auth;
pub mod pages;
pub mod polygons;
pub mod system;
