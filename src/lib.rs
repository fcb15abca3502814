// Per-user OAuth credential storage
pub mod credentials;

// Google OAuth flow and API clients
pub mod google;

// HTTP API
pub mod api;

// Service configuration
pub mod config;
