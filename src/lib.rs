pub mod app;
pub mod audit;
pub mod cache;
pub mod config;
pub mod omdb;
pub mod rate_limit;
pub mod resolver;
pub mod telegram;
pub mod tmdb;
