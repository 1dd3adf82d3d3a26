pub mod columns;
pub mod condition;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod export;
pub mod inspection;
pub mod listing;
pub mod mapping;
pub mod normalization;
pub mod routes;
pub mod urls;
