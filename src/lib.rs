pub mod catalog;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod experience;
pub mod format;
pub mod normalization;
pub mod notify;
pub mod review;
pub mod routes;
pub mod seed;
pub mod snapshot;
pub mod source;
pub mod view;
