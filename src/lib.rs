pub mod context;
pub mod controllers;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
