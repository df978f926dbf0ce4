use std::error::Error;

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod handler;
pub mod kobo;
pub mod model;
pub mod routes;
pub mod session;

#[cfg(test)]
pub(crate) mod fixtures;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
