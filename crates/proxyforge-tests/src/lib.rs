//! Integration test crate for ProxyForge.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives `Project` with scripted loaders and engines to verify the
//! registry, resolver and proxy orchestrator work together.

#[cfg(test)]
mod support;

#[cfg(test)]
mod assets;


#[cfg(test)]
mod proxies;

#[cfg(test)]
mod documents;
