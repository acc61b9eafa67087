mod state;
mod upstream;

pub mod executor;
pub mod processors;
pub mod sequence;

pub use executor::{ChainDirection, Engine};
pub use state::WorkingSet;
pub use upstream::{
    resolve_upstream, resolve_upstream_for_handle, UpstreamSources, UpstreamValue,
    REFERENCE_HANDLE,
};

#[cfg(test)]
mod tests;
