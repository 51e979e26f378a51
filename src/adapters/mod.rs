//! Adapters over external APIs: manifest splitting, API discovery, dynamic
//! watches, dependent patching and the helm binary

pub mod dependent_patch;
pub mod dynamic_watch;
pub mod helm;
pub mod manifest;
pub mod scope_resolver;
