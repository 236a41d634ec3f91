pub mod cacheable;

pub use cacheable::Cacheable;
