pub mod fixture;
pub mod nyt;

pub use fixture::StaticSource;
pub use nyt::{NytNewswire, DEFAULT_NEWSWIRE_URL};
