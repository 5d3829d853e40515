pub mod news;

pub use news::NewsConfig;
