pub mod browser;
pub mod extract;
pub mod maps;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use browser::ChromeMapsPage;
pub use maps::MapsScraper;
pub use traits::MapsPage;
pub use types::{Pacing, SearchParams};
