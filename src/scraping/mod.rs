pub mod metadata;
pub mod page;
pub mod sitemap;

pub use page::{BatchOutcome, PageScraper, ScrapeStats};
pub use sitemap::SitemapManager;
