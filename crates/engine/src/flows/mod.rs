//! Built-in automation flows.

pub mod crawl_simple;
pub mod sauce_demo;

pub use crawl_simple::CrawlSimple;
pub use sauce_demo::SauceDemo;
