//! External capabilities used by the research pipeline
//!
//! # Module Structure
//!
//! - [`search`](crate::tools::search) - Web search providers (DuckDuckGo, Tavily)
//! - [`fetch`](crate::tools::fetch) - Page retrieval over a shared transport
//! - [`extract`](crate::tools::extract) - Readable-content extraction from HTML
//!
//! # Web Search
//! ```ignore
//! let provider = search::from_config(&config.search)?;
//! for hit in provider.search("rust async runtimes", 5).await? {
//!     println!("{}: {}", hit.title, hit.url);
//! }
//! ```
//!
//! # Retrieval
//! ```ignore
//! let transport = HttpTransport::new(&config.research.user_agent, 1_000_000)?;
//! let page = HttpFetcher::new().fetch(&transport, "https://example.com").await?;
//! let content = extract::extract(&page.url, &page.body, ExtractOptions::default());
//! ```

/// Readable-content extraction.
pub mod extract;
/// Page retrieval.
pub mod fetch;
/// Web search providers.
pub mod search;

pub use extract::{ExtractOptions, extract};
pub use fetch::{HttpFetcher, HttpTransport, PageFetcher, RawPage};
pub use search::{DuckDuckGoSearch, SearchProvider, TavilySearch};
