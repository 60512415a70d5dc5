pub mod downloads;
pub mod http;
pub mod token_store;

pub use downloads::DownloadDir;
pub use http::HttpRepository;
pub use token_store::FileTokenStore;
