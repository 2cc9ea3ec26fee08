pub mod config;
pub mod logger;
pub mod error;
pub mod storage;
pub mod scanner;
pub mod content;
pub mod render;
pub mod content_index;
pub mod paginator;
pub mod query_string;
pub mod content_cache;
pub mod feed;
pub mod server;
pub mod text_utils;
pub mod vault_sync;
pub mod util;
mod test_data;
