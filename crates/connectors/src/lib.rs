pub mod error;
pub mod stream_load;

pub use stream_load::client::HttpStreamLoadClient;
