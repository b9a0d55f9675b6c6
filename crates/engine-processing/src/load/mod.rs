pub mod buffer;
pub mod chunk;
pub mod encoder;
pub mod stream;
pub mod writer;
