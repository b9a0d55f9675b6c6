pub mod stream_load;
