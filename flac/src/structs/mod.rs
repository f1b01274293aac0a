pub mod frame;
pub mod metadata;
pub mod stream_info;
pub mod subframe;
