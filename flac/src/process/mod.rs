/// Streaming decode of headers and frames.
///
/// Provides the [`Decoder`](decode::Decoder) plus its
/// [`HeaderStatus`](decode::HeaderStatus) and
/// [`FrameStatus`](decode::FrameStatus) outcomes.
pub mod decode;

/// Packing of planar workspace samples into interleaved PCM bytes.
pub mod output;
