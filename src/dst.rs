//! The DST entropy decoder is an external collaborator (§1, §6.2): this crate never implements
//! the real lossless decompression algorithm. [`DstDecoder`] is the one-shot interface the core
//! calls through; each call constructs a fresh decoder instance, since DST frames are
//! independently decodable and decoder instances must never be shared between threads.

use crate::CoreResult;

/// Stateless, one-shot DST decode of a single compressed frame into `channel_count * frame_size`
/// decoded DSD bytes. A fresh `DstDecoder` is constructed per call; see spec.md §9 "Per-job DST
/// decoder construction" — this crate follows the source's choice of per-job construction over
/// per-worker pooling, since a DST frame decode is cheap relative to thread setup and this keeps
/// worker state trivially `Send` without interior mutability.
pub trait DstDecoder: Default {
    /// Decode `compressed` (one DST frame) into exactly `channel_count * crate::SACD_FRAME_SIZE`
    /// bytes.
    fn decode(&mut self, compressed: &[u8], channel_count: u16) -> CoreResult<Vec<u8>>;
}

/// Object-safe wrapper so callers that only know the channel count and compressed bytes at
/// runtime (the MT pipeline's worker closures) don't need to be generic over a concrete decoder
/// type. A blanket impl lets any `DstDecoder + Default` satisfy this.
pub trait DstDecoderFactory: Send + Sync {
    fn decode(&self, compressed: &[u8], channel_count: u16) -> CoreResult<Vec<u8>>;
}

impl<D: DstDecoder + Default + Send + Sync> DstDecoderFactory for std::marker::PhantomData<D> {
    fn decode(&self, compressed: &[u8], channel_count: u16) -> CoreResult<Vec<u8>> {
        D::default().decode(compressed, channel_count)
    }
}
