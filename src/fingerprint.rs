//! Change detection for raw snapshot buffers.

const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// 64-bit FNV-1a hash of a byte buffer.
///
/// Used to suppress republishing a snapshot whose bytes did not change between
/// two polls. Collisions are possible in principle and accepted.
pub fn fingerprint(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}
