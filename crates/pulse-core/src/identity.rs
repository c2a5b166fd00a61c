//! Deterministic document identity for ingested articles.
//!
//! Re-running the pipeline against the same feed must map each article
//! to the same document id without consulting any prior-run state, so
//! the id is a pure function of the canonical URL: two independent
//! 32-bit string hashes concatenated into a fixed-width 64-bit hex
//! string. Non-cryptographic on purpose; the only requirement is a
//! negligible collision rate over a few thousand records.

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const DJB2_SEED: u32 = 5381;

/// Map an input string to its stable 16-hex-char document id.
pub fn hash(input: &str) -> String {
    let mut fnv = FNV_OFFSET;
    let mut djb = DJB2_SEED;
    for byte in input.bytes() {
        fnv = (fnv ^ u32::from(byte)).wrapping_mul(FNV_PRIME);
        djb = djb.wrapping_mul(33) ^ u32::from(byte);
    }
    format!("{fnv:08x}{djb:08x}")
}
