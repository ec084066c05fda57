//! Erasure coding for reliable broadcast fragments.
//!
//! A proposed value is split into `k = n - 2f` data shards and padded
//! with parity shards up to `n` total, so any `k` of the `n` fragments
//! are sufficient to reconstruct the original payload (§4.3).

use reed_solomon_erasure::galois_8::ReedSolomon;

#[derive(Debug)]
pub enum ErasureError {
    InvalidShardCounts,
    Encode(String),
    Reconstruct(String),
    TooFewShards { required: usize, available: usize },
}

impl std::fmt::Display for ErasureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErasureError::InvalidShardCounts => write!(f, "invalid data/parity shard counts"),
            ErasureError::Encode(msg) => write!(f, "erasure encode failed: {msg}"),
            ErasureError::Reconstruct(msg) => write!(f, "erasure reconstruct failed: {msg}"),
            ErasureError::TooFewShards { required, available } => write!(
                f,
                "too few shards to reconstruct: need {required}, have {available}"
            ),
        }
    }
}

impl std::error::Error for ErasureError {}

/// Splits, encodes, and reconstructs a payload across `n` fragments with
/// a `k = n - 2f` reconstruction threshold.
#[derive(Clone, Debug)]
pub struct ErasureCoder {
    data_shards: usize,
    parity_shards: usize,
}

impl ErasureCoder {
    /// Builds the coder for a committee of size `n` tolerating `f`
    /// Byzantine members: `k = n - 2f` data shards, `n - k` parity shards.
    pub fn for_committee(n: usize, f: usize) -> Result<Self, ErasureError> {
        if n <= 2 * f {
            return Err(ErasureError::InvalidShardCounts);
        }
        let data_shards = n - 2 * f;
        let parity_shards = n - data_shards;
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    /// Splits `payload` into `data_shards` equal-size, zero-padded chunks
    /// and computes `parity_shards` parity fragments over them. Returns
    /// exactly `total_shards()` fragments, all the same length.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>, ErasureError> {
        let rs = ReedSolomon::new(self.data_shards, self.parity_shards)
            .map_err(|e| ErasureError::Encode(e.to_string()))?;

        let shard_len = payload.len().div_ceil(self.data_shards).max(1);
        let mut shards: Vec<Vec<u8>> = vec![vec![0u8; shard_len]; self.total_shards()];
        for (chunk, shard) in payload.chunks(shard_len).zip(shards.iter_mut()) {
            shard[..chunk.len()].copy_from_slice(chunk);
        }

        rs.encode(&mut shards)
            .map_err(|e| ErasureError::Encode(e.to_string()))?;
        Ok(shards)
    }

    /// Reconstructs the original payload from a partial set of fragments
    /// (`None` where a fragment is unknown), truncated back to
    /// `original_len`. Requires at least `data_shards` known fragments.
    pub fn reconstruct(
        &self,
        mut shards: Vec<Option<Vec<u8>>>,
        original_len: usize,
    ) -> Result<Vec<u8>, ErasureError> {
        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < self.data_shards {
            return Err(ErasureError::TooFewShards {
                required: self.data_shards,
                available,
            });
        }

        let rs = ReedSolomon::new(self.data_shards, self.parity_shards)
            .map_err(|e| ErasureError::Reconstruct(e.to_string()))?;
        rs.reconstruct(&mut shards)
            .map_err(|e| ErasureError::Reconstruct(e.to_string()))?;

        let mut out = Vec::with_capacity(original_len);
        for shard in shards.into_iter().take(self.data_shards) {
            out.extend_from_slice(&shard.expect("reconstructed shard present"));
        }
        out.truncate(original_len);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstructs_from_exactly_k_shards() {
        let coder = ErasureCoder::for_committee(7, 2).expect("valid committee");
        assert_eq!(coder.data_shards(), 3);
        assert_eq!(coder.total_shards(), 7);

        let payload = b"conductor epoch payload".to_vec();
        let shards = coder.encode(&payload).expect("encode");

        let mut partial: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        // Drop all but the first k shards.
        for slot in partial.iter_mut().skip(coder.data_shards()) {
            *slot = None;
        }

        let decoded = coder.reconstruct(partial, payload.len()).expect("reconstruct");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn reconstructs_from_k_shards_missing_some_data_shards() {
        let coder = ErasureCoder::for_committee(7, 2).expect("valid committee");
        let payload = b"another payload of different length!".to_vec();
        let shards = coder.encode(&payload).expect("encode");

        let mut partial: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        partial[0] = None;
        partial[1] = None;

        let decoded = coder.reconstruct(partial, payload.len()).expect("reconstruct");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn fails_with_too_few_shards() {
        let coder = ErasureCoder::for_committee(7, 2).expect("valid committee");
        let payload = b"short".to_vec();
        let shards = coder.encode(&payload).expect("encode");
        let mut partial: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        for slot in partial.iter_mut().skip(coder.data_shards() - 1) {
            *slot = None;
        }
        let err = coder.reconstruct(partial, payload.len()).unwrap_err();
        assert!(matches!(err, ErasureError::TooFewShards { .. }));
    }
}
