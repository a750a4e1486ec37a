use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x5e9a_71c3_d04b_e28f;

/// 128-bit content signature of source data.
///
/// Compiled data is a derived cache keyed by signature: a mismatch means the cache is stale and
/// must be rebuilt wholesale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// High 64 bits.
    pub hi: u64,
    /// Low 64 bits.
    pub lo: u64,
}

pub(crate) struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    pub(crate) fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_str(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    pub(crate) fn finish64(&self) -> u64 {
        self.inner.digest()
    }

    pub(crate) fn finish(&self) -> Signature {
        let v = self.inner.digest128();
        Signature {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

/// Signature of any serializable value, hashed over its canonical JSON encoding.
pub(crate) fn signature_of<T: serde::Serialize>(value: &T) -> Result<Signature, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    let mut h = StableHasher::new();
    h.write_bytes(&bytes);
    Ok(h.finish())
}
