//! Chunk buffer viewed as native-endian 32-bit words
//!
//! The sequential phases bump one word per chunk and the seek phases dirty a
//! random interior word before writing a block back, so every write carries
//! data the storage has not seen before.

use rand::Rng;

const WORD: usize = std::mem::size_of::<i32>();

/// A single I/O chunk
#[derive(Debug, Clone)]
pub struct Block {
    bytes: Vec<u8>,
}

impl Block {
    /// Allocate a zeroed block of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size],
        }
    }

    /// Allocate a block with every word set to `value`
    pub fn filled_with_words(size: usize, value: i32) -> Self {
        let mut block = Self::new(size);
        for chunk in block.bytes.chunks_exact_mut(WORD) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        block
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of whole words in the block
    pub fn words(&self) -> usize {
        self.bytes.len() / WORD
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn word(&self, index: usize) -> i32 {
        let start = index * WORD;
        let mut raw = [0u8; WORD];
        raw.copy_from_slice(&self.bytes[start..start + WORD]);
        i32::from_ne_bytes(raw)
    }

    /// Add `delta` to the word at `index`, wrapping on overflow
    pub fn adjust_word(&mut self, index: usize, delta: i32) {
        let value = self.word(index).wrapping_add(delta);
        let start = index * WORD;
        self.bytes[start..start + WORD].copy_from_slice(&value.to_ne_bytes());
    }

    /// Decrement one random word, never the first or the last
    pub fn touch_interior_word<R: Rng>(&mut self, rng: &mut R) {
        let words = self.words();
        if words < 3 {
            return;
        }
        let index = rng.gen_range(1..words - 1);
        self.adjust_word(index, -1);
    }

    /// Overwrite the whole block with random bytes
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        rng.fill(&mut self.bytes[..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_filled_words() {
        let block = Block::filled_with_words(64, 42);
        assert_eq!(block.words(), 16);
        assert!((0..16).all(|i| block.word(i) == 42));
    }

    #[test]
    fn test_adjust_word_wraps() {
        let mut block = Block::filled_with_words(16, i32::MAX);
        block.adjust_word(2, 1);
        assert_eq!(block.word(2), i32::MIN);
        assert_eq!(block.word(1), i32::MAX);
    }

    #[test]
    fn test_touch_interior_word_changes_exactly_one_interior_word() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut block = Block::filled_with_words(8192, 0);
            block.touch_interior_word(&mut rng);
            let changed: Vec<usize> = (0..block.words()).filter(|&i| block.word(i) != 0).collect();
            assert_eq!(changed.len(), 1);
            assert!(changed[0] >= 1 && changed[0] < block.words() - 1);
            assert_eq!(block.word(changed[0]), -1);
        }
    }

    #[test]
    fn test_randomize_changes_content() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut block = Block::new(4096);
        block.randomize(&mut rng);
        assert!(block.as_slice().iter().any(|&b| b != 0));
    }
}
