//! Sequential write, rewrite and read phases
//!
//! Each phase streams the whole test file in chunk-sized pieces. The write
//! and rewrite phases alter one word per chunk so that no two chunks are
//! identical, and the read phase folds every chunk into a small histogram so
//! the data is actually consumed. All three flush and close the file before
//! their end checkpoint, and use process CPU time.

use crate::bench::timing::{CpuScope, PhaseDelta, RunClock};
use crate::io::block::Block;
use crate::io::disk::{close_file, read_chunk};
use crate::{DiskProbeError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::SmallRng, SeedableRng};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

/// Value every word of a fresh write chunk starts from
const FILL_WORD: i32 = 42;

/// Parameters shared by the sequential phases
#[derive(Clone)]
pub struct SequentialJob {
    pub file_size: u64,
    pub chunk_size: u64,
    pub randomize: bool,
    pub clock: RunClock,
    progress: ProgressBar,
}

impl SequentialJob {
    pub fn new(file_size: u64, chunk_size: u64, randomize: bool, clock: RunClock) -> Self {
        Self {
            file_size,
            chunk_size,
            randomize,
            clock,
            progress: ProgressBar::hidden(),
        }
    }

    /// Show a byte progress bar on stderr while a phase runs
    pub fn with_progress(mut self, show: bool) -> Self {
        self.progress = if show {
            progress_bar(self.file_size)
        } else {
            ProgressBar::hidden()
        };
        self
    }

    /// Number of whole chunks in the file
    pub fn chunks(&self) -> u64 {
        self.file_size / self.chunk_size
    }

    fn begin(&self, label: &'static str) {
        self.progress.reset();
        self.progress.set_length(self.chunks() * self.chunk_size);
        self.progress.set_message(label);
    }

    /// Write the file from scratch. Consumes the freshly created handle.
    pub fn write(&self, mut file: File) -> Result<PhaseDelta> {
        let mut block = Block::filled_with_words(self.chunk_size as usize, FILL_WORD);
        let mut rng = SmallRng::from_entropy();
        let words = block.words();
        self.begin("writing");

        let start = self.clock.mark(CpuScope::Process)?;
        for chunk in 0..self.chunks() {
            block.adjust_word(chunk as usize % words, 1);
            if self.randomize {
                block.randomize(&mut rng);
            }
            file.write_all(block.as_slice())
                .map_err(|e| DiskProbeError::io("write(2)", e))?;
            self.progress.inc(self.chunk_size);
        }
        file.sync_all()
            .map_err(|e| DiskProbeError::io("fsync after fast write", e))?;
        close_file(file).map_err(|e| DiskProbeError::io("close after fast write", e))?;
        let end = self.clock.mark(CpuScope::Process)?;

        self.progress.finish_and_clear();
        Ok(PhaseDelta::between(&start, &end))
    }

    /// Read every chunk, change one word and write it back in place.
    pub fn rewrite(&self, mut file: File) -> Result<PhaseDelta> {
        let mut block = Block::new(self.chunk_size as usize);
        let mut rng = SmallRng::from_entropy();
        let words = block.words();
        self.begin("rewriting");

        let start = self.clock.mark(CpuScope::Process)?;
        for chunk in 0..self.chunks() {
            let got = read_chunk(&mut file, block.as_mut_slice())
                .map_err(|e| DiskProbeError::io("read(2) in rewrite", e))?;
            if got < block.len() {
                return Err(DiskProbeError::io(
                    "read(2) in rewrite",
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("chunk {} is short: {} of {} bytes", chunk, got, block.len()),
                    ),
                ));
            }

            block.adjust_word(chunk as usize % words, 1);
            if self.randomize {
                block.randomize(&mut rng);
            }
            file.seek(SeekFrom::Current(-(got as i64)))
                .map_err(|e| DiskProbeError::io("relative lseek", e))?;
            file.write_all(block.as_slice())
                .map_err(|e| DiskProbeError::io("re write", e))?;
            self.progress.inc(self.chunk_size);
        }
        file.sync_all()
            .map_err(|e| DiskProbeError::io("fsync after rewrite", e))?;
        close_file(file).map_err(|e| DiskProbeError::io("close after rewrite", e))?;
        let end = self.clock.mark(CpuScope::Process)?;

        self.progress.finish_and_clear();
        Ok(PhaseDelta::between(&start, &end))
    }

    /// Stream the file to EOF. Returns the phase delta and the bytes read.
    pub fn read(&self, mut file: File) -> Result<(PhaseDelta, u64)> {
        let mut block = Block::new(self.chunk_size as usize);
        let mut histogram = [0u64; 128];
        let mut total = 0u64;
        self.begin("reading");

        let start = self.clock.mark(CpuScope::Process)?;
        loop {
            let got = read_chunk(&mut file, block.as_mut_slice())
                .map_err(|e| DiskProbeError::io("read(2)", e))?;
            if got == 0 {
                break;
            }
            total += got as u64;
            fold_chunk(&block, &mut histogram);
            self.progress.inc(got as u64);
        }
        close_file(file).map_err(|e| DiskProbeError::io("close after read", e))?;
        let end = self.clock.mark(CpuScope::Process)?;

        std::hint::black_box(&histogram);
        self.progress.finish_and_clear();
        debug!(bytes = total, "sequential read done");
        Ok((PhaseDelta::between(&start, &end), total))
    }
}

/// Count one byte of the chunk, picked by the chunk's own first word
fn fold_chunk(block: &Block, histogram: &mut [u64; 128]) {
    let words = block.words();
    if words == 0 {
        return;
    }
    let index = block.word(0).unsigned_abs() as usize % words;
    histogram[(block.word(index) & 0x7f) as usize] += 1;
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{msg:>10} [{bar:30}] {bytes}/{total_bytes} ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::disk::TestFile;
    use tempfile::tempdir;

    const CHUNK: u64 = 256;

    fn job(chunks: u64, randomize: bool) -> SequentialJob {
        SequentialJob::new(chunks * CHUNK, CHUNK, randomize, RunClock::new())
    }

    fn word_at(bytes: &[u8], chunk: usize, word: usize) -> i32 {
        let at = chunk * CHUNK as usize + word * 4;
        i32::from_ne_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_write_produces_whole_file_with_distinct_chunks() {
        let dir = tempdir().unwrap();
        let test_file = TestFile::new(dir.path());
        let job = job(8, false);

        let delta = job.write(test_file.create().unwrap()).unwrap();
        assert!(delta.elapsed_secs >= 0.0);

        let bytes = std::fs::read(test_file.path()).unwrap();
        assert_eq!(bytes.len() as u64, 8 * CHUNK);
        // chunk i carries one more bump than chunk i - 1, cycling over words
        assert_eq!(word_at(&bytes, 0, 0), 43);
        assert_eq!(word_at(&bytes, 0, 1), 42);
        assert_eq!(word_at(&bytes, 1, 1), 43);
        assert_eq!(word_at(&bytes, 7, 7), 43);
        let first = &bytes[..CHUNK as usize];
        let second = &bytes[CHUNK as usize..2 * CHUNK as usize];
        assert_ne!(first, second);
    }

    #[test]
    fn test_partial_trailing_chunk_is_not_written() {
        let dir = tempdir().unwrap();
        let test_file = TestFile::new(dir.path());
        let job = SequentialJob::new(3 * CHUNK + 10, CHUNK, false, RunClock::new());
        job.write(test_file.create().unwrap()).unwrap();
        assert_eq!(
            std::fs::metadata(test_file.path()).unwrap().len(),
            3 * CHUNK
        );
    }

    #[test]
    fn test_rewrite_changes_each_chunk_once() {
        let dir = tempdir().unwrap();
        let test_file = TestFile::new(dir.path());
        let job = job(4, false);
        job.write(test_file.create().unwrap()).unwrap();
        let before = std::fs::read(test_file.path()).unwrap();

        job.rewrite(test_file.open().unwrap()).unwrap();
        let after = std::fs::read(test_file.path()).unwrap();

        assert_eq!(before.len(), after.len());
        for chunk in 0..4 {
            assert_eq!(
                word_at(&after, chunk, chunk),
                word_at(&before, chunk, chunk) + 1
            );
        }
    }

    #[test]
    fn test_rewrite_of_truncated_file_fails() {
        let dir = tempdir().unwrap();
        let test_file = TestFile::new(dir.path());
        job(2, false).write(test_file.create().unwrap()).unwrap();

        let err = job(4, false)
            .rewrite(test_file.open().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("rewrite"));
    }

    #[test]
    fn test_read_consumes_every_byte() {
        let dir = tempdir().unwrap();
        let test_file = TestFile::new(dir.path());
        let job = job(16, true);
        job.write(test_file.create().unwrap()).unwrap();

        let (delta, bytes) = job.read(test_file.open().unwrap()).unwrap();
        assert_eq!(bytes, 16 * CHUNK);
        assert!(delta.cpu_secs >= 0.0);
    }

    #[test]
    fn test_fold_chunk_counts_one_byte() {
        let block = Block::filled_with_words(64, 5);
        let mut histogram = [0u64; 128];
        fold_chunk(&block, &mut histogram);
        assert_eq!(histogram[5], 1);
        assert_eq!(histogram.iter().sum::<u64>(), 1);
    }
}
