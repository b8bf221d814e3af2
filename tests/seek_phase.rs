use diskprobe::bench::{SeekCoordinator, SeekMode, RunClock};
use diskprobe::config::BenchConfig;
use diskprobe::io::TestFile;
use diskprobe::DiskProbeError;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

const CHUNK: u64 = 8192;

fn write_scratch(dir: &Path, chunks: u64) -> TestFile {
    let test_file = TestFile::new(dir);
    let mut file = test_file.create().expect("create scratch file");
    file.write_all(&vec![42u8; (chunks * CHUNK) as usize])
        .expect("fill scratch file");
    file.sync_all().expect("sync scratch file");
    test_file
}

fn config_for(dir: &Path, chunks: u64) -> BenchConfig {
    BenchConfig::new()
        .with_scratch_dir(dir.to_path_buf())
        .with_file_size(chunks * CHUNK)
        .with_chunk_size(CHUNK)
}

#[tokio::test]
async fn test_work_is_shared_and_aggregated() {
    let dir = tempdir().unwrap();
    let test_file = write_scratch(dir.path(), 128);
    let config = config_for(dir.path(), 128);
    let coordinator = SeekCoordinator::new(&config, test_file.path().to_path_buf(), RunClock::new());

    let result = coordinator
        .run_seek_phase(3, 12, SeekMode::ReadOnly)
        .await
        .expect("seek phase");

    assert_eq!(result.reports.len(), 3);
    assert_eq!(result.reports.iter().map(|r| r.probes).sum::<u64>(), 12);

    let earliest = result.reports.iter().map(|r| r.start.wall).min().unwrap();
    let latest = result.reports.iter().map(|r| r.end.wall).max().unwrap();
    assert!((result.elapsed_secs - (latest - earliest).as_secs_f64()).abs() < 1e-9);
    for report in &result.reports {
        assert!(result.elapsed_secs >= report.elapsed_secs());
        assert!(report.cpu_secs >= 0.0);
    }
    let cpu: f64 = result.reports.iter().map(|r| r.cpu_secs).sum();
    assert!((result.cpu_secs - cpu).abs() < 1e-9);
}

#[tokio::test]
async fn test_read_write_phase_modifies_file() {
    let dir = tempdir().unwrap();
    let test_file = write_scratch(dir.path(), 16);
    let config = config_for(dir.path(), 16).with_start_delay(std::time::Duration::from_millis(20));
    let coordinator = SeekCoordinator::new(&config, test_file.path().to_path_buf(), RunClock::new());

    let result = coordinator
        .run_seek_phase(2, 40, SeekMode::ReadWrite)
        .await
        .expect("seek phase");
    assert!(result.write_backs >= 2);

    let bytes = std::fs::read(test_file.path()).unwrap();
    assert_eq!(bytes.len() as u64, 16 * CHUNK);
    assert!(bytes.iter().any(|&b| b != 42));
}

#[tokio::test]
async fn test_unopenable_file_fails_the_phase() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path(), 16);
    let coordinator = SeekCoordinator::new(&config, dir.path().join("missing"), RunClock::new());

    let err = coordinator
        .run_seek_phase(3, 100, SeekMode::ReadWrite)
        .await
        .unwrap_err();
    assert!(matches!(err, DiskProbeError::IoError { .. }));
}
