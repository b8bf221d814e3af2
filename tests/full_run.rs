use diskprobe::bench::{run_all_phases, RunContext};
use diskprobe::config::BenchConfig;
use diskprobe::models::TestPhase;
use tempfile::tempdir;

fn tiny_config(dir: &std::path::Path) -> BenchConfig {
    BenchConfig::new()
        .with_scratch_dir(dir.to_path_buf())
        .with_file_size(1024 * 1024)
        .with_chunk_size(8192)
        .with_seek_count(200)
        .with_machine("ci")
        .with_randomize_blocks(true)
        .with_cache_drop_command(Some("true".to_string()))
        .with_show_progress(false)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tiny_run_reports_every_phase() {
    let dir = tempdir().unwrap();
    let mut ctx = RunContext::new(tiny_config(dir.path())).expect("valid config");
    run_all_phases(&mut ctx).await.expect("run");

    for phase in TestPhase::ALL {
        assert!(ctx.phases().get(phase).is_some(), "{:?} missing", phase);
    }

    let report = ctx.report();
    assert!(report.is_complete());
    assert_eq!(report.machine, "ci");
    assert_eq!(report.file_size_mib, 1);

    let table = report.to_string();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[3].starts_with("ci"));
    assert!(!lines[3].contains(" -"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["seek_count"], 200);
    assert!(json["seek_read_write"]["rate"].as_f64().unwrap() >= 0.0);

    let path = ctx.test_file().path().to_path_buf();
    drop(ctx);
    assert!(!path.exists());
}

#[test]
fn test_missing_scratch_dir_is_rejected() {
    let dir = tempdir().unwrap();
    let config = tiny_config(&dir.path().join("nope"));
    assert!(RunContext::new(config).is_err());
}
