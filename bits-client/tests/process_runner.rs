//! End-to-end runs against shell scripts standing in for the instrument.
#![cfg(unix)]

mod common;

use bits_client::{BitsClient, BitsError, ErrorKind, ServiceConfig, ServiceEndpoint, Timeouts};
use common::{fake_binary, init_test_logging};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

fn short_timeouts(limit: Duration) -> Timeouts {
    Timeouts {
        command: limit,
        export: limit,
        hardware: limit,
    }
}

#[test]
fn test_real_process_receives_port_prefix() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), "bits_client", r#"printf '%s\n' "$@""#);
    let client = BitsClient::new(&bin, ServiceEndpoint::new(7001), ServiceConfig::default());

    let out = client.list_devices().unwrap();
    assert_eq!(out, "--port\n7001\n--list\ndevices\n");
}

#[test]
fn test_marker_text_with_spaces_stays_one_argument() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");
    let bin = fake_binary(
        dir.path(),
        "bits_client",
        &format!(r#"printf '%s|' "$@" >> '{}'; echo >> '{}'"#, log.display(), log.display()),
    );
    let client = BitsClient::new(&bin, ServiceEndpoint::new(7001), ServiceConfig::default());

    client.add_markers("c1", [(20i64, "screen off"), (10, "screen on")]).unwrap();

    let calls = fs::read_to_string(&log).unwrap();
    let lines: Vec<_> = calls.lines().collect();
    assert_eq!(
        lines,
        [
            "--port|7001|--name|c1|--log_ts|10|--log|screen on|",
            "--port|7001|--name|c1|--log_ts|20|--log|screen off|",
        ]
    );
}

#[test]
fn test_stderr_is_merged_into_output() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), "bits_client", "echo listing; echo 'warning: stale' 1>&2; exit 1");
    let client = BitsClient::new(&bin, ServiceEndpoint::new(7001), ServiceConfig::default());

    let out = client.list_devices().unwrap();
    assert_eq!(out, "listing\nwarning: stale\n");
}

#[test]
fn test_metrics_written_by_real_process() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let body = r#"
while [ $# -gt 0 ]; do
  if [ "$1" = "--aggregates_yaml_path" ]; then
    printf 'data:\n  - name: rail_a\n    avg: 2.5\n' > "$2"
  fi
  shift
done
"#;
    let bin = fake_binary(dir.path(), "bits_client", body);
    let client = BitsClient::new(&bin, ServiceEndpoint::new(7001), ServiceConfig::default());

    let report = client.get_metrics("c1", None, None).unwrap();
    assert_eq!(report.channel("rail_a").and_then(|c| c.get_f64("avg")), Some(2.5));
}

#[test]
fn test_hanging_binary_is_killed() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let bin = fake_binary(
        dir.path(),
        "bits_client",
        &format!("echo $$ > '{}'; exec sleep 30", pid_file.display()),
    );
    let client = BitsClient::new(&bin, ServiceEndpoint::new(7001), ServiceConfig::default())
        .with_timeouts(short_timeouts(Duration::from_millis(200)));

    let start = Instant::now();
    let err = client.stop_collection("c1").unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    let BitsError::Timeout { pid, .. } = err else {
        panic!("expected timeout, got {err:?}");
    };

    if let Ok(recorded) = fs::read_to_string(&pid_file) {
        assert_eq!(recorded.trim(), pid.to_string());
    }
    #[cfg(target_os = "linux")]
    assert!(!Path::new(&format!("/proc/{pid}")).exists(), "pid {pid} survived");
}

#[test]
fn test_missing_binary_surfaces_spawn_error() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let client = BitsClient::new(
        dir.path().join("absent"),
        ServiceEndpoint::new(7001),
        ServiceConfig::default(),
    );
    let err = client.start_collection("c1", 1000).unwrap_err();
    assert!(matches!(err, BitsError::Spawn { .. }));
    assert!(!err.is_retryable());
}

#[test]
fn test_forked_child_cannot_outlive_timeout() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let bg_pid = dir.path().join("bg.pid");
    let bin = fake_binary(
        dir.path(),
        "bits_client",
        &format!("sleep 5 & echo $! > '{}'; echo started", bg_pid.display()),
    );
    let client = BitsClient::new(&bin, ServiceEndpoint::new(7001), ServiceConfig::default())
        .with_timeouts(short_timeouts(Duration::from_millis(500)));

    let start = Instant::now();
    let err = client.list_devices().unwrap_err();
    assert!(
        start.elapsed() < Duration::from_secs(3),
        "list_devices took {:?} with a 500ms timeout",
        start.elapsed()
    );
    assert_eq!(err.kind(), ErrorKind::Timeout);

    #[cfg(target_os = "linux")]
    {
        let pid = fs::read_to_string(&bg_pid).unwrap();
        let proc_path = format!("/proc/{}", pid.trim());
        // The kill is delivered, but the orphan is reaped by init asynchronously.
        let deadline = Instant::now() + Duration::from_secs(2);
        while Path::new(&proc_path).exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        let state = fs::read_to_string(format!("{proc_path}/stat")).unwrap_or_default();
        assert!(
            state.is_empty() || state.contains(") Z "),
            "background child {} still running",
            pid.trim()
        );
    }
}
