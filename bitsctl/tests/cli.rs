mod common;

use common::{bitsctl, run};

#[test]
fn test_help_lists_subcommands() {
    let out = run(bitsctl().arg("--help"));
    assert!(out.status.success());
    let help = String::from_utf8_lossy(&out.stdout);
    for sub in ["list-devices", "start", "stop", "export-csv", "markers", "metrics", "monsoon-export"] {
        assert!(help.contains(sub), "help is missing {sub}:\n{help}");
    }
}

#[test]
fn test_port_is_required() {
    let out = run(bitsctl().arg("list-devices"));
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--port"));
}

#[cfg(unix)]
mod with_instrument {
    use super::common::{bitsctl, recording_instrument, run};
    use std::fs;

    #[test]
    fn test_start_and_markers_reach_instrument() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let bin = recording_instrument(dir.path(), &log, "");

        let out = run(bitsctl()
            .args(["--port", "7100", "--kibbles", "start", "c1", "--sampling-rate", "250"])
            .env("BITS_CLIENT_BINARY", &bin));
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

        let out = run(bitsctl()
            .args(["--port", "7100", "markers", "c1", "--marker", "20=b", "--marker", "10=a"])
            .env("BITS_CLIENT_BINARY", &bin));
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        assert!(String::from_utf8_lossy(&out.stdout).contains("added 2 marker(s)"));

        let calls = fs::read_to_string(&log).unwrap();
        let lines: Vec<_> = calls.lines().collect();
        assert_eq!(
            lines,
            [
                "--port|7100|--name|c1|--non_blocking|--time|31536000|--default_sampling_rate|250|--disk_space_saver|",
                "--port|7100|--name|c1|--log_ts|10|--log|a|",
                "--port|7100|--name|c1|--log_ts|20|--log|b|",
            ]
        );
    }

    #[test]
    fn test_bad_export_suffix_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let bin = recording_instrument(dir.path(), &log, "");

        let out = run(bitsctl()
            .args(["--port", "7100", "--binary"])
            .arg(&bin)
            .args(["export", "c1", "/tmp/c1.zip"]));
        assert!(!out.status.success());
        assert!(String::from_utf8_lossy(&out.stderr).contains(".7z.bits"));
        assert!(!log.exists());
    }

    #[test]
    fn test_channels_printed_from_metrics_dump() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let dump = r#"
while [ $# -gt 0 ]; do
  if [ "$1" = "--aggregates_yaml_path" ]; then
    printf 'data:\n  - name: rail_b\n  - name: rail_a\n' > "$2"
  fi
  shift
done"#;
        let bin = recording_instrument(dir.path(), &log, dump);

        let out = run(bitsctl()
            .args(["--port", "7100", "channels", "c1"])
            .env("BITS_CLIENT_BINARY", &bin));
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        assert_eq!(String::from_utf8_lossy(&out.stdout), "rail_a\nrail_b\n");
    }
}
