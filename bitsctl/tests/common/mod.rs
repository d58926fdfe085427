use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn bitsctl() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bitsctl"));
    cmd.env_remove("BITS_SERVICE_PORT")
        .env_remove("BITS_CLIENT_BINARY")
        .env("BITS_LOG_LEVEL", "warn");
    cmd
}

pub fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run bitsctl")
}

/// Executable script recording its arguments, one call per line, in `log`.
#[cfg(unix)]
pub fn recording_instrument(dir: &Path, log: &Path, extra: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("bits_client");
    let body = format!(
        "#!/bin/sh\nprintf '%s|' \"$@\" >> '{log}'\necho >> '{log}'\n{extra}\n",
        log = log.display()
    );
    std::fs::write(&path, body).expect("write fake instrument");
    let mut perms = std::fs::metadata(&path).expect("stat fake instrument").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake instrument");
    path
}
