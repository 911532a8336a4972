use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

fn launcher() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_launcher"));
    command.env("LAUNCHER_LOG", "warn");
    command
}

fn run_plan(plan: &str, extra: &[&str]) -> Output {
    launcher()
        .arg("--config")
        .arg(plan)
        .args(extra)
        .output()
        .unwrap()
}

fn plan(workdir: &Path, body: &str) -> String {
    format!(
        "workdir = {:?}\n[env]\nshell = \"/bin/sh\"\n{}",
        workdir.to_str().unwrap(),
        body
    )
}

const SCENARIO: &str = r#"
[[steps]]
name = "sync"
command = ["/bin/sh", "-c", "exit 1"]

[[steps]]
name = "build"
command = ["/bin/sh", "-c", "touch built"]

[[processes]]
name = "a"
command = ["/bin/sh", "-c", "echo a >> a.log"]

[[processes]]
name = "b"
command = ["/bin/sh", "-c", "echo b >> b.log"]

[[processes]]
name = "c"
command = ["/bin/sh", "-c", "exit 2"]
mode = "foreground"
"#;

#[test]
fn failed_sync_and_foreground_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_plan(&plan(dir.path(), SCENARIO), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(dir.path().join("built").exists());
    for log in ["a.log", "b.log"].iter() {
        let content = std::fs::read_to_string(dir.path().join(log)).unwrap();
        assert_eq!(content.lines().count(), 1, "{} ran more than once", log);
    }
}

#[test]
fn trailing_args_reach_foreground() {
    let dir = tempfile::tempdir().unwrap();
    let body = r#"
[[processes]]
name = "c"
command = ["/bin/sh", "-c", "exit \"$1\"", "sh"]
mode = "foreground"
"#;
    let output = run_plan(&plan(dir.path(), body), &["--", "7"]);
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn plan_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plan.toml");
    std::fs::write(
        &file,
        plan(
            dir.path(),
            r#"
[[processes]]
name = "c"
command = ["/bin/sh", "-c", "exit 1"]
mode = "foreground"
"#,
        ),
    )
    .unwrap();

    let output = launcher().arg("-f").arg(&file).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn file_and_config_are_exclusive() {
    let output = launcher()
        .args(&["-f", "plan.toml", "-c", "processes = []"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("must not appear together"));
}

#[test]
fn invalid_plan_exits_with_one() {
    let output = run_plan("processes = []", &[]);
    assert_eq!(output.status.code(), Some(1));

    let output = run_plan("not toml at all [", &[]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn dry_run_prints_default_plan() {
    let output = launcher().arg("--dry-run").output().unwrap();
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("step sync (warn): git pull"));
    assert!(stdout.contains("step build (warn): colcon build --symlink-install"));
    assert!(stdout.contains("process controller (foreground): ros2 run robottle controller1"));
}

#[test]
fn hanging_foreground_blocks_forever() {
    let dir = tempfile::tempdir().unwrap();
    let body = r#"
[[processes]]
name = "c"
command = ["sleep", "30"]
mode = "foreground"
"#;
    let mut child = launcher()
        .arg("--config")
        .arg(plan(dir.path(), body))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    thread::sleep(Duration::from_millis(500));
    assert!(child.try_wait().unwrap().is_none());

    child.kill().unwrap();
    child.wait().unwrap();
}
