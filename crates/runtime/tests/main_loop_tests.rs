use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn run_strata(args: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_strata"))
        .args(args)
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn strata");

    let timeout = Duration::from_secs(60);
    let start = Instant::now();
    while child.try_wait().expect("Failed to poll strata").is_none() {
        if start.elapsed() > timeout {
            child.kill().expect("Failed to kill timed-out process");
            panic!("strata timed out after {timeout:?}");
        }
        thread::sleep(Duration::from_millis(50));
    }
    let output = child.wait_with_output().expect("Failed to collect output");
    eprintln!("--- strata STDOUT ---\n{}", String::from_utf8_lossy(&output.stdout));
    eprintln!("--- strata STDERR ---\n{}", String::from_utf8_lossy(&output.stderr));
    output
}

#[test]
fn runs_a_demo_headless() {
    let output = run_strata(&["--demo", "sphere_stack", "--steps", "60", "--threads", "2"]);
    assert!(output.status.success(), "exit code {:?}", output.status.code());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Running in headless mode."));
    assert!(stdout.contains("Demo finished."));
}

#[test]
fn lists_registered_demos() {
    let output = run_strata(&["--list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["sphere_stack", "box_pile", "pendulum_chain"] {
        assert!(stdout.contains(name), "{name} missing from listing");
    }
}

#[test]
fn unknown_demo_fails() {
    let output = run_strata(&["--demo", "nope", "--steps", "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown demo"));
}

#[test]
fn config_file_is_applied() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "substeps": 1, "gravity": [0.0, -1.62, 0.0] }}"#).unwrap();
    let path = file.path().to_str().unwrap().to_owned();
    let output = run_strata(&["--demo", "pendulum_chain", "--steps", "30", "--config", &path]);
    assert!(output.status.success());

    let mut broken = tempfile::NamedTempFile::new().unwrap();
    write!(broken, r#"{{ "timestep": 0 }}"#).unwrap();
    let path = broken.path().to_str().unwrap().to_owned();
    let output = run_strata(&["--steps", "1", "--config", &path]);
    assert!(!output.status.success());
}
