use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_cai-shell"))
        .arg("-p")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cai-shell");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "quit").expect("write quit");
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn background_job_is_listed_as_running() {
    let output = run_shell(&["sleep 1 &", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1] ("), "stdout was: {stdout}");
    assert!(stdout.contains("Running sleep 1 &"), "stdout was: {stdout}");
}

#[test]
fn background_jobs_get_increasing_sequence_numbers() {
    let output = run_shell(&["sleep 1 &", "sleep 1 &", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1] ("), "stdout was: {stdout}");
    assert!(stdout.contains("[2] ("), "stdout was: {stdout}");
}

#[test]
fn stopped_job_can_be_resumed_in_foreground() {
    let output = run_shell(&["sh -c 'kill -TSTP $$; echo resumed'", "jobs", "fg %1", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stopped by signal"), "stdout was: {stdout}");
    assert!(stdout.contains("Stopped sh -c"), "stdout was: {stdout}");
    assert!(stdout.contains("resumed"), "stdout was: {stdout}");
}

#[test]
fn stopped_job_can_be_resumed_in_background() {
    let output = run_shell(&["sh -c 'kill -TSTP $$; echo later'", "bg %1", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stopped by signal"), "stdout was: {stdout}");
    assert!(stdout.contains("[1] ("), "stdout was: {stdout}");
}

#[test]
fn fg_and_bg_report_bad_arguments() {
    let output = run_shell(&["fg", "bg abc", "fg %7", "bg 999999"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("fg command requires PID or %jobid argument"),
        "stderr was: {stderr}"
    );
    assert!(
        stderr.contains("bg: argument must be a PID or %jobid"),
        "stderr was: {stderr}"
    );
    assert!(stderr.contains("%7: no such job"), "stderr was: {stderr}");
    assert!(stderr.contains("(999999): no such process"), "stderr was: {stderr}");
}

#[test]
fn bg_on_running_job_is_a_no_op() {
    let output = run_shell(&["sleep 1 &", "bg %1"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already in background"), "stderr was: {stderr}");
}

#[test]
fn full_job_table_rejects_launch() {
    let mut lines = vec!["sleep 2 &"; 17];
    lines.push("jobs");
    let output = run_shell(&lines);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Tried to create too many jobs"), "stderr was: {stderr}");
    let listed = stdout.lines().filter(|l| l.contains(" Running ")).count();
    assert_eq!(listed, 16, "stdout was: {stdout}");
}

#[test]
fn alias_with_trailing_ampersand_runs_in_background() {
    let output = run_shell(&["alias bgs='sleep 1 &'", "bgs", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("Running bgs"), "stdout was: {stdout}");
    assert!(!stderr.contains("invalid time interval"), "stderr was: {stderr}");
}
