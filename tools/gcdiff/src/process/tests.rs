use super::*;
use crate::testing::write_script;
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

fn script(body: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("variant.out");
    write_script(&path, body).unwrap();
    (dir, path)
}

#[test]
fn test_stdin_is_delivered_and_closed() {
    // `cat` only terminates once stdin reaches end-of-input.
    let (_dir, path) = script("cat\n");
    let result = run_program(&path, b"150", None).unwrap();
    assert_eq!(result.stdout, b"150");
    assert_eq!(result.exit_code, 0);
    assert!(!result.timed_out);
    assert!(result.succeeded());
}

#[test]
fn test_stdout_captured_byte_for_byte() {
    let (_dir, path) = script("printf 'a\\377\\000b\\n'\n");
    let result = run_program(&path, b"", None).unwrap();
    assert_eq!(result.stdout, vec![b'a', 0xff, 0x00, b'b', b'\n']);
}

#[test]
fn test_stderr_kept_apart_from_stdout() {
    let (_dir, path) = script("echo out\necho err >&2\n");
    let result = run_program(&path, b"", None).unwrap();
    assert_eq!(result.stdout, b"out\n");
    assert_eq!(result.stderr, b"err\n");
}

#[test]
fn test_nonzero_exit_code() {
    let (_dir, path) = script("read n\necho \"$n\"\nexit 3\n");
    let result = run_program(&path, b"7", Some(Duration::from_secs(10))).unwrap();
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.signal, None);
    assert_eq!(result.stdout, b"7\n");
    assert!(!result.succeeded());
}

#[test]
fn test_killed_by_signal() {
    let (_dir, path) = script("kill -9 $$\n");
    let result = run_program(&path, b"", None).unwrap();
    assert_eq!(result.signal, Some(9));
    assert_eq!(result.exit_code, 128 + 9);
    assert!(!result.succeeded());
}

#[test]
fn test_deadline_kills_hung_child() {
    let (_dir, path) = script("exec sleep 30\n");
    let start = Instant::now();
    let result = run_program(&path, b"1", Some(Duration::from_millis(200))).unwrap();

    assert!(result.timed_out);
    assert!(!result.succeeded());
    assert!(start.elapsed() < Duration::from_secs(10), "{:?}", start.elapsed());
    assert!(result.elapsed >= Duration::from_millis(200));
}

#[test]
fn test_deadline_bounds_forked_subprocesses() {
    // The shell is killed, but the background sleeps keep both pipes open.
    let (_dir, path) = script("echo started\nsleep 30 &\nsleep 30\n");
    let start = Instant::now();
    let result = run_program(&path, b"1", Some(Duration::from_millis(200))).unwrap();

    assert!(result.timed_out);
    assert!(start.elapsed() < Duration::from_secs(5), "{:?}", start.elapsed());
    assert_eq!(result.stdout, b"started\n");
}

#[test]
fn test_output_held_open_past_deadline_is_a_timeout() {
    // The shell exits at once; its background child still holds stdout.
    let (_dir, path) = script("echo done\nsleep 30 &\n");
    let start = Instant::now();
    let result = run_program(&path, b"1", Some(Duration::from_millis(300))).unwrap();

    assert!(result.timed_out);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, b"done\n");
    assert!(start.elapsed() < Duration::from_secs(5), "{:?}", start.elapsed());
}

#[test]
fn test_unrepresentable_deadline_is_unbounded() {
    let (_dir, path) = script("cat\n");
    let result = run_program(&path, b"1", Some(Duration::from_secs(u64::MAX))).unwrap();
    assert!(!result.timed_out);
    assert_eq!(result.stdout, b"1");
}

#[test]
fn test_deadline_not_hit_by_fast_child() {
    let (_dir, path) = script("cat\n");
    let result = run_program(&path, b"10", Some(Duration::from_secs(10))).unwrap();
    assert!(!result.timed_out);
    assert_eq!(result.stdout, b"10");
}

#[test]
fn test_missing_executable() {
    let dir = tempdir().unwrap();
    let err = run_program(&dir.path().join("absent.out"), b"1", None).unwrap_err();
    assert!(matches!(err, RunError::Spawn { .. }), "{err}");
}
