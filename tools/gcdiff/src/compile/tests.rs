use super::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn test_from_command_line_splits_words() {
    let compiler = ExternalCompiler::from_command_line("docker run -i fizruk/stella compile").unwrap();
    assert_eq!(compiler, ExternalCompiler::stella_docker());
    assert_eq!(
        ExternalCompiler::from_command_line(DEFAULT_COMPILER_COMMAND),
        Some(ExternalCompiler::stella_docker())
    );
    assert!(ExternalCompiler::from_command_line("   ").is_none());
}

#[test]
fn test_fingerprint_tracks_content() {
    let a = GeneratedCode::new("int main() { return 0; }");
    let b = GeneratedCode::new("int main() { return 0; }");
    let c = GeneratedCode::new("int main() { return 1; }");
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
}

#[test]
fn test_stage_writes_code_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("program.c");
    let code = GeneratedCode::new("/* generated */\n");
    let fingerprint = code.fingerprint();

    let artifact = CompiledArtifact::new("fib", code);
    assert_eq!(artifact.origin(), "fib");
    let staged = artifact.stage(&path).unwrap();

    assert_eq!(staged.path(), path.as_path());
    assert_eq!(staged.fingerprint(), fingerprint);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "/* generated */\n");
}

#[cfg(unix)]
#[test]
fn test_external_compiler_pipes_source_through() {
    let compiler = ExternalCompiler::new("cat", Vec::<String>::new());
    let code = compiler.compile("fn main(n : Nat) -> Nat { return n }\n").unwrap();
    assert_eq!(code.as_str(), "fn main(n : Nat) -> Nat { return n }\n");
}

#[cfg(unix)]
#[test]
fn test_external_compiler_empty_output() {
    let compiler = ExternalCompiler::new("true", Vec::<String>::new());
    let err = compiler.compile("anything").unwrap_err();
    assert!(matches!(err, CompileError::EmptyOutput { .. }), "{err}");
}

#[cfg(unix)]
#[test]
fn test_external_compiler_nonzero_exit() {
    let compiler = ExternalCompiler::new("sh", ["-c", "echo 'syntax error' >&2; exit 3"]);
    let err = compiler.compile("garbage").unwrap_err();
    match &err {
        CompileError::Failed {
            exit_code, stderr, ..
        } => {
            assert_eq!(*exit_code, Some(3));
            assert!(stderr.contains("syntax error"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("exit code 3"), "{message}");
    assert!(message.contains("Compiler stderr"), "{message}");
}

#[test]
fn test_external_compiler_not_found() {
    let compiler = ExternalCompiler::new("gcdiff-no-such-compiler", Vec::<String>::new());
    let err = compiler.compile("x").unwrap_err();
    assert!(matches!(err, CompileError::CompilerNotFound { .. }), "{err}");
}
