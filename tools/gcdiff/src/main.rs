//! gcdiff CLI
//!
//! Builds every test program twice, with and without garbage collection,
//! and checks that both builds print the same bytes for every input.

use std::io::Write;
use std::path::Path;

use gcdiff::config::parse_deadline;
use gcdiff::report::write_summary;
use gcdiff::{Harness, HarnessConfig, Registry, TestCase, ToolchainConfig};

fn main() {
    gcdiff::init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();

    // `gcdiff` and `gcdiff --filter=fib` both mean `gcdiff run ...`.
    let (command, rest) = match args.first().map(String::as_str) {
        None => ("run", &args[..]),
        Some(arg) if arg.starts_with('-') && !is_meta_flag(arg) => ("run", &args[..]),
        Some(arg) => (arg, &args[1..]),
    };

    match command {
        "run" => {
            let options = parse_options(rest);
            let registry = registry_for(&options);
            run(&options.config, &registry);
        }
        "list" => {
            let options = parse_options(rest);
            let registry = registry_for(&options);
            list(&registry, options.config.filter.as_deref());
        }
        "help" | "--help" | "-h" => print_usage(),
        "version" | "--version" => {
            println!("gcdiff {}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn is_meta_flag(arg: &str) -> bool {
    matches!(arg, "--help" | "-h" | "--version")
}

struct Options {
    config: HarnessConfig,
    /// `--case` specs; when present they replace the standard registry.
    cases: Vec<String>,
}

fn parse_options(args: &[String]) -> Options {
    let mut config = HarnessConfig::default();
    let mut cases = Vec::new();

    for arg in args {
        if let Some(root) = arg.strip_prefix("--root=") {
            config.fixture_root = root.into();
        } else if let Some(filter) = arg.strip_prefix("--filter=") {
            config.filter = Some(filter.to_string());
        } else if let Some(spec) = arg.strip_prefix("--case=") {
            cases.push(spec.to_string());
        } else if let Some(value) = arg.strip_prefix("--timeout=") {
            match parse_deadline(value) {
                Ok(Some(deadline)) => config.deadlines.collecting = deadline,
                Ok(None) => fail("--timeout cannot be `none`: the collecting variant is always bounded"),
                Err(e) => fail(&e.to_string()),
            }
        } else if let Some(value) = arg.strip_prefix("--baseline-timeout=") {
            match parse_deadline(value) {
                Ok(deadline) => config.deadlines.baseline = deadline,
                Err(e) => fail(&e.to_string()),
            }
        } else if let Some(dir) = arg.strip_prefix("--scratch=") {
            config.scratch_root = Some(dir.into());
        } else if arg == "--keep-artifacts" {
            config.keep_artifacts = true;
        } else if arg == "--no-parallel" {
            config.parallel = false;
        } else if arg == "--verbose" || arg == "-v" {
            config.verbose = true;
        } else {
            fail(&format!("unknown option '{arg}'"));
        }
    }

    match ToolchainConfig::from_env() {
        Ok(toolchain) => config.toolchain = toolchain,
        Err(e) => fail(&e.to_string()),
    }

    Options { config, cases }
}

fn registry_for(options: &Options) -> Registry {
    let root = options.config.fixture_root();
    if options.cases.is_empty() {
        return Registry::standard(root);
    }

    let mut registry = Registry::new();
    for spec in &options.cases {
        let registered = TestCase::parse_spec(root, spec).and_then(|case| registry.register(case));
        if let Err(e) = registered {
            fail(&e.to_string());
        }
    }
    registry
}

fn run(config: &HarnessConfig, registry: &Registry) {
    let root = config.fixture_root();
    if !root.is_dir() {
        eprintln!("Fixture directory not found: {}", root.display());
        std::process::exit(1);
    }

    let summary = Harness::from_config(config).run(registry);

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = write_summary(&mut stdout, &summary, config.verbose).and_then(|()| stdout.flush()) {
        eprintln!("error: failed to write report: {e}");
    }
    std::process::exit(summary.exit_code());
}

fn list(registry: &Registry, filter: Option<&str>) {
    for case in registry.select(filter) {
        let inputs: Vec<String> = case.inputs().iter().map(ToString::to_string).collect();
        println!(
            "{:<12} inputs: {:<16} heap: {} bytes  ({})",
            case.name(),
            inputs.join(", "),
            case.heap_budget_bytes(),
            display_source(case.source())
        );
    }
}

fn display_source(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{}, missing", path.display())
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    eprintln!("Run `gcdiff help` for usage.");
    std::process::exit(1);
}

fn print_usage() {
    println!("gcdiff - differential testing for garbage collectors");
    println!();
    println!("Usage: gcdiff [command] [options]");
    println!();
    println!("Commands:");
    println!("  run                  Check every test case (default)");
    println!("  list                 List test cases without running them");
    println!("  help                 Show this help message");
    println!("  version              Show version information");
    println!();
    println!("Options:");
    println!("  --root=<dir>             Directory holding <name>.st sources (default: testdata)");
    println!("  --case=<name:inputs[@budget]>");
    println!("                           Declare a test case, e.g. fib:1,10 or factorial:1,2@16384");
    println!("                           (repeatable; replaces the standard cases)");
    println!("  --filter=<pattern>       Only run cases whose name contains pattern");
    println!("  --timeout=<dur>          Deadline for the collecting variant (default: 3s)");
    println!("  --baseline-timeout=<dur> Deadline for the baseline, or `none` (default: 60s)");
    println!("  --scratch=<dir>          Where per-case build directories are created");
    println!("  --keep-artifacts         Keep generated code and binaries after each case");
    println!("  --no-parallel            Run test cases sequentially");
    println!("  --verbose, -v            Also list passing inputs");
    println!();
    println!("Durations: `3`, `3s` or `500ms`.");
    println!();
    println!("Environment:");
    println!("  GCDIFF_COMPILER      Compile command (default: docker run -i fizruk/stella compile)");
    println!("  GCDIFF_CC            C compiler (default: gcc)");
    println!("  GCDIFF_RUNTIME_DIR   Directory holding runtime.c and gc.c (default: stella)");
    println!("  RUST_LOG             Enable diagnostic logging, e.g. RUST_LOG=gcdiff=debug");
    println!();
    println!("Exit status: 0 all inputs pass, 1 any failure, 2 no test cases selected.");
}
