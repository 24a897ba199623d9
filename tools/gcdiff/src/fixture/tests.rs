use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_input_encodes_as_decimal() {
    assert_eq!(Input::new(0).encode(), "0");
    assert_eq!(Input::new(150).encode(), "150");
    assert_eq!(Input::from(42).to_string(), "42");
}

#[test]
fn test_case_resolves_source_by_convention() {
    let case = TestCase::at_root(Path::new("testdata"), "fib", [1, 10]);
    assert_eq!(case.source(), Path::new("testdata/fib.st"));
    assert_eq!(case.inputs(), &[Input::new(1), Input::new(10)]);
}

#[test]
fn test_case_heap_budget_defaults() {
    let case = TestCase::at_root(Path::new("t"), "id", [1]);
    assert_eq!(case.heap_budget_override(), None);
    assert_eq!(case.heap_budget_bytes(), DEFAULT_HEAP_BUDGET_BYTES);

    let case = case.with_heap_budget(4096);
    assert_eq!(case.heap_budget_override(), Some(4096));
    assert_eq!(case.heap_budget_bytes(), 4096);
}

#[test]
fn test_parse_spec_inputs_only() {
    let case = TestCase::parse_spec(Path::new("root"), "fib:1, 10").unwrap();
    assert_eq!(case.name(), "fib");
    assert_eq!(case.source(), Path::new("root/fib.st"));
    assert_eq!(case.inputs(), &[Input::new(1), Input::new(10)]);
    assert_eq!(case.heap_budget_override(), None);
}

#[test]
fn test_parse_spec_with_budget() {
    let case = TestCase::parse_spec(Path::new("root"), "factorial:1,2,3,5@16384").unwrap();
    assert_eq!(case.inputs().len(), 4);
    assert_eq!(case.heap_budget_bytes(), 16384);
}

#[test]
fn test_parse_spec_rejects_malformed() {
    let root = Path::new("root");
    assert!(matches!(
        TestCase::parse_spec(root, "fib"),
        Err(FixtureError::InvalidSpec { .. })
    ));
    assert!(matches!(
        TestCase::parse_spec(root, ":1,2"),
        Err(FixtureError::InvalidSpec { .. })
    ));
    assert!(matches!(
        TestCase::parse_spec(root, "fib:one"),
        Err(FixtureError::InvalidSpec { .. })
    ));
    assert!(matches!(
        TestCase::parse_spec(root, "fib:1@lots"),
        Err(FixtureError::InvalidSpec { .. })
    ));
    assert_eq!(
        TestCase::parse_spec(root, "fib:"),
        Err(FixtureError::NoInputs {
            name: "fib".to_string()
        })
    );
}

#[test]
fn test_standard_registry() {
    let registry = Registry::standard(Path::new("testdata"));
    let names: Vec<_> = registry.cases().iter().map(TestCase::name).collect();
    assert_eq!(names, vec!["fib", "id", "factorial"]);

    let id = registry.get("id").unwrap();
    let inputs: Vec<u64> = id.inputs().iter().map(|i| i.value()).collect();
    assert_eq!(inputs, vec![1, 10, 30, 150]);

    let factorial = registry.get("factorial").unwrap();
    assert_eq!(factorial.heap_budget_bytes(), 16 * 1024);
}

#[test]
fn test_register_rejects_duplicates_and_empty_inputs() {
    let root = Path::new("t");
    let mut registry = Registry::new();
    registry.register(TestCase::at_root(root, "fib", [1])).unwrap();

    assert_eq!(
        registry.register(TestCase::at_root(root, "fib", [2])),
        Err(FixtureError::Duplicate {
            name: "fib".to_string()
        })
    );
    assert_eq!(
        registry.register(TestCase::at_root(root, "empty", [])),
        Err(FixtureError::NoInputs {
            name: "empty".to_string()
        })
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_select_filters_by_substring_in_order() {
    let registry = Registry::standard(Path::new("t"));
    assert_eq!(registry.select(None).len(), 3);

    let selected: Vec<_> = registry.select(Some("i")).iter().map(|c| c.name()).collect();
    assert_eq!(selected, vec!["fib", "id", "factorial"]);

    let selected: Vec<_> = registry.select(Some("fact")).iter().map(|c| c.name()).collect();
    assert_eq!(selected, vec!["factorial"]);

    assert!(registry.select(Some("nope")).is_empty());
}
