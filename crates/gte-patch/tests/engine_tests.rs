use gte_patch::{backup_path_for, PatchContext, PatchEngine, PatchError, PatchStrategy};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn read(path: &PathBuf) -> String {
    std::fs::read_to_string(path).unwrap()
}

const CALC: &str = "\
import math


def add(a, b):
    return a + b


def subtract(a, b):
    return a - b


class Circle:
    def area(self, r):
        return math.pi * r * r
";

#[test]
fn structural_patch_leaves_other_declarations_untouched() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "calc.py", CALC);
    let engine = PatchEngine::default();

    let applied = engine
        .try_apply(
            &file,
            "def area(self, r):\n    return math.pi * r ** 2\n",
            Some(&PatchContext::symbol("area")),
        )
        .unwrap();

    assert_eq!(applied.strategy, PatchStrategy::Structural);
    assert_eq!(read(&file), CALC.replace("math.pi * r * r", "math.pi * r ** 2"));
}

#[test]
fn comment_in_replacement_is_preserved() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "calc.py", CALC);
    let engine = PatchEngine::default();

    let applied = engine
        .try_apply(
            &file,
            "def add(a, b):\n    # Added comment\n    return a + b\n",
            Some(&PatchContext::symbol("add")),
        )
        .unwrap();

    assert_eq!(applied.strategy, PatchStrategy::Textual);
    let content = read(&file);
    assert!(content.contains("    # Added comment\n    return a + b\n"));
    assert!(content.contains("def subtract(a, b):"));
}

#[test]
fn header_match_without_symbol() {
    let dir = TempDir::new().unwrap();
    let source = "\ndef greet(name):\n    print(f\"Hello {name}\")\n\ndef farewell(name):\n    print(f\"Goodbye {name}\")\n";
    let file = write(&dir, "utils.py", source);
    let engine = PatchEngine::default();

    let result = engine.apply(&file, "def greet(name):\n    print(f\"Hi {name}\")\n", None);

    assert!(result.success, "{:?}", result.error);
    let content = read(&file);
    assert!(content.contains("print(f\"Hi {name}\")"));
    assert!(content.contains("print(f\"Goodbye {name}\")"));
}

#[test]
fn unknown_symbol_without_match_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let source = "# comment\nfoo = 1\nbar = 2\n";
    let file = write(&dir, "test.py", source);
    let engine = PatchEngine::default();

    let err = engine
        .try_apply(&file, "foo = 2", Some(&PatchContext::symbol("baz")))
        .unwrap_err();

    assert!(matches!(err, PatchError::AnchorNotFound { ref symbol } if symbol == "baz"));
    assert!(err.is_contextual());
    assert!(err.to_string().contains("no matching region"));
    assert_eq!(read(&file), source);
    assert!(!engine.has_backup(&file));
}

#[test]
fn low_similarity_is_not_replaced() {
    let dir = TempDir::new().unwrap();
    let source = "def run():\n    return load_configuration_from_disk(path, strict=True)\n";
    let file = write(&dir, "job.py", source);
    let engine = PatchEngine::default();

    let err = engine.try_apply(&file, "def run():\n    pass\n", None).unwrap_err();

    match err {
        PatchError::NoMatchingRegion { best_score } => assert!(best_score <= 0.6),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(read(&file), source);
}

#[test]
fn restore_returns_original_bytes_and_removes_backup() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "calc.py", CALC);
    let engine = PatchEngine::default();

    engine
        .try_apply(
            &file,
            "def subtract(a, b):\n    return b - a\n",
            Some(&PatchContext::symbol("subtract")),
        )
        .unwrap();
    assert!(engine.has_backup(&file));
    assert_ne!(read(&file), CALC);

    engine.restore(&file).unwrap();

    assert_eq!(read(&file), CALC);
    assert!(!engine.has_backup(&file));
    assert!(!backup_path_for(&file).exists());
}

#[test]
fn cleanup_keeps_new_content() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "calc.py", CALC);
    let engine = PatchEngine::default();

    let applied = engine
        .try_apply(
            &file,
            "def add(a, b):\n    return b + a\n",
            Some(&PatchContext::symbol("add")),
        )
        .unwrap();

    assert!(engine.cleanup(&file).unwrap());
    assert_eq!(read(&file), applied.content);
    assert!(matches!(engine.restore(&file), Err(PatchError::NoBackup(_))));
}

#[test]
fn syntax_error_is_reported_not_written() {
    let dir = TempDir::new().unwrap();
    let source = "fn total(a: u32) -> u32 {\n    a + 1\n}\n";
    let file = write(&dir, "lib.rs", source);
    let engine = PatchEngine::default();

    let err = engine
        .try_apply(&file, "fn total(a: u32) -> u32 {\n    a + \n", None)
        .unwrap_err();

    assert!(matches!(err, PatchError::Syntax { .. }), "{err}");
    assert_eq!(read(&file), source);
    assert!(!engine.has_backup(&file));
}

#[test]
fn snippet_anchor_renames_declaration() {
    let dir = TempDir::new().unwrap();
    let source = "def calculate_old():\n    x = 1\n    y = 2\n    return x + y\n\n\ndef keep():\n    return 0\n";
    let file = write(&dir, "risk.py", source);
    let engine = PatchEngine::default();
    let ctx = PatchContext::symbol("calculate_risk")
        .with_snippet("def calculate_old():\n    x = 1\n    y = 2\n    return x + y");

    let applied = engine
        .try_apply(&file, "def calculate_new():\n    return 0", Some(&ctx))
        .unwrap();

    assert_eq!(applied.strategy, PatchStrategy::Structural);
    assert_eq!(
        read(&file),
        "def calculate_new():\n    return 0\n\n\ndef keep():\n    return 0\n"
    );
}

#[test]
fn typescript_exported_function() {
    let dir = TempDir::new().unwrap();
    let source = "export function sum(xs: number[]): number {\n  return xs.length;\n}\n\nexport const zero = 0;\n";
    let file = write(&dir, "sum.ts", source);
    let engine = PatchEngine::default();

    let applied = engine
        .try_apply(
            &file,
            "export function sum(xs: number[]): number {\n  return xs.reduce((a, b) => a + b, 0);\n}\n",
            Some(&PatchContext::symbol("sum")),
        )
        .unwrap();

    assert_eq!(applied.strategy, PatchStrategy::Structural);
    assert_eq!(
        read(&file),
        "export function sum(xs: number[]): number {\n  return xs.reduce((a, b) => a + b, 0);\n}\n\nexport const zero = 0;\n"
    );
}

#[test]
fn unsupported_extension_uses_textual_fallback() {
    let dir = TempDir::new().unwrap();
    let source = "server {\n    port 8080\n}\nlog {\n    level info\n}\n";
    let file = write(&dir, "app.conf", source);
    let engine = PatchEngine::default();

    let applied = engine
        .try_apply(&file, "server {\n    port 8081\n}", None)
        .unwrap();

    assert_eq!(applied.strategy, PatchStrategy::Textual);
    assert_eq!(read(&file), "server {\n    port 8081\n}\nlog {\n    level info\n}\n");
}

#[test]
fn diff_of_applied_patch() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "calc.py", CALC);
    let engine = PatchEngine::default();

    let applied = engine
        .try_apply(
            &file,
            "def add(a, b):\n    return b + a\n",
            Some(&PatchContext::symbol("add")),
        )
        .unwrap();
    let diff = applied.diff();

    assert!(diff.contains("--- a/calc.py"));
    assert!(diff.contains("-    return a + b\n+    return b + a\n"));
}
