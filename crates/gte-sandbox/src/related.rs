//! Naming-convention test discovery

use std::path::{Path, PathBuf};

/// Existing test files that, by naming convention, cover `source_file`
///
/// Python: `test_<stem>.py`, `<stem>_test.py` and `tests/test_<stem>.py`
/// next to the file or one level up. Go: `<stem>_test.go`.
/// TypeScript/JavaScript: `<stem>.test.<ext>`, `<stem>.spec.<ext>` and the
/// same under `__tests__/`.
#[must_use]
pub fn resolve_related_tests(source_file: &Path) -> Vec<PathBuf> {
    let (Some(stem), Some(ext)) = (
        source_file.file_stem().and_then(|s| s.to_str()),
        source_file.extension().and_then(|s| s.to_str()),
    ) else {
        return Vec::new();
    };
    let dir = source_file.parent().unwrap_or_else(|| Path::new(""));

    let candidates: Vec<PathBuf> = match ext {
        "py" => {
            let mut c = vec![
                dir.join(format!("test_{stem}.py")),
                dir.join(format!("{stem}_test.py")),
                dir.join("tests").join(format!("test_{stem}.py")),
            ];
            if let Some(up) = dir.parent() {
                c.push(up.join("tests").join(format!("test_{stem}.py")));
            }
            c
        }
        "go" => vec![dir.join(format!("{stem}_test.go"))],
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => vec![
            dir.join(format!("{stem}.test.{ext}")),
            dir.join(format!("{stem}.spec.{ext}")),
            dir.join("__tests__").join(format!("{stem}.test.{ext}")),
        ],
        _ => Vec::new(),
    };

    let mut found: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        if candidate != source_file && candidate.is_file() && !found.contains(&candidate) {
            found.push(candidate);
        }
    }
    found
}
