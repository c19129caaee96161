#![cfg(unix)]

use gte_sandbox::{
    CommandRunner, LanguageCommands, SandboxValidator, Tier, ValidationConfig,
};
use gte_syntax::Language;
use std::path::Path;
use std::time::Duration;

fn python_config(commands: LanguageCommands) -> ValidationConfig {
    ValidationConfig {
        commands,
        ..ValidationConfig::for_language(Language::Python)
    }
}

fn cmd(s: &str) -> Option<String> {
    Some(s.to_string())
}

#[tokio::test]
async fn syntax_failure_short_circuits() {
    let config = ValidationConfig {
        run_linter: true,
        run_tests: true,
        run_type_check: true,
        ..python_config(LanguageCommands {
            syntax: cmd("true"),
            lint: cmd("true"),
            test: cmd("true"),
            type_check: cmd("true"),
        })
    };

    let result = SandboxValidator::new()
        .validate("def broken(:\n    pass\n", Path::new("src/app.py"), &config)
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!(result.failed_tier(), Some(Tier::Syntax));
    assert_eq!(result.checks.len(), 1);
    assert!(!result.ran(Tier::Lint));
}

#[tokio::test]
async fn failing_syntax_command_short_circuits() {
    let config = ValidationConfig {
        run_linter: true,
        ..python_config(LanguageCommands {
            syntax: cmd("false"),
            lint: cmd("true"),
            ..LanguageCommands::default()
        })
    };

    let result = SandboxValidator::new()
        .validate("x = 1\n", Path::new("app.py"), &config)
        .await
        .unwrap();

    assert_eq!(result.failed_tier(), Some(Tier::Syntax));
    assert!(!result.ran(Tier::Lint));
}

#[tokio::test]
async fn lint_failure_does_not_stop_later_tiers() {
    let config = ValidationConfig {
        run_linter: true,
        run_tests: true,
        run_type_check: true,
        test_scope: vec!["test_app.py".to_string()],
        ..python_config(LanguageCommands {
            syntax: None,
            lint: cmd("false"),
            test: cmd("true"),
            type_check: cmd("true"),
        })
    };

    let result = SandboxValidator::new()
        .validate("x = 1\n", Path::new("app.py"), &config)
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!(result.failed_tier(), Some(Tier::Lint));
    assert!(result.ran(Tier::Tests));
    assert!(result.ran(Tier::TypeCheck));
}

#[tokio::test]
async fn disabled_tiers_do_not_run() {
    let config = python_config(LanguageCommands {
        lint: cmd("false"),
        test: cmd("false"),
        ..LanguageCommands::default()
    });

    let result = SandboxValidator::new()
        .validate("x = 1\n", Path::new("app.py"), &config)
        .await
        .unwrap();

    assert!(result.passed);
    assert_eq!(result.checks.keys().copied().collect::<Vec<_>>(), vec![Tier::Syntax]);
}

#[tokio::test]
async fn tests_tier_needs_a_scope() {
    let config = ValidationConfig {
        run_tests: true,
        ..python_config(LanguageCommands {
            test: cmd("sh -c 'echo ran:$0; exit 5' {scope}"),
            ..LanguageCommands::default()
        })
    };

    let result = SandboxValidator::new()
        .validate("x = 1\n", Path::new("calc.py"), &config)
        .await
        .unwrap();

    assert!(result.passed, "{:?}", result.checks);
    assert!(!result.ran(Tier::Tests));
    assert_eq!(result.failed_tier(), None);
}

#[tokio::test]
async fn tests_tier_receives_the_scope() {
    let config = ValidationConfig {
        run_tests: true,
        test_scope: vec!["test_calc.py".to_string()],
        ..python_config(LanguageCommands {
            test: cmd("sh -c 'test \"$0\" = test_calc.py' {scope}"),
            ..LanguageCommands::default()
        })
    };

    let result = SandboxValidator::new()
        .validate("x = 1\n", Path::new("calc.py"), &config)
        .await
        .unwrap();

    assert!(result.ran(Tier::Tests));
    assert!(result.passed, "{:?}", result.checks);
}

#[tokio::test]
async fn missing_binary_is_a_failed_check() {
    let config = ValidationConfig {
        run_linter: true,
        ..python_config(LanguageCommands {
            lint: cmd("gte-definitely-not-installed {file}"),
            ..LanguageCommands::default()
        })
    };

    let result = SandboxValidator::new()
        .validate("x = 1\n", Path::new("app.py"), &config)
        .await
        .unwrap();

    assert!(!result.passed);
    let lint = &result.checks[&Tier::Lint];
    assert!(lint.output.contains("command not found"), "{}", lint.output);
}

#[tokio::test]
async fn timeout_is_a_failed_check() {
    let config = ValidationConfig {
        run_tests: true,
        test_scope: vec!["test_app.py".to_string()],
        ..python_config(LanguageCommands {
            test: cmd("sleep 5"),
            ..LanguageCommands::default()
        })
    }
    .with_timeout(Duration::from_millis(100));

    let result = SandboxValidator::new()
        .validate("x = 1\n", Path::new("app.py"), &config)
        .await
        .unwrap();

    assert_eq!(result.failed_tier(), Some(Tier::Tests));
    assert!(result.checks[&Tier::Tests].output.contains("timed out"));
}

#[tokio::test]
async fn commands_see_only_the_candidate() {
    let config = ValidationConfig {
        run_tests: true,
        test_scope: vec!["notes.txt".to_string()],
        ..ValidationConfig {
            commands: LanguageCommands {
                // Passes only if the sandbox holds exactly the candidate file.
                test: cmd("sh -c 'test \"$(ls)\" = \"notes.txt\" && grep -q hello notes.txt'"),
                ..LanguageCommands::default()
            },
            ..ValidationConfig::default()
        }
    };

    let result = SandboxValidator::new()
        .validate("hello\n", Path::new("/repo/docs/notes.txt"), &config)
        .await
        .unwrap();

    assert!(result.passed, "{:?}", result.checks);
}

#[tokio::test]
async fn runner_reports_exit_code_and_output() {
    let runner = CommandRunner::new(Duration::from_secs(5));
    let argv: Vec<String> = ["sh", "-c", "echo out; echo err >&2; exit 3"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let out = runner.run(&argv, Path::new(".")).await;

    assert!(!out.success);
    assert_eq!(out.exit_code, Some(3));
    assert_eq!(out.output, "out\n\nerr");
}
