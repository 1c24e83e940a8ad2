use std::path::Path;
use std::process::Output;

use assert_cmd::Command;

include!(concat!(env!("OUT_DIR"), "/test_files.rs"));

// These functions are used by the included tests above.
// See `build.rs` for the code that generates the tests.

fn do_test(filename: &Path) {
    let expected = find_expects(filename, "# expect: ");
    let expected_errors = find_expects(filename, "# expect runtime error: ");

    let output = run_file(filename);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stdout = stdout.trim_end();
    let expected = expected.join("\n");
    assert_eq!(stdout, expected, "generated output != expected output");

    let stderr = String::from_utf8(output.stderr).unwrap();
    for fragment in &expected_errors {
        assert!(
            stderr.contains(fragment),
            "stderr does not mention '{fragment}':\n{stderr}"
        );
    }
    if expected_errors.is_empty() {
        assert!(stderr.is_empty(), "unexpected stderr output:\n{stderr}");
    }
}

fn run_file(filename: &Path) -> Output {
    let mut cmd = Command::cargo_bin("loxpp").unwrap();
    cmd.args(["--file", filename.to_str().unwrap()])
        .env("LOXLIB", "tests/data/modules")
        .output()
        .unwrap()
}

fn find_expects(filename: &Path, prefix: &str) -> Vec<String> {
    let content = std::fs::read_to_string(filename)
        .unwrap_or_else(|_| panic!("failed to read {}", filename.display()));

    let mut result = vec![];
    for line in content.lines() {
        let indices: Vec<_> = line.match_indices(prefix).collect();
        if indices.is_empty() {
            continue;
        }

        let (idx, _) = indices.last().unwrap();
        result.push(line[idx + prefix.len()..].to_owned());
    }

    result
}
