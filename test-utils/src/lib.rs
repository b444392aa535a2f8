use std::{
    error::Error,
    path::Path,
    process::{Command, Output},
    str,
};

const LOX_PATH: &str = "./target/debug/lox";

pub struct Expected<'a> {
    pub stdout: &'a str,
    pub stderr: &'a str,
}

impl<'a> Expected<'a> {
    fn assert_matches(self, output: &Output) -> Result<(), Box<dyn Error>> {
        assert_eq!(str::from_utf8(&output.stdout)?, self.stdout);
        assert_eq!(str::from_utf8(&output.stderr)?, self.stderr);
        Ok(())
    }
}

fn run_interpreter(src_path: &Path) -> Result<Output, Box<dyn Error>> {
    Ok(Command::new(LOX_PATH).arg(src_path).output()?)
}

/// Run a source file through the interpreter and compare the exact
/// stdout/stderr against the expectation.
pub fn check_run(src_path: &Path, expected: Expected) -> Result<(), Box<dyn Error>> {
    let output = run_interpreter(src_path)?;

    expected.assert_matches(&output)?;
    assert!(
        output.status.success(),
        "lox exited with status {:?}",
        output.status.code()
    );

    Ok(())
}

/// Run a source file that should produce a diagnostic and assert that it
/// shows up on stderr. Language-level errors do not change the exit code.
pub fn check_diagnostic(src_path: &Path, fragment: &str) -> Result<(), Box<dyn Error>> {
    let output = run_interpreter(src_path)?;

    let stderr = str::from_utf8(&output.stderr)?;
    assert!(
        stderr.contains(fragment),
        "expected diagnostic containing '{fragment}', got: {stderr}"
    );
    assert!(
        output.status.success(),
        "lox exited with status {:?}",
        output.status.code()
    );

    Ok(())
}
