use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./demos/greeter.lox";
const EXPECTED: Expected = Expected {
    stdout: "hi world\n",
    stderr: "",
};

#[test]
fn run_greeter() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), EXPECTED)
}
