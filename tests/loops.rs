use std::{error::Error, path::Path};

use test_utils::{check_run, Expected};

const SRC_PATH: &str = "./demos/for.lox";
const EXPECTED: Expected = Expected {
    stdout: "0\n1\n2\n",
    stderr: "",
};

#[test]
fn run_for_loop() -> Result<(), Box<dyn Error>> {
    check_run(Path::new(SRC_PATH), EXPECTED)
}
