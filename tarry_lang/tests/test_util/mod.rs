#![allow(dead_code)]
use serde::{Deserialize, Serialize};
use std::{fmt, fs, io, path::PathBuf, rc::Rc};

use tarry_lang::backend::console::{Reply, ScriptedConsole, SessionEntry};
use tarry_lang::backend::object::Value;
use tarry_lang::backend::{run_source, ExecContext, ExecuteReturn};

const RESOURCES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../resources");
const TARGET: &str = env!("CARGO_TARGET_TMPDIR");

pub fn init_logging() {
    // Several tests in one binary all try this; only the first succeeds.
    let _ = simple_logger::init_with_level(log::Level::Debug);
}

pub fn program(name: &str) -> String {
    let path = PathBuf::from(RESOURCES).join(format!("{}.tarry", name));
    fs::read_to_string(&path).unwrap_or_else(|err| panic!("Cannot read {:?}: {}", path, err))
}

pub struct Run {
    pub result: ExecuteReturn,
    pub output: String,
    pub transcript: Vec<SessionEntry>,
    pub unread: usize,
}

impl Run {
    /// Value of the `index`th session reply, panicking on anything else.
    pub fn reply(&self, index: usize) -> &Value {
        match &self.transcript[index].reply {
            Reply::Value(value) => value,
            other => panic!(
                "line {:?} gave {:?}",
                self.transcript[index].source, other
            ),
        }
    }

    pub fn depths(&self) -> Vec<usize> {
        self.transcript.iter().map(|entry| entry.depth).collect()
    }
}

pub fn run_scripted(source: &str, script: &[&str]) -> Run {
    run_with_console(source, ScriptedConsole::new(script.iter().copied()))
}

pub fn run_with_console(source: &str, console: ScriptedConsole) -> Run {
    init_logging();
    let console = Rc::new(console);
    let mut output = Vec::new();
    let ctx = ExecContext {
        stream: Some(&mut output),
        console: Some(console.clone()),
    };
    let result = run_source(source, "test.tarry", ctx);
    Run {
        result,
        output: String::from_utf8(output).expect("Invalid UTF8 in test output"),
        transcript: console.take_transcript(),
        unread: console.remaining(),
    }
}

/// Compare `actual` against `resources/<test_mod>/<test_tag>.json`. The
/// actual value is written next to the build output for inspection.
pub fn compare_test<T, F>(actual: &T, test_mod: &str, test_tag: &str, compare_fn: F)
where
    for<'a> T: Serialize + Deserialize<'a>,
    F: FnOnce(&T, &T),
{
    let actual_mod_dir = format!("{TARGET}/{test_mod}");
    fs::create_dir_all(&actual_mod_dir).unwrap();

    let expect_file = format!("{RESOURCES}/{test_mod}/{test_tag}.json");
    let actual_file = format!("{actual_mod_dir}/{test_tag}-actual.json");

    let mut out_stream = io::BufWriter::new(
        fs::File::create(actual_file).expect("Cannot open actual output json"),
    );
    serde_json::to_writer_pretty(&mut out_stream, &actual)
        .expect("Cannot serialize actual output json");

    let mut in_stream = io::BufReader::new(
        fs::File::open(&expect_file)
            .unwrap_or_else(|_| panic!("Cannot find expected output json {}", expect_file)),
    );
    let expected =
        serde_json::from_reader::<_, T>(&mut in_stream).expect("Cannot parse expected output json");

    compare_fn(&expected, actual);
}

pub fn compare_test_eq<T>(actual: &T, test_mod: &str, test_tag: &str)
where
    for<'a> T: Serialize + Deserialize<'a> + PartialEq + fmt::Debug,
{
    compare_test(actual, test_mod, test_tag, |lhs: &T, rhs: &T| {
        assert_eq!(lhs, rhs, "Compare Test failed {test_mod}/{test_tag}")
    });
}
