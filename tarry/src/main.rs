#[macro_use]
extern crate log;

mod shell;

use anyhow::{anyhow, bail, Context};
use clap::{App, AppSettings, Arg, SubCommand};
use simplelog::{ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::rc::Rc;
use tarry_lang::backend::console::{Console, NullConsole};
use tarry_lang::backend::{run_source, ExecContext, ExecuteReturn};
use tarry_lang::parser::parse;

use crate::shell::ShellConsole;

fn read_source(path: &PathBuf) -> anyhow::Result<String> {
    debug!("Using input file: {}", path.display());
    fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))
}

fn init_logging(verbosity: u64) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut config = ConfigBuilder::new();
    config
        .set_time_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off);
    TermLogger::init(level, config.build(), TerminalMode::Mixed)
        .map_err(|err| anyhow!("Cannot start logging: {:?}", err))
}

fn main() -> anyhow::Result<()> {
    let matches = App::new("tarry")
        .version("0.1.0")
        .author("robot_rover <sam.obrien00@gmail.com>")
        .about("tarry language | interpreter | debugger")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets verbose output"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("interpret a \".tarry\" source file")
                .arg(
                    Arg::with_name("SOURCE")
                        .help("path to the source file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("no-console")
                        .long("no-console")
                        .help("log breakpoints and carry on instead of opening a shell"),
                ),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("parse a \".tarry\" source file without running it")
                .arg(
                    Arg::with_name("SOURCE")
                        .help("path to the source file")
                        .required(true)
                        .index(1),
                ),
        )
        .get_matches();

    init_logging(matches.occurrences_of("v"))?;

    match matches.subcommand() {
        ("run", Some(matches)) => {
            let path = PathBuf::from(matches.value_of("SOURCE").unwrap_or_default());
            let source = read_source(&path)?;
            let console: Rc<dyn Console> = if matches.is_present("no-console") {
                Rc::new(NullConsole)
            } else {
                Rc::new(ShellConsole)
            };
            let ctx = ExecContext {
                stream: None,
                console: Some(console),
            };
            let file_name = path.display().to_string();
            match run_source(&source, &file_name, ctx) {
                ExecuteReturn::Return(value) => info!("program returned {}", value),
                ExecuteReturn::Quit(code) => exit(code),
                ExecuteReturn::Error(err) => bail!("{}", err),
            }
        }
        ("check", Some(matches)) => {
            let path = PathBuf::from(matches.value_of("SOURCE").unwrap_or_default());
            let source = read_source(&path)?;
            match parse(&source, &path.display().to_string()) {
                Ok(program) => println!("{:#?}", program),
                Err(err) => bail!("{}", err),
            }
        }
        _ => println!("{}", matches.usage()),
    }

    Ok(())
}
