#![forbid(unsafe_code)]

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::{Env, Target};
use time::OffsetDateTime;

use treest::app::App;
use treest::commands;
use treest::config::{Args, Config};
use treest::error::Result;
use treest::term;

fn main() {
    init_logging();
    term::install_panic_hook();
    let args = Args::parse();
    if args.keys {
        print!("{}", commands::key_table());
        return;
    }
    let code = match run(args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            eprintln!("treest: {err}");
            1
        }
    };
    process::exit(code);
}

fn run(args: Args) -> Result<i32> {
    let config = Config::from_args(args)?;
    let mut app = App::new(config)?;
    app.run()
}

/// The terminal is raw while browsing, so records only go to the file
/// named by `TREEST_DEBUG_LOG`.
fn init_logging() {
    let Some(path) = env::var_os("TREEST_DEBUG_LOG") else {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("off")).try_init();
        return;
    };
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("treest: cannot open log {}: {err}", path.to_string_lossy());
            return;
        }
    };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}: {}",
                OffsetDateTime::now_utc(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
