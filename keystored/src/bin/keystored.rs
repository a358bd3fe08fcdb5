//! This is the primary binary for the keystore daemon.

#![deny(rust_2018_idioms)]

use libc::gid_t;
use nix::unistd::Gid;
use simplelog::{Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use std::env;
use std::process;
use std::str::FromStr;

use keystored::error::{self, Result};
use keystored::serve;

const DEFAULT_SOCKET_PATH: &str = "/run/keystore.sock";

/// Stores user-supplied arguments.
struct Args {
    log_level: LevelFilter,
    socket_gid: Option<Gid>,
    socket_path: String,
}

/// Informs the user about proper usage of the program and exits.
fn usage() -> ! {
    let program_name = env::args().next().unwrap_or_else(|| "program".to_string());
    eprintln!(
        r"Usage: {}
            [ --socket-path PATH ]
            [ --socket-gid GROUP_ID ]
            [ --log-level trace|debug|info|warn|error ]

    Socket path defaults to {}",
        program_name, DEFAULT_SOCKET_PATH
    );
    process::exit(2);
}

/// Prints a more specific message before exiting through usage().
fn usage_msg<S: AsRef<str>>(msg: S) -> ! {
    eprintln!("{}\n", msg.as_ref());
    usage();
}

/// Parses user arguments into an Args structure.
fn parse_args(args: env::Args) -> Args {
    let mut log_level = None;
    let mut socket_gid = None;
    let mut socket_path = None;

    let mut iter = args.skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--log-level" => {
                let log_level_str = iter
                    .next()
                    .unwrap_or_else(|| usage_msg("Did not give argument to --log-level"));
                log_level = Some(LevelFilter::from_str(&log_level_str).unwrap_or_else(|_| {
                    usage_msg(format!("Invalid log level '{}'", log_level_str))
                }));
            }

            "--socket-path" => {
                socket_path = Some(
                    iter.next()
                        .unwrap_or_else(|| usage_msg("Did not give argument to --socket-path")),
                )
            }

            "--socket-gid" => {
                let gid_str = iter
                    .next()
                    .unwrap_or_else(|| usage_msg("Did not give argument to --socket-gid"));
                let gid = gid_str.parse::<gid_t>().unwrap_or_else(|e| {
                    usage_msg(format!(
                        "Invalid group ID '{}' given to --socket-gid: {}",
                        gid_str, e
                    ))
                });
                socket_gid = Some(Gid::from_raw(gid));
            }

            _ => usage(),
        }
    }

    Args {
        socket_gid,
        log_level: log_level.unwrap_or(LevelFilter::Info),
        socket_path: socket_path.unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_string()),
    }
}

fn run() -> Result<()> {
    let args = parse_args(env::args());

    TermLogger::init(args.log_level, LogConfig::default(), TerminalMode::Mixed)
        .map_err(|_| error::Error::Usage {
            msg: "failed to initialize logger".to_string(),
        })?;

    log::info!(
        "starting keystored at {} (one thread per connection)",
        &args.socket_path,
    );

    serve(&args.socket_path, args.socket_gid)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}
