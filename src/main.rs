//! replkit: line-oriented front-end over the command engine.
//!
//! Usage:
//!   replkit                 read lines from stdin, one execution per logical line
//!   replkit -c LINE         execute a single line
//!   replkit FILE            execute a script file
//!   replkit --dump-config   print the merged configuration as TOML
//!
//! Output goes to stdout, errors to stderr. The exit status is 1 if any
//! line produced an error.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use replkit::config::Config;
use replkit::{Engine, logging, parse};

enum Mode {
    Stdin,
    Line(String),
    Script(String),
    DumpConfig,
}

fn parse_args() -> Result<Mode, String> {
    let mut args = std::env::args().skip(1);
    let Some(first) = args.next() else {
        return Ok(Mode::Stdin);
    };
    let mode = match first.as_str() {
        "--dump-config" => Mode::DumpConfig,
        "-c" => Mode::Line(args.next().ok_or("-c requires a line")?),
        "-" => Mode::Stdin,
        flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
        _ => Mode::Script(first),
    };
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument: {extra}"));
    }
    Ok(mode)
}

struct Session {
    engine: Engine,
    timeout: Option<Duration>,
    failed: bool,
}

impl Session {
    fn run(&mut self, line: &str) {
        let execution = match self.timeout {
            Some(limit) => self.engine.execute_timeout(line, limit),
            None => self.engine.execute(line),
        };
        logging::log_execution(line, &execution);

        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(execution.output.as_bytes());
        let _ = stdout.flush();
        for error in &execution.errors {
            eprintln!("replkit: {error}");
        }
        self.failed |= !execution.is_ok();
    }
}

fn main() {
    let mode = match parse_args() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("replkit: {e}");
            std::process::exit(2);
        }
    };

    let config = Config::load();

    if let Mode::DumpConfig = mode {
        match config.to_toml() {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("replkit: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    logging::init(&config.settings.log_level);
    let mut session = Session {
        engine: Engine::from_config(&config),
        timeout: config.settings.exec_timeout_secs.map(Duration::from_secs),
        failed: false,
    };

    match mode {
        Mode::Line(line) => session.run(&line),
        Mode::Script(path) => match std::fs::read_to_string(&path) {
            Ok(text) => {
                for line in parse::logical_lines(&text) {
                    session.run(&line);
                }
            }
            Err(e) => {
                eprintln!("replkit: {path}: {e}");
                std::process::exit(1);
            }
        },
        Mode::Stdin => {
            // Continuations are folded before execution so `\` works interactively.
            let mut pending = String::new();
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                pending.push_str(&line);
                pending.push('\n');
                if parse::split::ends_with_unescaped_backslash(line.trim_end()) {
                    continue;
                }
                for logical in parse::logical_lines(&std::mem::take(&mut pending)) {
                    session.run(&logical);
                }
            }
            for logical in parse::logical_lines(&pending) {
                session.run(&logical);
            }
        }
        Mode::DumpConfig => {}
    }

    if session.failed {
        std::process::exit(1);
    }
}
