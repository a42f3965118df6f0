//! Process restart: after a clean teardown the reactor can replace the
//! running process with a fresh copy of itself, keeping the original argv.
//! The exec step is injected so tests can observe it without leaving the
//! test process.

use std::env;

use log::info;

/// Replaces the current process with `program argv...`. Only returns on
/// failure.
pub type ExecFn = Box<dyn FnMut(&str, &[String])>;

pub struct RestartHandler {
    program: String,
    argv: Vec<String>,
    exec: ExecFn,
}

impl RestartHandler {
    /// Capture the current process's program path and arguments
    pub fn from_current_process() -> Self {
        let mut args = env::args();
        let program = args.next().unwrap_or_default();
        Self::new(&program, args.collect(), default_exec())
    }

    pub fn new(program: &str, argv: Vec<String>, exec: ExecFn) -> Self {
        Self {
            program: program.to_owned(),
            argv,
            exec,
        }
    }

    /// Re-exec with the original argv. Must only be called after teardown;
    /// on unix a successful exec never returns.
    pub fn restart(&mut self) {
        info!("restarting: {} {:?}", self.program, self.argv);
        (self.exec)(&self.program, &self.argv);
    }
}

fn default_exec() -> ExecFn {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            Box::new(|program: &str, argv: &[String]| {
                use std::os::unix::process::CommandExt;
                let err = std::process::Command::new(program).args(argv).exec();
                log::error!("exec {program} failed: {err}");
            })
        } else {
            Box::new(|program: &str, argv: &[String]| {
                match std::process::Command::new(program).args(argv).spawn() {
                    Ok(_) => std::process::exit(0),
                    Err(err) => log::error!("spawn {program} failed: {err}"),
                }
            })
        }
    }
}
