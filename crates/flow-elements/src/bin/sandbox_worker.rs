//! Sandbox worker
//!
//! Reads one job from stdin, runs it and prints one reply line on stdout.
//! Logs go to stderr.

use std::io::{self, Read};
use std::process::ExitCode;

use flow_elements::custom::{run_job, SandboxJob, WorkerError, WorkerReply};

fn read_job() -> Result<SandboxJob, WorkerError> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(serde_json::from_str(&input)?)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let result = read_job().and_then(|job| run_job(&job));
    if let Err(e) = &result {
        log::warn!("Sandbox job failed: {}", e);
    }

    match serde_json::to_string(&WorkerReply::from(result)) {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Failed to encode reply: {}", e);
            ExitCode::FAILURE
        }
    }
}
