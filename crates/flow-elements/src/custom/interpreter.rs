//! Script evaluation inside the sandbox worker
//!
//! The worker runs user code with `boa_engine`. The script sees `inputs`,
//! `hyperparameters` and `constants` as globals, writes its results into the
//! global `output` object, and may call the helper functions below. Nothing
//! else from the host is exposed.

use boa_engine::{Context, JsValue, Source};
use flow_engine::ValueMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One unit of work sent to the worker on stdin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxJob {
    pub code: String,
    pub inputs: ValueMap,
    pub hyperparameters: ValueMap,
    pub constants: ValueMap,
}

/// The single line the worker prints on stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerReply {
    Success { output: ValueMap },
    Error { message: String },
}

impl From<Result<ValueMap, WorkerError>> for WorkerReply {
    fn from(result: Result<ValueMap, WorkerError>) -> Self {
        match result {
            Ok(output) => Self::Success { output },
            Err(e) => Self::Error {
                message: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid job: {0}")]
    InvalidJob(#[from] serde_json::Error),

    #[error("{0}")]
    Script(String),

    #[error("Output must be an object, got: {0}")]
    BadOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pure helpers available to scripts
const HELPERS: &str = r#"
function __args(args) {
    return args.length === 1 && Array.isArray(args[0]) ? args[0].slice() : Array.prototype.slice.call(args);
}
function abs(x) { return Math.abs(x); }
function min() { return Math.min.apply(null, __args(arguments)); }
function max() { return Math.max.apply(null, __args(arguments)); }
function sum(xs, start) {
    var total = start === undefined ? 0 : start;
    for (var i = 0; i < xs.length; i++) { total += xs[i]; }
    return total;
}
function round(x, digits) {
    var scale = Math.pow(10, digits === undefined ? 0 : digits);
    return Math.round(x * scale) / scale;
}
function len(x) {
    if (x === null || x === undefined) { return 0; }
    if (typeof x === "object" && !Array.isArray(x)) { return Object.keys(x).length; }
    return x.length;
}
function sorted(xs) {
    return xs.slice().sort(function (a, b) {
        if (typeof a === "number" && typeof b === "number") { return a - b; }
        return String(a) < String(b) ? -1 : (String(a) > String(b) ? 1 : 0);
    });
}
function range(start, stop, step) {
    if (stop === undefined) { stop = start; start = 0; }
    if (step === undefined) { step = 1; }
    var out = [];
    if (step > 0) { for (var i = start; i < stop; i += step) { out.push(i); } }
    else if (step < 0) { for (var j = start; j > stop; j += step) { out.push(j); } }
    return out;
}
"#;

fn eval(context: &mut Context, script: &str) -> Result<JsValue, WorkerError> {
    context
        .eval(Source::from_bytes(script))
        .map_err(|e| WorkerError::Script(e.to_string()))
}

/// Run one job to completion in a fresh interpreter.
pub fn run_job(job: &SandboxJob) -> Result<ValueMap, WorkerError> {
    let mut context = Context::default();

    let globals = format!(
        "var inputs = {};\nvar hyperparameters = {};\nvar constants = {};\nvar output = {{}};\n{}",
        serde_json::to_string(&job.inputs)?,
        serde_json::to_string(&job.hyperparameters)?,
        serde_json::to_string(&job.constants)?,
        HELPERS
    );
    eval(&mut context, &globals)?;
    eval(&mut context, &job.code)?;

    let rendered = eval(&mut context, "JSON.stringify(output)")?
        .to_string(&mut context)
        .map(|s| s.to_std_string_escaped())
        .map_err(|e| WorkerError::Script(e.to_string()))?;
    match serde_json::from_str::<Value>(&rendered) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err(WorkerError::BadOutput(rendered)),
    }
}
