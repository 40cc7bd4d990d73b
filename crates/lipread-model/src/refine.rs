//! Post-processing of the raw transcript by a local LLM.

use std::process::Stdio;
use std::time::Duration;

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};

use crate::{ModelError, Result};

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

pub const LIPREAD_PROMPT: &str = "Interpret the lipreading given in the context.";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub trait Refiner: Send {
    fn refine(&mut self, raw: &str) -> Result<String>;
}

impl<R: Refiner + ?Sized> Refiner for Box<R> {
    fn refine(&mut self, raw: &str) -> Result<String> {
        (**self).refine(raw)
    }
}

/// Returns the raw transcript unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRefiner;

impl Refiner for PassthroughRefiner {
    fn refine(&mut self, raw: &str) -> Result<String> {
        Ok(raw.to_owned())
    }
}

/// Pipes the transcript through `ollama run <model>`.
///
/// The call blocks the worker thread; a private current-thread runtime
/// drives the child so the timeout can kill it.
pub struct OllamaRefiner {
    program: String,
    args: Vec<String>,
    prompt: String,
    timeout: Duration,
    runtime: Runtime,
}

impl OllamaRefiner {
    pub fn new(model: impl Into<String>) -> Result<Self> {
        Self::with_command("ollama", ["run".to_owned(), model.into()])
    }

    /// Any CLI that reads the prompt on stdin and answers on stdout.
    pub fn with_command<I, A>(program: impl Into<String>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            prompt: LIPREAD_PROMPT.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            runtime,
        })
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn interpret(&self, input: String) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ModelError::RefinerSpawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(input.as_bytes()).await {
                Ok(()) => {}
                // the child may exit without reading; its status says why
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin early", self.program)
                }
                Err(e) => return Err(e.into()),
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ModelError::RefinerFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

impl Refiner for OllamaRefiner {
    fn refine(&mut self, raw: &str) -> Result<String> {
        let input = format!("{}\n\nContext: {raw}", self.prompt);
        let timeout = self.timeout;
        // dropping the timed-out future drops the child, which kills it
        self.runtime.block_on(async {
            tokio::time::timeout(timeout, self.interpret(input))
                .await
                .map_err(|_| ModelError::RefinerTimeout(timeout))?
        })
    }
}
