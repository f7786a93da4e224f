use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use localrun::exec::{OutputSink, ProcessFactory, ProcessHandle, ProcessOutcome};
use localrun::fs::FileSystem;

/// One scripted action of a [`FakeProcess`].
#[derive(Debug, Clone)]
pub enum Step {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Pause(Duration),
    /// Block until the test calls `notify_one` on this handle.
    Hold(Arc<Notify>),
    /// Simulate the process writing its status artifact.
    WriteFile {
        fs: Arc<dyn FileSystem>,
        path: PathBuf,
        contents: String,
    },
}

/// What a fake process does once started, in order, and how it exits.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessScript {
    steps: Vec<Step>,
    exit_code: i32,
    fail_start: Option<String>,
}

impl FakeProcessScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.steps.push(Step::Stdout(text.as_bytes().to_vec()));
        self
    }

    /// Write `text` followed by a newline.
    pub fn stdout_line(self, text: &str) -> Self {
        self.stdout(&format!("{text}\n"))
    }

    pub fn stderr_line(mut self, text: &str) -> Self {
        self.steps.push(Step::Stderr(format!("{text}\n").into_bytes()));
        self
    }

    pub fn pause_ms(mut self, ms: u64) -> Self {
        self.steps.push(Step::Pause(Duration::from_millis(ms)));
        self
    }

    pub fn hold(mut self, release: Arc<Notify>) -> Self {
        self.steps.push(Step::Hold(release));
        self
    }

    pub fn write_file(
        mut self,
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
    ) -> Self {
        self.steps.push(Step::WriteFile {
            fs,
            path: path.into(),
            contents: contents.into(),
        });
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Make `start` fail with `message`.
    pub fn fail_start(mut self, message: &str) -> Self {
        self.fail_start = Some(message.to_string());
        self
    }
}

/// A process that plays back a [`FakeProcessScript`] instead of spawning
/// anything.
pub struct FakeProcess {
    script: FakeProcessScript,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    kills: Arc<AtomicUsize>,
    task: Option<JoinHandle<Result<i32>>>,
}

impl FakeProcess {
    pub fn new(script: FakeProcessScript) -> Self {
        Self {
            script,
            invocations: Arc::default(),
            kills: Arc::default(),
            task: None,
        }
    }
}

impl ProcessHandle for FakeProcess {
    fn start(
        &mut self,
        command: &str,
        args: &[String],
        stdout: Arc<dyn OutputSink>,
        stderr: Arc<dyn OutputSink>,
    ) -> Result<()> {
        self.invocations.lock().unwrap().push(Invocation {
            command: command.to_string(),
            args: args.to_vec(),
        });

        if self.task.is_some() {
            bail!("fake process already started");
        }
        if let Some(message) = &self.script.fail_start {
            bail!("{message}");
        }

        let steps = self.script.steps.clone();
        let exit_code = self.script.exit_code;

        self.task = Some(tokio::spawn(async move {
            for step in steps {
                match step {
                    Step::Stdout(bytes) => {
                        stdout.write(&bytes)?;
                    }
                    Step::Stderr(bytes) => {
                        stderr.write(&bytes)?;
                    }
                    Step::Pause(d) => tokio::time::sleep(d).await,
                    Step::Hold(release) => release.notified().await,
                    Step::WriteFile { fs, path, contents } => {
                        fs.write(&path, contents.as_bytes())?;
                    }
                }
                tokio::task::yield_now().await;
            }
            stdout.finish();
            stderr.finish();
            Ok(exit_code)
        }));
        Ok(())
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = Result<ProcessOutcome>> + Send + '_>> {
        Box::pin(async move {
            // Keep the handle in place so a dropped wait can still be killed.
            let task = self
                .task
                .as_mut()
                .ok_or_else(|| anyhow!("fake process was never started"))?;
            let code = task.await??;
            self.task = None;
            Ok(ProcessOutcome::from_code(Some(code), code == 0))
        })
    }

    fn kill(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(task) = self.task.take() {
                task.abort();
                self.kills.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
    }
}

/// A recorded call to [`ProcessHandle::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

/// Hands out [`FakeProcess`]es that all play the same script, recording how
/// each one was started.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessFactory {
    script: FakeProcessScript,
    invocations: Arc<Mutex<Vec<Invocation>>>,
    kills: Arc<AtomicUsize>,
}

impl FakeProcessFactory {
    pub fn new(script: FakeProcessScript) -> Self {
        Self {
            script,
            invocations: Arc::default(),
            kills: Arc::default(),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// How many processes from this factory were killed before exiting.
    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

impl ProcessFactory for FakeProcessFactory {
    fn new_process(&self) -> Box<dyn ProcessHandle> {
        Box::new(FakeProcess {
            script: self.script.clone(),
            invocations: Arc::clone(&self.invocations),
            kills: Arc::clone(&self.kills),
            task: None,
        })
    }
}
