//! Runs the site build and every stage in order, stopping at the first failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::PipelineError;

/// One step of a full optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Strip,
    Styles,
    Minify,
}

impl Step {
    /// Every step, in the order it runs.
    pub const ALL: [Step; 4] = [Step::Build, Step::Strip, Step::Styles, Step::Minify];

    /// Name used for the subcommand and in messages.
    pub fn name(self) -> &'static str {
        match self {
            Step::Build => "build",
            Step::Strip => "strip",
            Step::Styles => "styles",
            Step::Minify => "minify",
        }
    }

    fn banner(self) -> &'static str {
        match self {
            Step::Build => "Building site",
            Step::Strip => "Stripping JavaScript",
            Step::Styles => "Optimizing CSS",
            Step::Minify => "Minifying HTML",
        }
    }

    /// Whether the step changes files in the output directory.
    fn mutates_output(self) -> bool {
        !matches!(self, Step::Build)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Executes a single step.
pub trait StepRunner {
    fn run(&mut self, step: Step) -> Result<(), PipelineError>;
}

/// Runs the build command and each stage as a child process.
///
/// Stages run as subcommands of the current executable with the same config
/// file. Output of every child goes straight to the terminal.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    exe: PathBuf,
    config_path: PathBuf,
    build_command: Vec<String>,
    project_dir: PathBuf,
    verbose: bool,
}

impl ProcessRunner {
    pub fn new(
        config_path: impl Into<PathBuf>,
        build_command: Vec<String>,
        project_dir: impl Into<PathBuf>,
    ) -> Result<Self, PipelineError> {
        let exe = std::env::current_exe().map_err(|e| PipelineError::io("current executable", e))?;
        Ok(Self {
            exe,
            config_path: config_path.into(),
            build_command,
            project_dir: project_dir.into(),
            verbose: false,
        })
    }

    /// Pass `--verbose` to stage subprocesses.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Use a different executable for stages.
    pub fn with_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.exe = exe.into();
        self
    }

    fn command(&self, step: Step) -> Option<Command> {
        match step {
            Step::Build => {
                let (program, args) = self.build_command.split_first()?;
                let mut command = Command::new(program);
                command.args(args).current_dir(&self.project_dir);
                Some(command)
            }
            _ => {
                let mut command = Command::new(&self.exe);
                command.arg("--config").arg(&self.config_path);
                if self.verbose {
                    command.arg("--verbose");
                }
                command.arg(step.name());
                Some(command)
            }
        }
    }
}

impl StepRunner for ProcessRunner {
    fn run(&mut self, step: Step) -> Result<(), PipelineError> {
        let Some(mut command) = self.command(step) else {
            tracing::info!("No build command configured, skipping build");
            return Ok(());
        };
        tracing::debug!("Running {:?}", command);

        let status = command.status().map_err(|e| PipelineError::StepFailed {
            step: step.to_string(),
            message: format!("could not start: {}", e),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::StepFailed {
                step: step.to_string(),
                message: format!("exited with {}", status),
            })
        }
    }
}

/// Sequences a full optimization run.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    out_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Run every step in order. Later steps never run once one fails.
    pub fn run(&self, runner: &mut dyn StepRunner) -> Result<Vec<Step>, PipelineError> {
        tracing::info!("Starting optimization");

        let mut completed = Vec::with_capacity(Step::ALL.len());
        for (index, step) in Step::ALL.into_iter().enumerate() {
            tracing::info!("[{}/{}] {}...", index + 1, Step::ALL.len(), step.banner());

            if let Err(e) = runner.run(step) {
                self.warn_partial(&completed);
                return Err(e);
            }
            completed.push(step);
        }

        tracing::info!(
            "Optimization complete! Site is ready in {}",
            self.out_dir.display()
        );
        Ok(completed)
    }

    fn warn_partial(&self, completed: &[Step]) {
        let mutated: Vec<&str> = completed
            .iter()
            .filter(|s| s.mutates_output())
            .map(|s| s.name())
            .collect();
        if !mutated.is_empty() {
            tracing::warn!(
                "{} is partially optimized: {} already ran. Rebuild the site before retrying.",
                self.out_dir.display(),
                mutated.join(", ")
            );
        }
    }
}
