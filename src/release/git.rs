use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("git", args)
    }

    /// Commands that change the repository or a remote.
    pub fn mutates_repository(&self) -> bool {
        self.program == "git"
            && matches!(
                self.args.first().map(String::as_str),
                Some("add" | "commit" | "push" | "tag")
            )
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Runs external commands for the release pipeline.
pub trait CommandRunner {
    /// Runs to completion with inherited stdio; `Ok(false)` on a non-zero exit.
    fn status(&mut self, spec: &CommandSpec) -> io::Result<bool>;
}

pub struct SystemRunner {
    root: PathBuf,
}

impl SystemRunner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn status(&mut self, spec: &CommandSpec) -> io::Result<bool> {
        log::debug!("Running {}", spec);
        let status = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&self.root)
            .status()?;
        Ok(status.success())
    }
}
