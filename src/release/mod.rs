//! Release automation: version bump, changelog entry, optional binary build,
//! commit, push and tag.

pub mod changelog;
pub mod git;
pub mod manifest;

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::utils::errors::{ReleaseError, Result};
use crate::utils::semver::{bump, BumpKind};
use self::git::{CommandRunner, CommandSpec};
use self::manifest::Manifest;

pub const DEFAULT_BUILD_DIR: &str = "dist";
const MANIFEST: &str = "Cargo.toml";
const LOCKFILE: &str = "Cargo.lock";
const README: &str = "README.md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOptions {
    pub root: PathBuf,
    /// Relative to `root`.
    pub build_dir: PathBuf,
    pub tag: bool,
}

impl ReleaseOptions {
    /// `BUILD_DIR` overrides the output directory, a non-empty `NO_TAG`
    /// disables tagging.
    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        Self::from_vars(root, |key| std::env::var(key).ok())
    }

    pub fn from_vars(root: impl Into<PathBuf>, var: impl Fn(&str) -> Option<String>) -> Self {
        let build_dir = var("BUILD_DIR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BUILD_DIR.to_string());
        Self {
            root: root.into(),
            build_dir: PathBuf::from(build_dir),
            tag: var("NO_TAG").map(|v| v.is_empty()).unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub previous: String,
    pub version: String,
    pub built: bool,
    pub tagged: bool,
}

pub struct Release<'a, R, I, O> {
    options: ReleaseOptions,
    runner: &'a mut R,
    input: I,
    output: O,
}

impl<'a, R, I, O> Release<'a, R, I, O>
where
    R: CommandRunner,
    I: BufRead,
    O: Write,
{
    pub fn new(options: ReleaseOptions, runner: &'a mut R, input: I, output: O) -> Self {
        Self {
            options,
            runner,
            input,
            output,
        }
    }

    pub fn run(&mut self, today: NaiveDate) -> Result<ReleaseOutcome> {
        self.ensure_clean()?;

        let manifest_path = self.options.root.join(MANIFEST);
        if !manifest_path.is_file() {
            return Err(ReleaseError::ManifestMissing(manifest_path).into());
        }
        let invalid = |source| ReleaseError::ManifestInvalid {
            path: manifest_path.clone(),
            source,
        };
        let mut manifest = fs::read_to_string(&manifest_path)?
            .parse::<Manifest>()
            .map_err(invalid)?;
        let previous = manifest.version().map_err(invalid)?;
        let name = manifest.name().map_err(invalid)?;

        let kind: BumpKind = self
            .ask(&format!(
                "Current version {}. Bump [m]ajor, m[i]nor or [p]atch? (default patch): ",
                previous
            ))?
            .parse()
            .unwrap_or(BumpKind::Patch);
        let version = bump(&previous, kind);

        manifest.set_version(&version).map_err(invalid)?;
        fs::write(&manifest_path, manifest.to_string())?;
        self.say(&format!("✓ Version {} → {} ({})", previous, version, kind))?;
        log::info!("Bumped {} from {} to {}", MANIFEST, previous, version);

        let readme_path = self.options.root.join(README);
        let has_readme = readme_path.is_file();
        if has_readme {
            let readme = fs::read_to_string(&readme_path)?;
            fs::write(&readme_path, changelog::insert_entry(&readme, &version, today))?;
            self.say(&format!("✓ Changelog entry added to {}", README))?;
        } else {
            log::warn!("{} not found, changelog not updated", README);
            self.say(&format!("⚠ {} not found, skipping changelog", README))?;
        }

        let answer = self.ask("Build release binaries? [Y/n]: ")?;
        let build = !matches!(answer.trim().to_lowercase().as_str(), "n" | "no");
        if build {
            self.build(&name)?;
        }

        let mut paths = vec![MANIFEST.to_string()];
        if self.options.root.join(LOCKFILE).is_file() {
            paths.push(LOCKFILE.to_string());
        }
        if has_readme {
            paths.push(README.to_string());
        }
        if build {
            paths.push(self.options.build_dir.display().to_string());
        }

        self.require(CommandSpec::git(["add".to_string()].into_iter().chain(paths)))?;
        self.require(CommandSpec::git([
            "commit".to_string(),
            "-m".to_string(),
            format!("chore(release): v{}", version),
        ]))?;
        self.require(CommandSpec::git(["push"]))?;
        self.say(&format!("✓ Committed and pushed v{}", version))?;

        let tagged = if self.options.tag {
            self.tag(&version)?
        } else {
            self.say("Skipping tag (NO_TAG is set)")?;
            false
        };

        Ok(ReleaseOutcome {
            previous,
            version,
            built: build,
            tagged,
        })
    }

    fn ensure_clean(&mut self) -> Result<()> {
        if !self.check(&CommandSpec::git(["diff", "--quiet"]))? {
            return Err(ReleaseError::DirtyWorkingTree("unstaged").into());
        }
        if !self.check(&CommandSpec::git(["diff", "--cached", "--quiet"]))? {
            return Err(ReleaseError::DirtyWorkingTree("staged").into());
        }
        Ok(())
    }

    fn build(&mut self, binary: &str) -> Result<()> {
        self.say("Building release binaries...")?;
        let cargo = CommandSpec::new("cargo", ["build", "--release"]);
        if !self.check(&cargo)? {
            return Err(ReleaseError::BuildFailed(cargo.to_string()).into());
        }

        let artifact = self.options.root.join("target").join("release").join(binary);
        if !artifact.is_file() {
            return Err(ReleaseError::BuildOutputMissing(artifact).into());
        }

        let out_dir = self.options.root.join(&self.options.build_dir);
        fs::create_dir_all(&out_dir)?;
        fs::copy(&artifact, out_dir.join(binary))?;

        if !out_dir.is_dir() {
            return Err(ReleaseError::BuildOutputMissing(out_dir).into());
        }
        let ignored = CommandSpec::git([
            "check-ignore".to_string(),
            "-q".to_string(),
            self.options.build_dir.display().to_string(),
        ]);
        if self.check(&ignored)? {
            return Err(ReleaseError::BuildOutputIgnored(self.options.build_dir.clone()).into());
        }

        self.say(&format!("✓ {} copied to {}", binary, self.options.build_dir.display()))?;
        Ok(())
    }

    /// Tag failures do not fail the release; the manual commands are printed.
    fn tag(&mut self, version: &str) -> Result<bool> {
        let tag = format!("v{}", version);
        let create = CommandSpec::git(["tag".to_string(), tag.clone()]);
        let push = CommandSpec::git(["push".to_string(), "origin".to_string(), tag.clone()]);

        let ok = self.check(&create).unwrap_or(false) && self.check(&push).unwrap_or(false);
        if ok {
            self.say(&format!("✓ Tagged {}", tag))?;
        } else {
            log::warn!("Tagging {} failed", tag);
            self.say(&format!("⚠ Could not tag {}. Run manually:", tag))?;
            self.say(&format!("  {}", create))?;
            self.say(&format!("  {}", push))?;
        }
        Ok(ok)
    }

    fn check(&mut self, spec: &CommandSpec) -> Result<bool> {
        self.runner.status(spec).map_err(|e| {
            log::error!("Could not start {}: {}", spec, e);
            ReleaseError::CommandFailed(spec.to_string()).into()
        })
    }

    fn require(&mut self, spec: CommandSpec) -> Result<()> {
        if self.check(&spec)? {
            Ok(())
        } else {
            Err(ReleaseError::CommandFailed(spec.to_string()).into())
        }
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .map_err(|e| ReleaseError::Prompt(e.to_string()))?;
        Ok(answer.trim().to_string())
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{}", line)?;
        Ok(())
    }
}

/// Directory containing `Cargo.toml`, searched upwards from `start`.
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(MANIFEST).is_file())
        .map(Path::to_path_buf)
}
