use std::path::Path;
use std::process::Command;

use tracing::debug;
use url::Url;

use crate::error::{BuildError, BuildResult};

/// Renders a source tree into a destination directory.
pub trait SiteGenerator: Send + Sync {
    fn render(&self, source: &Path, dest: &Path, base_url: &Url) -> BuildResult<()>;
}

/// Runs `hugo --destination <dest> --baseURL <url>` in the source directory.
#[derive(Debug, Clone)]
pub struct HugoGenerator {
    program: String,
    extra_args: Vec<String>,
}

impl HugoGenerator {
    /// `program` is the binary to run, usually `hugo`.
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    fn args(&self, dest: &Path, base_url: &Url) -> Vec<String> {
        let mut args = vec![
            "--destination".to_string(),
            dest.to_string_lossy().into_owned(),
            "--baseURL".to_string(),
            base_url.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl Default for HugoGenerator {
    fn default() -> Self {
        Self::new("hugo", Vec::new())
    }
}

impl SiteGenerator for HugoGenerator {
    fn render(&self, source: &Path, dest: &Path, base_url: &Url) -> BuildResult<()> {
        let args = self.args(dest, base_url);
        debug!(program = %self.program, ?args, "running site generator");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(source)
            .output()?;
        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(BuildError::GeneratorFailed {
            command: format!("{} {}", self.program, args.join(" ")),
            output: combined.trim_end().to_string(),
        })
    }
}
