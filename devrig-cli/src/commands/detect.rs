//! `devrig detect` — classify a project directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use devrig_core::Config;
use devrig_detector::{backend_info, profile};

/// Arguments for `devrig detect`.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Project name under the apps directory, or a path to a project.
    pub project: String,

    /// Print matched framework and location on stderr.
    #[arg(long, short)]
    pub verbose: bool,

    /// Print `<external-port> <internal-port> <container-tag>` instead of the tag.
    #[arg(long)]
    pub backend_info: bool,
}

impl DetectArgs {
    pub fn run(self, config: &Config) -> Result<()> {
        let path = resolve_project(&config.apps_dir, &self.project);
        let profile =
            profile(&path).with_context(|| format!("cannot classify '{}'", self.project))?;

        if self.verbose {
            eprintln!("project:   {}", profile.name);
            eprintln!("path:      {}", profile.path.display());
            eprintln!("runtime:   {}", profile.runtime);
            if let Some(framework) = &profile.framework {
                eprintln!("framework: {framework}");
            }
        }

        if self.backend_info {
            let info = backend_info(profile.runtime)
                .with_context(|| format!("'{}' has no recognised runtime", self.project))?;
            println!("{info}");
        } else {
            println!("{}", profile.runtime);
        }
        Ok(())
    }
}

/// `<apps_dir>/<name>` when it exists, else `name` as a path.
fn resolve_project(apps_dir: &Path, project: &str) -> PathBuf {
    let under_apps = apps_dir.join(project);
    if under_apps.is_dir() {
        return under_apps;
    }
    let literal = PathBuf::from(project);
    if literal.is_dir() {
        literal
    } else {
        under_apps
    }
}
