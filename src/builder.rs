use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::executor::{Executor, Invocation};
use crate::image::Image;
use crate::settings::Settings;
use crate::task_error::TaskError;

/// What happened to the non-fatal steps of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub dockerfile_found: bool,
    pub lint_passed: bool,
    pub scan_passed: bool,
}

/// Lints, builds and scans images whose sources live under `workdir`.
pub struct Builder<'a> {
    settings: &'a Settings,
    executor: &'a dyn Executor,
    workdir: PathBuf,
}

impl<'a> Builder<'a> {
    pub fn new(settings: &'a Settings, executor: &'a dyn Executor, workdir: &Path) -> Self {
        Self {
            settings,
            executor,
            workdir: workdir.to_path_buf(),
        }
    }

    /// Only a failing image build fails the whole operation.
    pub fn build(&self, image: &Image) -> Result<BuildReport, TaskError> {
        // Check that the definition file exists. A missing one is reported but
        // the remaining steps still run.
        let dockerfile = image.dockerfile(self.settings);
        let dockerfile_found = self.workdir.join(&dockerfile).is_file();
        if !dockerfile_found {
            error!("Error: {} does not exist", dockerfile.display());
        }

        info!("=== Running hadolint on {} ===", dockerfile.display());
        let lint_passed = Self::tolerate("lint", self.executor.execute(&self.lint(&dockerfile)));

        info!("=== Building image for {} ===", image.name());
        self.executor.execute(&self.image_build(image))?;

        let scan_tag = image.tag_with(&self.settings.image.scan_tag);
        info!("=== Running trivy scan on {} ===", scan_tag);
        let scan_passed = Self::tolerate("scan", self.executor.execute(&self.scan(&scan_tag)));

        Ok(BuildReport {
            dockerfile_found,
            lint_passed,
            scan_passed,
        })
    }

    fn lint(&self, dockerfile: &Path) -> Invocation {
        Invocation::new(&self.settings.docker.binary)
            .args(["run", "--rm", "-i"])
            .arg(&self.settings.lint.image)
            .stdin_from(dockerfile)
            .current_dir(&self.workdir)
    }

    fn image_build(&self, image: &Image) -> Invocation {
        Invocation::new(&self.settings.docker.binary)
            .args(["build", "-t"])
            .arg(image.tag())
            .arg("--build-arg")
            .arg(format!("{}={}", self.settings.image.build_arg, image.version()))
            .arg(image.name())
            .current_dir(&self.workdir)
    }

    fn scan(&self, tag: &str) -> Invocation {
        let scan = &self.settings.scan;
        let mut invocation = Invocation::new(&self.settings.docker.binary)
            .args(["run", "--rm", "-v"])
            .arg(format!("{0}:{0}", scan.cache_volume))
            .arg("-v")
            .arg(format!("{0}:{0}", scan.docker_socket))
            .arg(&scan.image)
            .arg("image")
            .arg("--severity")
            .arg(&scan.severity)
            .arg("--skip-dirs")
            .arg(&scan.skip_dirs);
        if scan.ignore_unfixed {
            invocation = invocation.arg("--ignore-unfixed");
        }

        invocation
            .arg("--exit-code")
            .arg(scan.exit_code.to_string())
            .arg("--cache-dir")
            .arg(&scan.cache_dir)
            .arg(tag)
    }

    fn tolerate(step: &str, result: Result<(), TaskError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("{} step failed, continuing: {}", step, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use crate::executor::testing::RecordingExecutor;

    fn php_cli(settings: &Settings) -> Image {
        Image::new("php-cli".to_owned(), "8.3".to_owned(), settings).unwrap()
    }

    fn workdir_with_dockerfile() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("php-cli")).unwrap();
        fs::write(dir.path().join("php-cli/Dockerfile"), "FROM php:8.3-cli\n").unwrap();
        dir
    }

    #[test]
    fn runs_lint_then_build_then_scan() {
        let settings = Settings::default();
        let executor = RecordingExecutor::new();
        let dir = workdir_with_dockerfile();

        let report = Builder::new(&settings, &executor, dir.path())
            .build(&php_cli(&settings))
            .unwrap();

        let lines: Vec<String> = executor.calls().iter().map(Invocation::command_line).collect();
        assert_eq!(
            lines,
            [
                "docker run --rm -i hadolint/hadolint < php-cli/Dockerfile",
                "docker build -t local/php-cli:8.3 --build-arg FOPS_IMAGE_VERSION=8.3 php-cli",
                "docker run --rm -v /tmp/trivy-cache:/tmp/trivy-cache \
                 -v /var/run/docker.sock:/var/run/docker.sock aquasec/trivy image \
                 --severity HIGH,CRITICAL --skip-dirs /root/.composer --ignore-unfixed \
                 --exit-code 1 --cache-dir /tmp/trivy/ local/php-cli:dev",
            ]
        );
        assert_eq!(
            report,
            BuildReport {
                dockerfile_found: true,
                lint_passed: true,
                scan_passed: true,
            }
        );
    }

    #[test]
    fn missing_dockerfile_does_not_abort() {
        let settings = Settings::default();
        let executor = RecordingExecutor::new();
        let dir = tempfile::tempdir().unwrap();

        let report = Builder::new(&settings, &executor, dir.path())
            .build(&php_cli(&settings))
            .unwrap();

        assert!(!report.dockerfile_found);
        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].stdin, Some(PathBuf::from("php-cli/Dockerfile")));
        assert_eq!(calls[0].current_dir.as_deref(), Some(dir.path()));
        assert!(calls[1].args.contains(&"local/php-cli:8.3".to_owned()));
        assert!(calls[2].args.contains(&"local/php-cli:dev".to_owned()));
    }

    #[test]
    fn relative_paths_resolve_against_the_workdir() {
        let settings = Settings::default();
        let executor = RecordingExecutor::new();
        let dir = workdir_with_dockerfile();

        let report = Builder::new(&settings, &executor, dir.path())
            .build(&php_cli(&settings))
            .unwrap();

        // The file that was found is the one the linter reads and the build context holds.
        assert!(report.dockerfile_found);
        let calls = executor.calls();
        let lint = &calls[0];
        let build = &calls[1];
        assert_eq!(lint.current_dir.as_deref(), Some(dir.path()));
        assert_eq!(build.current_dir.as_deref(), Some(dir.path()));
        assert!(dir.path().join(lint.stdin.as_ref().unwrap()).is_file());
        assert!(dir.path().join(build.args.last().unwrap()).is_dir());
    }

    #[test]
    fn lint_failure_is_tolerated() {
        let settings = Settings::default();
        let executor = RecordingExecutor::new().failing_at(0, 1);
        let dir = workdir_with_dockerfile();

        let report = Builder::new(&settings, &executor, dir.path())
            .build(&php_cli(&settings))
            .unwrap();

        assert!(!report.lint_passed);
        assert!(report.scan_passed);
        assert_eq!(executor.calls().len(), 3);
    }

    #[test]
    fn build_failure_is_fatal_and_skips_the_scan() {
        let settings = Settings::default();
        let executor = RecordingExecutor::new().failing_at(1, 2);
        let dir = workdir_with_dockerfile();

        let error = Builder::new(&settings, &executor, dir.path())
            .build(&php_cli(&settings))
            .unwrap_err();

        assert_eq!(error.exit_code(), Some(2));
        assert_eq!(executor.calls().len(), 2);
    }

    #[test]
    fn scan_failure_never_fails_the_build() {
        let settings = Settings::default();
        let executor = RecordingExecutor::new().failing_at(2, 1);
        let dir = workdir_with_dockerfile();

        let report = Builder::new(&settings, &executor, dir.path())
            .build(&php_cli(&settings))
            .unwrap();

        assert!(report.lint_passed);
        assert!(!report.scan_passed);
    }

    #[test]
    fn scan_flags_follow_settings() {
        let mut settings = Settings::default();
        settings.scan.ignore_unfixed = false;
        settings.image.scan_tag = "8.3".to_owned();
        let executor = RecordingExecutor::new();
        let dir = workdir_with_dockerfile();

        Builder::new(&settings, &executor, dir.path())
            .build(&php_cli(&settings))
            .unwrap();

        let scan = &executor.calls()[2];
        assert!(!scan.args.contains(&"--ignore-unfixed".to_owned()));
        assert_eq!(scan.args.last().map(String::as_str), Some("local/php-cli:8.3"));
    }
}
