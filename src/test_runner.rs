use std::path::{ Path, PathBuf };
use std::process::Command;
use log::{ info, error, warn };

const COVERAGE_FLAGS: &[&str] = &[
    "--cov=functions",
    "--cov=shared",
    "--cov-report=html:coverage_html",
    "--cov-report=term-missing",
    "--cov-fail-under=80",
];

const COMMON_FLAGS: &[&str] = &["--tb=short", "--strict-markers", "-x"];

#[derive(Debug, Clone)]
pub struct TestRunOptions {
    pub test_file: Option<PathBuf>,
    pub coverage: bool,
    pub verbose: bool,
    pub backend_dir: PathBuf,
    pub test_dir: PathBuf,
    pub python: String,
}

impl Default for TestRunOptions {
    fn default() -> Self {
        Self {
            test_file: None,
            coverage: true,
            verbose: false,
            backend_dir: PathBuf::from("."),
            test_dir: PathBuf::from("tests/unit"),
            python: "python".to_string(),
        }
    }
}

impl TestRunOptions {
    pub fn command(&self) -> TestCommand {
        let mut args = vec!["-m".to_string(), "pytest".to_string()];

        let target = match &self.test_file {
            Some(file) => file.clone(),
            None => self.test_dir.clone(),
        };
        args.push(target.to_string_lossy().into_owned());

        if self.coverage {
            args.extend(COVERAGE_FLAGS.iter().map(|f| f.to_string()));
        }
        if self.verbose {
            args.push("-v".to_string());
        }
        args.extend(COMMON_FLAGS.iter().map(|f| f.to_string()));

        TestCommand {
            program: self.python.clone(),
            args,
            cwd: self.backend_dir.clone(),
            python_path: vec![self.backend_dir.join("functions"), self.backend_dir.join("shared")],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub python_path: Vec<PathBuf>,
}

impl TestCommand {
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn python_path_env(&self) -> Option<std::ffi::OsString> {
        let mut paths: Vec<PathBuf> = self.python_path.clone();
        if let Some(existing) = std::env::var_os("PYTHONPATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        if paths.is_empty() {
            return None;
        }
        std::env::join_paths(paths).ok()
    }

    /// Runs the command to completion and returns its exit code. A spawn
    /// failure or a signal-terminated child yields 1.
    pub fn run(&self) -> i32 {
        info!("Running command: {}", self.display());
        info!("Working directory: {}", display_dir(&self.cwd));

        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(&self.cwd);
        if let Some(python_path) = self.python_path_env() {
            command.env("PYTHONPATH", python_path);
        }

        match command.status() {
            Ok(status) =>
                match status.code() {
                    Some(code) => code,
                    None => {
                        warn!("Test process terminated without an exit code: {}", status);
                        1
                    }
                }
            Err(e) => {
                error!("Error running tests: {}", e);
                1
            }
        }
    }
}

fn display_dir(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_runs_suite_with_coverage() {
        let command = TestRunOptions::default().command();
        assert_eq!(command.program, "python");
        assert_eq!(
            command.display(),
            "python -m pytest tests/unit --cov=functions --cov=shared --cov-report=html:coverage_html \
             --cov-report=term-missing --cov-fail-under=80 --tb=short --strict-markers -x"
        );
    }

    #[test]
    fn test_file_and_verbose_without_coverage() {
        let options = TestRunOptions {
            test_file: Some(PathBuf::from("tests/unit/test_cart_api.py")),
            coverage: false,
            verbose: true,
            ..Default::default()
        };
        let command = options.command();
        assert_eq!(
            command.args,
            vec!["-m", "pytest", "tests/unit/test_cart_api.py", "-v", "--tb=short", "--strict-markers", "-x"]
        );
        assert!(!command.args.iter().any(|a| a.starts_with("--cov")));
    }

    #[test]
    fn python_path_includes_backend_packages() {
        let options = TestRunOptions {
            backend_dir: PathBuf::from("/srv/backend"),
            ..Default::default()
        };
        let command = options.command();
        assert_eq!(command.cwd, PathBuf::from("/srv/backend"));
        assert_eq!(
            command.python_path,
            vec![PathBuf::from("/srv/backend/functions"), PathBuf::from("/srv/backend/shared")]
        );
    }

    #[test]
    fn missing_program_maps_to_failure() {
        let command = TestCommand {
            program: "definitely-not-a-real-test-binary".to_string(),
            args: Vec::new(),
            cwd: PathBuf::from("."),
            python_path: Vec::new(),
        };
        assert_eq!(command.run(), 1);
    }
}
