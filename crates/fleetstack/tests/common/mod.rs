#![allow(deprecated)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const REFERENCE_STACK: &str =
    include_str!("../../../fleetstack-core/tests/fixtures/reference_stack.kdl");

pub struct TestProject {
    pub root: TempDir,
    home: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            home: tempfile::tempdir().unwrap(),
        }
    }

    pub fn with_reference_stack() -> Self {
        let project = Self::new();
        project.write_stack_kdl(REFERENCE_STACK);
        project
    }

    pub fn write_stack_kdl(&self, content: &str) {
        fs::write(self.root.path().join("stack.kdl"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// `fleetstack` running inside the project, isolated from the caller's
    /// environment and user config
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("fleetstack").unwrap();
        cmd.current_dir(self.root.path())
            .env_remove("FLEETSTACK_FILE")
            .env("NO_COLOR", "1")
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd
    }
}
