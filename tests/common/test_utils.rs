#![allow(dead_code)]
use assert_cmd::Command;
use std::fs;
use std::io::Result as IoResult;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture_text(name: &str) -> String {
    fs::read_to_string(fixture(name)).expect("fixture should be readable")
}

/// The heapcheck binary with logging silenced.
pub fn heapcheck_cmd() -> Command {
    let mut cmd = Command::cargo_bin("heapcheck").expect("heapcheck binary should be built");
    cmd.env_remove("HEAPCHECK_LOG");
    cmd
}

/// A scratch directory standing in for a Go module checkout.
pub struct TestProject {
    /// The temporary directory. When this is dropped, the directory and its contents are removed.
    pub temp_dir: TempDir,
    /// The root directory of the module.
    pub root: PathBuf,
}

impl TestProject {
    pub fn new(module_name: &str) -> IoResult<Self> {
        let temp_dir = tempdir()?;
        let root = temp_dir.path().join(module_name);
        fs::create_dir_all(&root)?;
        fs::write(
            root.join("go.mod"),
            format!("module example.com/{}\n\ngo 1.22\n", module_name),
        )?;
        Ok(TestProject { temp_dir, root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write `heapcheck.toml` at the module root.
    pub fn with_config(self, toml: &str) -> IoResult<Self> {
        fs::write(self.root.join("heapcheck.toml"), toml)?;
        Ok(self)
    }

    /// Copy a fixture into the module and return its path.
    pub fn add_fixture(&self, name: &str) -> IoResult<PathBuf> {
        let dest = self.root.join(name);
        fs::copy(fixture(name), &dest)?;
        Ok(dest)
    }
}
