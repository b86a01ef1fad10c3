/// Per-test-case working directory.
///
/// A `SandboxInvocation` owns a uniquely named directory under the configured
/// work root holding exactly the artifact and `input.txt`. The directory is
/// removed when the invocation is dropped, so every exit path (timeout,
/// error, panic) releases it.
use crate::harness::{Artifact, INPUT_FILE, WORKSPACE_DIR};
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

pub struct SandboxInvocation {
    dir: TempDir,
}

impl SandboxInvocation {
    pub fn prepare(work_root: &Path, artifact: &Artifact, input: &str) -> io::Result<Self> {
        fs::create_dir_all(work_root)?;

        let dir = tempfile::Builder::new().prefix("exec-").tempdir_in(work_root)?;
        let artifact_path = dir.path().join(artifact.filename);
        let input_path = dir.path().join(INPUT_FILE);

        fs::write(&artifact_path, &artifact.content)?;
        fs::write(&input_path, input)?;

        // The container runs as an unprivileged user, so the mount must be
        // traversable and readable by others. Nothing is writable.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755))?;
            fs::set_permissions(&artifact_path, fs::Permissions::from_mode(0o444))?;
            fs::set_permissions(&input_path, fs::Permissions::from_mode(0o444))?;
        }

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Docker bind spec mounting this directory read-only at `/workspace`
    pub fn bind_spec(&self) -> String {
        format!("{}:{}:ro", self.path().display(), WORKSPACE_DIR)
    }

    /// Remove the directory now and report failures. Dropping does the same silently.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
