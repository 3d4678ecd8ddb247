//! Isolated, disposable clones of the project under test.

use crate::config::CloningConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A private copy of the project, deleted when dropped.
pub struct Workspace {
    temp_dir: tempfile::TempDir,
}

impl Workspace {
    /// Copy `source` into a fresh temporary directory and run the setup
    /// commands inside it.
    ///
    /// Top-level entries whose names match a `cloning.exclude` pattern are
    /// not copied.
    pub async fn clone_from(source: &Path, cloning: &CloningConfig) -> Result<Self> {
        let temp_dir = copy_to_temp(source, &cloning.exclude).await?;
        let workspace = Self { temp_dir };

        for command in &cloning.commands {
            workspace.run_setup_command(command).await?;
        }

        tracing::info!(
            "Created workspace {} from {}",
            workspace.root().display(),
            source.display()
        );
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    async fn run_setup_command(&self, command: &str) -> Result<()> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(self.root())
            .output()
            .await
            .with_context(|| format!("Failed to spawn setup command '{}'", command))?;

        if !output.status.success() {
            anyhow::bail!(
                "Setup command '{}' failed ({}): {}{}",
                command,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}

async fn copy_to_temp(source: &Path, exclude: &[String]) -> Result<tempfile::TempDir> {
    let source = source.to_path_buf();
    let exclude = exclude.to_vec();

    // fs_extra is synchronous
    tokio::task::spawn_blocking(move || -> Result<tempfile::TempDir> {
        let temp_dir = tempfile::TempDir::with_prefix("mutiny-")?;

        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(&source)
            .with_context(|| format!("Failed to read project directory {}", source.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if exclude
                .iter()
                .any(|pattern| glob_match::glob_match(pattern, &name))
            {
                continue;
            }
            entries.push(entry.path());
        }

        let options = fs_extra::dir::CopyOptions {
            overwrite: false,
            skip_exist: false,
            buffer_size: 64 * 1024,
            copy_inside: true,
            content_only: false,
            depth: 0,
        };
        fs_extra::copy_items(&entries, temp_dir.path(), &options)
            .map_err(|e| anyhow::anyhow!("Failed to copy project: {}", e))?;

        Ok(temp_dir)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("pkg/a.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("pkg/sub/b.py"), "y = 2\n").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::write(dir.path().join("setup.cfg"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_clone_copies_tree_without_excluded_entries() {
        let source = project();
        let workspace = Workspace::clone_from(source.path(), &CloningConfig::default())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(workspace.root().join("pkg/sub/b.py")).unwrap(),
            "y = 2\n"
        );
        assert!(workspace.root().join("setup.cfg").exists());
        assert!(!workspace.root().join(".git").exists());
        assert_ne!(workspace.root(), source.path());
    }

    #[tokio::test]
    async fn test_clone_is_independent_of_source() {
        let source = project();
        let workspace = Workspace::clone_from(source.path(), &CloningConfig::default())
            .await
            .unwrap();
        std::fs::write(workspace.root().join("pkg/a.py"), "x = 2\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(source.path().join("pkg/a.py")).unwrap(),
            "x = 1\n"
        );
    }

    #[tokio::test]
    async fn test_setup_commands_run_inside_clone() {
        let source = project();
        let cloning = CloningConfig {
            commands: vec!["touch installed".into()],
            exclude: vec![],
        };
        let workspace = Workspace::clone_from(source.path(), &cloning).await.unwrap();
        assert!(workspace.root().join("installed").exists());
        assert!(workspace.root().join(".git/HEAD").exists());
        assert!(!source.path().join("installed").exists());
    }

    #[tokio::test]
    async fn test_failing_setup_command() {
        let source = project();
        let cloning = CloningConfig {
            commands: vec!["echo broken; exit 3".into()],
            exclude: vec![],
        };
        let err = Workspace::clone_from(source.path(), &cloning)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_workspace_is_removed_on_drop() {
        let source = project();
        let workspace = Workspace::clone_from(source.path(), &CloningConfig::default())
            .await
            .unwrap();
        let root = workspace.root().to_path_buf();
        drop(workspace);
        assert!(!root.exists());
    }
}
