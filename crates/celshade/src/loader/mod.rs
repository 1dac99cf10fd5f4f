use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use dunce::canonicalize;

pub mod gltf_loader;
pub mod model_importer;
pub mod scene_description;
pub mod shader_compiler;
pub mod texture_loader;

/// Folder of model files and their textures, under the root folder.
pub const MODELS_FOLDER: &str = "models";

/// Folder of WGSL shader sources, under the root folder.
pub const SHADERS_FOLDER: &str = "shaders";

/// Folder of textures assigned to objects directly, under the root folder.
pub const TEXTURES_FOLDER: &str = "textures";

/// The path of a resource file
#[derive(Hash, Eq, PartialEq, Clone)]
pub struct ResourcePath {
    /// Root path of the project
    pub root_path: Arc<PathBuf>,

    /// Relative subfolder of the file without the file name
    pub subdirectory: PathBuf,

    /// The name of the file without the directory
    pub file_name: String,
}

impl ResourcePath {
    pub fn new(root_path: &Arc<PathBuf>, subdirectory: impl Into<PathBuf>, file_name: &str) -> Self {
        Self {
            root_path: Arc::clone(root_path),
            subdirectory: subdirectory.into(),
            file_name: file_name.to_string(),
        }
    }

    /// Returns a new ResourcePath for a file relative to the current one.
    /// Path starting with '/' are relative to the root folder.
    pub fn relative_path(&self, file_name: &str) -> Result<Self> {
        let components = Path::new(file_name)
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::CurDir | Component::Prefix(_)))
            .collect::<Vec<_>>();
        let Some((last, directories)) = components.split_last() else {
            bail!("Invalid file name '{file_name}'");
        };
        let directories = directories.iter().collect::<PathBuf>();

        let subdirectory = if file_name.starts_with(['/', '\\']) {
            directories
        } else {
            self.subdirectory.join(directories)
        };

        Ok(Self {
            root_path: Arc::clone(&self.root_path),
            subdirectory,
            file_name: last.as_os_str().to_string_lossy().to_string(),
        })
    }

    /// The path as seen from the working directory, without touching the file system.
    pub fn full_path(&self) -> PathBuf {
        self.root_path.join(&self.subdirectory).join(&self.file_name)
    }

    /// Returns the path relative to the present working directory.
    /// If the file is not in the present working directory, the path is absolute.
    pub fn to_pwd_relative_path(&self) -> Result<String> {
        let absolute_path = self.absolute_path()?;
        let pwd = std::env::current_dir()?;
        let path = absolute_path.strip_prefix(&pwd).unwrap_or(&absolute_path);
        Ok(path
            .to_str()
            .with_context(|| format!("Failed to convert path to string: {:?}", path))?
            .to_string())
    }

    pub fn absolute_path(&self) -> Result<PathBuf> {
        canonicalize(self.full_path()).map_err(|e| {
            anyhow!("Failed to get absolute path for '{}': {e}", self.full_path().display())
        })
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.full_path().display())
    }
}

impl fmt::Debug for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_pwd_relative_path() {
            Ok(relative_path) => write!(f, "{relative_path}"),
            Err(_) => write!(f, "{:?}", self.full_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_path() -> ResourcePath {
        ResourcePath::new(&Arc::new(PathBuf::from("app")), MODELS_FOLDER, "ship.gltf")
    }

    #[test]
    fn relative_path_resolves_from_current_directory() {
        let texture = model_path().relative_path("textures/hull.png").unwrap();
        assert_eq!(texture.subdirectory, Path::new("models/textures"));
        assert_eq!(texture.file_name, "hull.png");
        assert_eq!(texture.full_path(), Path::new("app/models/textures/hull.png"));
    }

    #[test]
    fn relative_path_with_plain_file_name_stays_in_directory() {
        let texture = model_path().relative_path("hull.png").unwrap();
        assert_eq!(texture.subdirectory, Path::new(MODELS_FOLDER));
    }

    #[test]
    fn rooted_path_resolves_from_root_folder() {
        let shader = model_path().relative_path("/shaders/outline.wgsl").unwrap();
        assert_eq!(shader.subdirectory, Path::new(SHADERS_FOLDER));
        assert_eq!(shader.full_path(), Path::new("app/shaders/outline.wgsl"));
    }

    #[test]
    fn empty_file_name_is_an_error() {
        assert!(model_path().relative_path("").is_err());
        assert!(model_path().relative_path("/").is_err());
    }
}
