use std::{
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
};

/// A plugin discovery file pointing the container runtime at our API.
///
/// The file is removed again when this value is dropped.
#[derive(Debug)]
pub struct SpecFile {
    path: PathBuf,
}

impl SpecFile {
    /// Write `<dir>/<name>.spec` containing `tcp://<addr>`
    pub fn write(dir: &Path, name: &str, addr: SocketAddr) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.spec"));
        std::fs::write(&path, format!("tcp://{addr}"))?;
        log::debug!("Wrote plugin spec file {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpecFile {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            log::warn!(
                "Failed to remove plugin spec file {}: {}",
                self.path.display(),
                error
            );
        }
    }
}
