use crate::core::Storage;
use crate::utils::error::Result;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    /// 先寫入暫存檔再改名，失敗時不會留下不完整的檔案
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let relative = Path::new(path);
        // 只接受輸出目錄下的相對路徑
        let contained = relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to write '{}' outside {}", path, self.base_path),
            )
            .into());
        }
        let full_path = Path::new(&self.base_path).join(relative);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut partial_name = full_path.clone().into_os_string();
        partial_name.push(".part");
        let partial_path = PathBuf::from(partial_name);
        if let Err(e) = fs::write(&partial_path, data) {
            let _ = fs::remove_file(&partial_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&partial_path, &full_path) {
            let _ = fs::remove_file(&partial_path);
            return Err(e.into());
        }
        Ok(())
    }
}
