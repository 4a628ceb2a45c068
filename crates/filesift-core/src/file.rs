//! 文件句柄抽象与本地文件实现
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// 分类器所需的文件能力：长度、字节流读取、元数据
///
/// 长度按需查询，以便共享盘上的权限/占用问题在单次调用内暴露。
pub trait FileHandle: Send + Sync {
    fn path(&self) -> &Path;
    fn len(&self) -> io::Result<u64>;
    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>>;
    fn modified(&self) -> Option<SystemTime> {
        None
    }
}

/// 本地文件系统上的文件
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileHandle for LocalFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn len(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|md| md.modified()).ok()
    }
}

/// 结果中携带的文件快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    /// 最后修改时间（Unix 秒），不可得时为 None
    pub modified_unix: Option<u64>,
}

impl FileInfo {
    pub(crate) fn snapshot(file: &dyn FileHandle, size: u64) -> Self {
        let modified_unix = file
            .modified()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        Self { path: file.path().to_path_buf(), size, modified_unix }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn local_file_reports_length_and_content() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello").unwrap();
        let f = LocalFile::new(tmp.path());
        assert_eq!(f.len().unwrap(), 5);
        let mut buf = String::new();
        f.open().unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");

        let info = FileInfo::snapshot(&f, 5);
        assert_eq!(info.path, tmp.path());
        assert!(info.modified_unix.is_some());
    }

    #[test]
    fn missing_file_surfaces_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let f = LocalFile::new(dir.path().join("gone.txt"));
        assert_eq!(f.len().unwrap_err().kind(), io::ErrorKind::NotFound);
        assert!(f.open().is_err());
        assert!(f.modified().is_none());
    }
}
