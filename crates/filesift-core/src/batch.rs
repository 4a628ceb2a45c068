//! 批量分类与并行调度
//!
//! 调用方负责提供文件列表（本库不遍历文件系统）；每个文件依次经过全部分类器，
//! 文件之间在 Rayon 线程池上并行。结果与诊断经各分类器自己的 sink 输出，
//! 这里只做计数。
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::classifier::ContentClassifier;
use crate::file::FileHandle;
use crate::options::{BatchOptions, BatchStats};

/// 待分类的文件及其可选的来源压缩包
pub struct BatchFile<F> {
    pub handle: F,
    pub source_archive: Option<String>,
}

impl<F> BatchFile<F> {
    pub fn new(handle: F) -> Self {
        Self { handle, source_archive: None }
    }

    pub fn from_archive(handle: F, archive: impl Into<String>) -> Self {
        Self { handle, source_archive: Some(archive.into()) }
    }
}

/// 对每个文件运行全部分类器；`threads` 为 1 时串行执行
pub fn classify_all<F: FileHandle>(
    files: &[BatchFile<F>],
    classifiers: &[ContentClassifier],
    opts: &BatchOptions,
) -> anyhow::Result<BatchStats> {
    let threads = opts.threads.unwrap_or_else(num_cpus::get).max(1);
    tracing::debug!(files = files.len(), rules = classifiers.len(), threads, "classifying batch");

    if threads == 1 {
        let mut stats = BatchStats::default();
        for f in files {
            stats.files_seen += 1;
            stats.matches += classify_one(f, classifiers);
        }
        return Ok(stats);
    }

    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let matches = AtomicUsize::new(0);
    pool.install(|| {
        files.par_iter().for_each(|f| {
            let n = classify_one(f, classifiers);
            matches.fetch_add(n, Ordering::Relaxed);
        });
    });

    Ok(BatchStats { files_seen: files.len(), matches: matches.into_inner() })
}

fn classify_one<F: FileHandle>(f: &BatchFile<F>, classifiers: &[ContentClassifier]) -> usize {
    let archive = f.source_archive.as_deref();
    classifiers.iter().filter(|c| c.classify(&f.handle, archive)).count()
}
