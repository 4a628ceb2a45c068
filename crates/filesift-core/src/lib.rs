//! 文件内容分类核心库
//!
//! 设计要点：
//! - 一条规则对应一个 `ContentClassifier`，实例无跨调用状态，可被多线程共享。
//! - 超过大小上限的文件不读取任何内容。
//! - 单文件的失败只写入 sink 并折叠为“未命中”，不会中断整体扫描。
//! - 不遍历文件系统、不去重、不持久化；这些由外层（CLI）负责。

mod batch;
mod classifier;
mod error;
mod file;
mod hash;
mod options;
mod rules;
mod sink;
mod text;

pub use batch::{classify_all, BatchFile};
pub use classifier::{ContentClassifier, FileResult};
pub use error::{ClassifyError, RuleError};
pub use file::{FileHandle, FileInfo, LocalFile};
pub use hash::{canonical_hex, md5_reader, md5_reader_capped};
pub use options::{BatchOptions, BatchStats, ClassifierOptions, DEFAULT_MATCH_CONTEXT_BYTES, DEFAULT_MAX_SIZE_TO_GREP};
pub use rules::{load_rules, parse_rules, MatchLocation, Md5Digest, Rule, TextSpec, Triage, WordListType};
pub use sink::{ChannelSink, ResultSink, SinkMessage, SinkReceiver};
pub use text::{TextMatcher, TextResult, WordListMatcher};
