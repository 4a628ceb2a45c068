//! 错误类型
use std::path::PathBuf;
use thiserror::Error;

/// 规则加载 / 分类器构建阶段的错误
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid rule file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("rule {rule} is missing required field `{field}`")]
    MissingField { rule: String, field: &'static str },

    #[error("not a valid MD5 digest: {digest}")]
    BadDigest { digest: String },

    #[error("rule {rule} has an invalid pattern: {source}")]
    BadPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule {rule} could not build its word list automaton: {source}")]
    BadWordList {
        rule: String,
        #[source]
        source: aho_corasick::BuildError,
    },
}

/// 单次分类过程中的错误；在 `classify()` 边界折叠为 `false` 并上报 sink
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// 本地 I/O 失败（权限、占用、瞬时故障）：视为未命中，仅记 trace
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 尚未实现的匹配策略
    #[error("{strategy} matching is not supported yet (rule {rule})")]
    Unsupported { rule: String, strategy: &'static str },

    /// 规则配置错误
    #[error("misconfigured content rule named {rule}: {reason}")]
    Misconfigured { rule: String, reason: String },

    /// 匹配过程中发生 panic
    #[error("classifying {path} with rule {rule} panicked: {message}")]
    Panicked { path: PathBuf, rule: String, message: String },
}

impl ClassifyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClassifyError::Io { path: path.into(), source }
    }

    /// 是否属于单文件的良性失败（不应作为错误上报）
    pub fn is_local(&self) -> bool {
        matches!(self, ClassifyError::Io { .. })
    }
}
