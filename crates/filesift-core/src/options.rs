//! 分类选项、批量调度选项与统计信息（模块）

/// 默认的内容检查上限（字节）
pub const DEFAULT_MAX_SIZE_TO_GREP: u64 = 1_000_000;
/// 文本命中时上下文的默认宽度（命中前后各多少字节）
pub const DEFAULT_MATCH_CONTEXT_BYTES: usize = 200;

/// 分类器选项（构造时注入，不读取全局状态）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierOptions {
    /// 超过该大小的文件不做任何检查，直接跳过
    pub max_size_to_grep: u64,
    /// 文本命中的上下文宽度
    pub match_context_bytes: usize,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            max_size_to_grep: DEFAULT_MAX_SIZE_TO_GREP,
            match_context_bytes: DEFAULT_MATCH_CONTEXT_BYTES,
        }
    }
}

/// 批量分类选项
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// 线程数：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub threads: Option<usize>,
}

/// 批量分类统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub files_seen: usize,
    pub matches: usize,
}
