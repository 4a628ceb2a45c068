//! 文本子匹配器（接口 + 基于词表的默认实现）
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::error::RuleError;
use crate::rules::{TextSpec, WordListType};

/// 文本命中详情
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextResult {
    /// 命中的词表条目
    pub matched_strings: Vec<String>,
    /// 命中位置附近的上下文
    pub match_context: String,
}

/// 文本子匹配器：给定解码后的文件文本，返回命中详情或 None
pub trait TextMatcher: Send + Sync {
    fn text_match(&self, text: &str) -> Option<TextResult>;
}

enum Engine {
    /// 纯 ASCII 的 Contains 词表：大小写不敏感的 AC 自动机
    Literal(AhoCorasick),
    /// 其余类型：每个词条一条正则（与 word_list 一一对应）
    Patterns(Vec<Regex>),
}

/// 默认实现：按 `WordListType` 解释词表，首个命中即返回
pub struct WordListMatcher {
    words: Vec<String>,
    engine: Engine,
    context_bytes: usize,
}

impl WordListMatcher {
    /// 从规则的文本参数构建匹配器
    pub fn from_spec(rule_name: &str, spec: &TextSpec, context_bytes: usize) -> Result<Self, RuleError> {
        let engine = match spec.word_list_type {
            // AC 只支持 ASCII 大小写折叠；含非 ASCII 词条时退回 Unicode 正则
            WordListType::Contains if spec.word_list.iter().all(|w| w.is_ascii()) => {
                let ac = AhoCorasickBuilder::new()
                    .ascii_case_insensitive(true)
                    .match_kind(MatchKind::LeftmostFirst)
                    .build(&spec.word_list)
                    .map_err(|source| RuleError::BadWordList { rule: rule_name.to_string(), source })?;
                Engine::Literal(ac)
            }
            kind => {
                let mut patterns = Vec::with_capacity(spec.word_list.len());
                for word in &spec.word_list {
                    let pat = anchored_pattern(kind, word);
                    let rx = RegexBuilder::new(&pat)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| RuleError::BadPattern { rule: rule_name.to_string(), source })?;
                    patterns.push(rx);
                }
                Engine::Patterns(patterns)
            }
        };
        Ok(Self { words: spec.word_list.clone(), engine, context_bytes })
    }

    fn hit(&self, text: &str, word_idx: usize, start: usize, end: usize) -> TextResult {
        TextResult {
            matched_strings: vec![self.words[word_idx].clone()],
            match_context: context_window(text, start, end, self.context_bytes).to_string(),
        }
    }
}

impl TextMatcher for WordListMatcher {
    fn text_match(&self, text: &str) -> Option<TextResult> {
        match &self.engine {
            Engine::Literal(ac) => ac
                .find(text)
                .map(|m| self.hit(text, m.pattern().as_usize(), m.start(), m.end())),
            Engine::Patterns(patterns) => patterns
                .iter()
                .enumerate()
                .find_map(|(i, rx)| rx.find(text).map(|m| self.hit(text, i, m.start(), m.end()))),
        }
    }
}

/// 将词条转换为对应类型的正则；非 Regex 类型按字面量转义
fn anchored_pattern(kind: WordListType, word: &str) -> String {
    match kind {
        WordListType::Regex => word.to_string(),
        WordListType::Exact => format!(r"\A(?:{})\z", regex::escape(word)),
        WordListType::StartsWith => format!(r"\A(?:{})", regex::escape(word)),
        WordListType::EndsWith => format!(r"(?:{})\z", regex::escape(word)),
        WordListType::Contains => regex::escape(word),
    }
}

/// 以命中区间为中心截取上下文（前后各 `width` 字节，向内收缩到字符边界）
fn context_window(text: &str, start: usize, end: usize, width: usize) -> &str {
    let mut s = start.saturating_sub(width);
    while !text.is_char_boundary(s) {
        s += 1;
    }
    let mut e = end.saturating_add(width).min(text.len());
    while !text.is_char_boundary(e) {
        e -= 1;
    }
    &text[s..e]
}
