//! 规则模型与规则文件加载（TOML）
//!
//! 每条规则只声明一种匹配方式（`MatchLocation`），参数随变体携带，
//! 与该方式无关的字段在归一化时直接丢弃。
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::RuleError;

/// 命中后的严重级别（输出时随结果一起携带）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Triage {
    Black,
    Red,
    Yellow,
    #[default]
    Green,
}

/// 文本规则中词表的解释方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordListType {
    Regex,
    Exact,
    #[default]
    Contains,
    StartsWith,
    EndsWith,
}

/// 文本匹配参数：由文本子匹配器解释，分类器本身不关心
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSpec {
    pub word_list_type: WordListType,
    pub word_list: Vec<String>,
}

/// MD5 摘要（16 字节）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Md5Digest(pub [u8; 16]);

impl Md5Digest {
    /// 解析十六进制摘要：大小写不敏感，忽略 `-`、`:` 与空白分隔符
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        let cleaned: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | ':') && !c.is_whitespace())
            .collect();
        if cleaned.len() != 32 {
            return Err(RuleError::BadDigest { digest: s.to_string() });
        }
        let mut out = [0u8; 16];
        hex::decode_to_slice(&cleaned, &mut out)
            .map_err(|_| RuleError::BadDigest { digest: s.to_string() })?;
        Ok(Self(out))
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::hash::canonical_hex(&self.0))
    }
}

impl fmt::Debug for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Md5Digest({})", self)
    }
}

impl Serialize for Md5Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 匹配方式（每种方式只携带自己需要的参数）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "param", rename_all = "snake_case")]
pub enum MatchLocation {
    /// 按原始字节匹配（尚未支持，调用时报错）
    ContentBytes,
    /// 按解码后的文本匹配
    ContentText(TextSpec),
    /// 文件字节长度精确相等
    Length(u64),
    /// 全文件 MD5 相等
    Hash(Md5Digest),
    /// 规则文件里写了无法识别的匹配方式；保留下来，由分类阶段报告配置错误
    Unrecognized(String),
}

impl MatchLocation {
    /// 规则文件中对应的名称
    pub fn as_str(&self) -> &str {
        match self {
            MatchLocation::ContentBytes => "file_content_as_bytes",
            MatchLocation::ContentText(_) => "file_content_as_string",
            MatchLocation::Length(_) => "file_length",
            MatchLocation::Hash(_) => "file_md5",
            MatchLocation::Unrecognized(raw) => raw,
        }
    }
}

/// 一条内容分类规则（不可变，跨线程以 `Arc<Rule>` 共享）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: String,
    pub triage: Triage,
    pub location: MatchLocation,
}

impl Rule {
    pub fn new(name: impl Into<String>, location: MatchLocation) -> Self {
        Self { name: name.into(), triage: Triage::default(), location }
    }

    pub fn with_triage(mut self, triage: Triage) -> Self {
        self.triage = triage;
        self
    }
}

/// 单条规则的配置（字段按匹配方式选用）
#[derive(Debug, Clone, Deserialize)]
struct RuleEntry {
    pub name: String,
    pub match_location: String,
    #[serde(default)]
    pub triage: Triage,
    #[serde(default)]
    pub match_length: Option<u64>,
    #[serde(default)]
    pub match_md5: Option<String>,
    #[serde(default)]
    pub word_list_type: WordListType,
    #[serde(default)]
    pub word_list: Option<Vec<String>>,
}

/// 顶层规则文件结构
#[derive(Debug, Clone, Deserialize)]
struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl RuleEntry {
    fn into_rule(self) -> Result<Rule, RuleError> {
        let missing = |field: &'static str, name: &str| RuleError::MissingField { rule: name.to_string(), field };
        let location = match self.match_location.as_str() {
            "file_content_as_bytes" => MatchLocation::ContentBytes,
            "file_content_as_string" => {
                let word_list = self.word_list.ok_or_else(|| missing("word_list", &self.name))?;
                MatchLocation::ContentText(TextSpec { word_list_type: self.word_list_type, word_list })
            }
            "file_length" => MatchLocation::Length(self.match_length.ok_or_else(|| missing("match_length", &self.name))?),
            "file_md5" => {
                let raw = self.match_md5.ok_or_else(|| missing("match_md5", &self.name))?;
                MatchLocation::Hash(Md5Digest::parse(&raw)?)
            }
            other => MatchLocation::Unrecognized(other.to_string()),
        };
        Ok(Rule { name: self.name, triage: self.triage, location })
    }
}

/// 从 TOML 文本解析并归一化为 Rule 列表
pub fn parse_rules(txt: &str) -> Result<Vec<Rule>, RuleError> {
    let parsed: RuleFile = toml::from_str(txt)?;
    parsed.rules.into_iter().map(RuleEntry::into_rule).collect()
}

/// 从 TOML 规则文件加载
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("read rule file {}", path.display()))?;
    let rules = parse_rules(&txt).with_context(|| format!("parse rule file {}", path.display()))?;
    tracing::debug!(path = %path.display(), count = rules.len(), "rules loaded");
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_parse_is_case_and_separator_insensitive() {
        let a = Md5Digest::parse("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        let b = Md5Digest::parse("D4-1D-8C-D9-8F-00-B2-04-E9-80-09-98-EC-F8-42-7E").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "D41D8CD98F00B204E9800998ECF8427E");
    }

    #[test]
    fn digest_parse_rejects_wrong_length_and_non_hex() {
        assert!(matches!(Md5Digest::parse("abcd"), Err(RuleError::BadDigest { .. })));
        assert!(matches!(
            Md5Digest::parse("zz1d8cd98f00b204e9800998ecf8427e"),
            Err(RuleError::BadDigest { .. })
        ));
    }

    #[test]
    fn parses_every_match_location() {
        let txt = r#"
            [[rules]]
            name = "cred-file"
            match_location = "file_length"
            match_length = 42
            triage = "red"

            [[rules]]
            name = "empty-md5"
            match_location = "file_md5"
            match_md5 = "d41d8cd98f00b204e9800998ecf8427e"

            [[rules]]
            name = "passwords"
            match_location = "file_content_as_string"
            word_list_type = "regex"
            word_list = ["passw(or)?d\\s*="]

            [[rules]]
            name = "raw"
            match_location = "file_content_as_bytes"

            [[rules]]
            name = "typo"
            match_location = "file_contnet"
        "#;
        let rules = parse_rules(txt).unwrap();
        assert_eq!(rules.len(), 5);
        assert_eq!(rules[0].location, MatchLocation::Length(42));
        assert_eq!(rules[0].triage, Triage::Red);
        assert!(matches!(rules[1].location, MatchLocation::Hash(_)));
        assert_eq!(rules[1].triage, Triage::Green);
        match &rules[2].location {
            MatchLocation::ContentText(spec) => {
                assert_eq!(spec.word_list_type, WordListType::Regex);
                assert_eq!(spec.word_list.len(), 1);
            }
            other => panic!("unexpected location {other:?}"),
        }
        assert_eq!(rules[3].location, MatchLocation::ContentBytes);
        assert_eq!(rules[4].location, MatchLocation::Unrecognized("file_contnet".into()));
    }

    #[test]
    fn missing_parameter_is_an_error() {
        let txt = r#"
            [[rules]]
            name = "no-length"
            match_location = "file_length"
        "#;
        match parse_rules(txt) {
            Err(RuleError::MissingField { rule, field }) => {
                assert_eq!(rule, "no-length");
                assert_eq!(field, "match_length");
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }
}
