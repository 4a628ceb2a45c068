//! 内容分类器：一条规则对应一个实例，对单个文件给出“命中 / 未命中”
//!
//! 约定：
//! - 先做大小闸门，超限文件不读取任何内容；读取时同样按上限截断，
//!   长度查询之后变大的流按超限处理；
//! - 按 `MatchLocation` 分派到字节 / 文本 / 长度 / 摘要策略；
//! - 各策略内部返回 `Result`，在 `classify()` 边界折叠为 bool，
//!   失败信息写入 sink，绝不向调用方传播（包括 panic）。
use serde::Serialize;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{ClassifyError, RuleError};
use crate::file::{FileHandle, FileInfo};
use crate::hash::md5_reader_capped;
use crate::options::ClassifierOptions;
use crate::rules::{MatchLocation, Rule};
use crate::sink::ResultSink;
use crate::text::{TextMatcher, TextResult, WordListMatcher};

/// 单次命中的结构化结果（交给 sink 后由其持有）
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: FileInfo,
    pub rule: Arc<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_result: Option<TextResult>,
    /// 文件来自压缩包时记录其来源
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_archive: Option<String>,
}

/// 策略执行的内部结果
enum Outcome {
    Skipped { size: u64 },
    /// 长度查询时未超限，但读取到的内容超过了上限
    Overran,
    NoMatch,
    Match { size: u64, text_result: Option<TextResult> },
}

/// 内容分类器（无跨调用状态，可在多线程间共享同一实例）
pub struct ContentClassifier {
    rule: Arc<Rule>,
    text: Option<Arc<dyn TextMatcher>>,
    options: ClassifierOptions,
    sink: Arc<dyn ResultSink>,
}

impl ContentClassifier {
    /// 构建分类器；文本规则在此编译词表
    pub fn new(rule: Arc<Rule>, options: ClassifierOptions, sink: Arc<dyn ResultSink>) -> Result<Self, RuleError> {
        let text = match &rule.location {
            MatchLocation::ContentText(spec) => {
                let m = WordListMatcher::from_spec(&rule.name, spec, options.match_context_bytes)?;
                Some(Arc::new(m) as Arc<dyn TextMatcher>)
            }
            _ => None,
        };
        Ok(Self { rule, text, options, sink })
    }

    /// 使用外部提供的文本子匹配器
    pub fn with_text_matcher(
        rule: Arc<Rule>,
        matcher: Arc<dyn TextMatcher>,
        options: ClassifierOptions,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self { rule, text: Some(matcher), options, sink }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    /// 对单个文件执行分类；命中时向 sink 推送一条结果并返回 true
    ///
    /// `source_archive` 为空字符串时视为未提供。
    pub fn classify(&self, file: &dyn FileHandle, source_archive: Option<&str>) -> bool {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_classify(file))).unwrap_or_else(|payload| {
            Err(ClassifyError::Panicked {
                path: file.path().to_path_buf(),
                rule: self.rule.name.clone(),
                message: panic_message(payload.as_ref()),
            })
        });

        match outcome {
            Ok(Outcome::Match { size, text_result }) => {
                let result = FileResult {
                    file: FileInfo::snapshot(file, size),
                    rule: Arc::clone(&self.rule),
                    text_result,
                    source_archive: source_archive.filter(|s| !s.is_empty()).map(str::to_string),
                };
                self.sink.file_result(result);
                true
            }
            Ok(Outcome::NoMatch) => false,
            Ok(Outcome::Skipped { size }) => {
                self.sink.trace(format!(
                    "The following file was bigger than the max size to grep ({} > {} bytes): {}",
                    size,
                    self.options.max_size_to_grep,
                    file.path().display()
                ));
                false
            }
            Ok(Outcome::Overran) => {
                self.sink.trace(format!(
                    "The following file grew past the max size to grep ({} bytes) while being read: {}",
                    self.options.max_size_to_grep,
                    file.path().display()
                ));
                false
            }
            Err(e) if e.is_local() => {
                self.sink.trace(e.to_string());
                false
            }
            Err(e) => {
                self.sink.error(e.to_string());
                false
            }
        }
    }

    fn try_classify(&self, file: &dyn FileHandle) -> Result<Outcome, ClassifyError> {
        let size = file.len().map_err(|e| ClassifyError::io(file.path(), e))?;
        if size > self.options.max_size_to_grep {
            return Ok(Outcome::Skipped { size });
        }

        let (matched, text_result) = match &self.rule.location {
            MatchLocation::ContentBytes => {
                // 读取失败同样上报为“不支持”，保证该策略总是以错误结束
                let bytes = match self.read_capped(file) {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => return Ok(Outcome::Overran),
                    Err(_) => return Err(self.unsupported_bytes()),
                };
                (self.byte_match(&bytes)?, None)
            }
            MatchLocation::ContentText(_) => {
                let matcher = self.text.as_ref().ok_or_else(|| ClassifyError::Misconfigured {
                    rule: self.rule.name.clone(),
                    reason: "text rule has no text matcher".to_string(),
                })?;
                let Some(bytes) = self.read_capped(file)? else {
                    return Ok(Outcome::Overran);
                };
                let text = String::from_utf8_lossy(&bytes);
                let hit = matcher.text_match(&text);
                (hit.is_some(), hit)
            }
            MatchLocation::Length(_) => (self.size_match(size), None),
            MatchLocation::Hash(_) => match self.digest_match(file)? {
                Some(matched) => (matched, None),
                None => return Ok(Outcome::Overran),
            },
            MatchLocation::Unrecognized(_) => {
                return Err(ClassifyError::Misconfigured {
                    rule: self.rule.name.clone(),
                    reason: format!("unknown match location `{}`", self.rule.location.as_str()),
                })
            }
        };

        if matched {
            Ok(Outcome::Match { size, text_result })
        } else {
            Ok(Outcome::NoMatch)
        }
    }

    /// 长度规则：文件字节数与规则长度精确相等
    pub fn size_match(&self, size: u64) -> bool {
        matches!(self.rule.location, MatchLocation::Length(n) if n == size)
    }

    /// 摘要规则：流式计算文件 MD5，与规则摘要比较（规范化后大小写不敏感）
    ///
    /// 最多读取 `max_size_to_grep` 字节；流超过上限时返回 `Ok(None)`。
    pub fn digest_match(&self, file: &dyn FileHandle) -> Result<Option<bool>, ClassifyError> {
        let MatchLocation::Hash(expected) = &self.rule.location else {
            return Ok(Some(false));
        };
        let mut reader = file.open().map_err(|e| ClassifyError::io(file.path(), e))?;
        let actual = md5_reader_capped(&mut reader, self.options.max_size_to_grep)
            .map_err(|e| ClassifyError::io(file.path(), e))?;
        Ok(actual.map(|d| d.to_string() == expected.to_string()))
    }

    /// 字节级匹配尚未实现：显式报错，而不是静默返回未命中
    pub fn byte_match(&self, _bytes: &[u8]) -> Result<bool, ClassifyError> {
        Err(self.unsupported_bytes())
    }

    fn unsupported_bytes(&self) -> ClassifyError {
        ClassifyError::Unsupported { rule: self.rule.name.clone(), strategy: "byte-based content" }
    }

    /// 读取全部内容，最多 `max_size_to_grep` 字节；超过上限返回 `Ok(None)`
    fn read_capped(&self, file: &dyn FileHandle) -> Result<Option<Vec<u8>>, ClassifyError> {
        let cap = self.options.max_size_to_grep;
        let reader = file.open().map_err(|e| ClassifyError::io(file.path(), e))?;
        let mut buf = Vec::new();
        reader
            .take(cap.saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|e| ClassifyError::io(file.path(), e))?;
        Ok((buf.len() as u64 <= cap).then_some(buf))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Md5Digest;
    use crate::sink::{ChannelSink, SinkReceiver};

    fn classifier(location: MatchLocation) -> (ContentClassifier, SinkReceiver) {
        let (sink, rx) = ChannelSink::unbounded();
        let rule = Arc::new(Rule::new("unit", location));
        (ContentClassifier::new(rule, ClassifierOptions::default(), Arc::new(sink)).unwrap(), rx)
    }

    #[test]
    fn size_match_only_applies_to_length_rules() {
        let (c, _rx) = classifier(MatchLocation::Length(0));
        assert!(c.size_match(0));
        assert!(!c.size_match(1));
        let (c, _rx) = classifier(MatchLocation::ContentBytes);
        assert!(!c.size_match(0));
    }

    #[test]
    fn byte_match_is_unsupported() {
        let (c, _rx) = classifier(MatchLocation::ContentBytes);
        assert!(matches!(c.byte_match(b"abc"), Err(ClassifyError::Unsupported { .. })));
    }

    #[test]
    fn digest_comparison_uses_canonical_form() {
        let lower = Md5Digest::parse("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        let upper = Md5Digest::parse("D41D8CD98F00B204E9800998ECF8427E").unwrap();
        assert_eq!(lower.to_string(), upper.to_string());
    }

    #[test]
    fn file_result_serializes_rule_and_omits_empty_fields() {
        let rule = Arc::new(Rule::new("cred-file", MatchLocation::Length(42)).with_triage(crate::rules::Triage::Red));
        let result = FileResult {
            file: FileInfo { path: "share/creds.txt".into(), size: 42, modified_unix: None },
            rule,
            text_result: None,
            source_archive: None,
        };
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["file"]["size"], 42);
        assert_eq!(v["rule"]["name"], "cred-file");
        assert_eq!(v["rule"]["triage"], "red");
        assert_eq!(v["rule"]["location"]["kind"], "length");
        assert_eq!(v["rule"]["location"]["param"], 42);
        assert!(v.get("text_result").is_none());
        assert!(v.get("source_archive").is_none());
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let p: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
        let p: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }
}
