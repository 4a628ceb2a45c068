use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filesift_core::{
    classify_all, load_rules, BatchFile, BatchOptions, ChannelSink, ClassifierOptions, ContentClassifier, FileHandle, LocalFile,
    SinkMessage, DEFAULT_MATCH_CONTEXT_BYTES, DEFAULT_MAX_SIZE_TO_GREP,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, trace, warn};
use walkdir::WalkDir;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "filesift", version, about = "按规则对文件内容进行分类")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描目录，将命中结果按 JSON Lines 输出
    Scan {
        /// 输入目录
        #[arg(long)]
        input: PathBuf,

        /// 输出文件；"-" 表示标准输出
        #[arg(long, default_value = "-")]
        output: String,

        /// 线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 内容检查的文件大小上限（字节），超过则跳过
        #[arg(long, default_value_t = DEFAULT_MAX_SIZE_TO_GREP)]
        max_size_to_grep: u64,

        /// 文本命中时前后保留的上下文字节数
        #[arg(long, default_value_t = DEFAULT_MATCH_CONTEXT_BYTES)]
        context_bytes: usize,

        /// 目录遍历的最大深度（默认不限）
        #[arg(long)]
        max_depth: Option<usize>,

        /// 规则文件路径（TOML），默认 ./rules/default.toml
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、trace）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { input, output, threads, max_size_to_grep, context_bytes, max_depth, rules } => {
            info!(?input, %output, "starting scan");

            let rules_path = rules.unwrap_or_else(|| PathBuf::from("./rules/default.toml"));
            let rules = load_rules(&rules_path)?;

            let options = ClassifierOptions { max_size_to_grep, match_context_bytes: context_bytes };
            let (sink, receiver) = ChannelSink::unbounded();
            let sink = Arc::new(sink);
            let classifiers = rules
                .into_iter()
                .map(|r| ContentClassifier::new(Arc::new(r), options, sink.clone()))
                .collect::<Result<Vec<_>, _>>()
                .context("build classifiers")?;
            // 写端只由分类器持有，扫描线程结束后读端自然收到关闭信号
            drop(sink);

            let files = collect_files(&input, max_depth);
            info!(files = files.len(), rules = classifiers.len(), "classifying");

            let batch = BatchOptions { threads: parse_threads(&threads) };
            let scan_thread = std::thread::spawn(move || classify_all(&files, &classifiers, &batch));

            // Writer：在当前线程消费 sink，结果逐行写出
            let mut out: Box<dyn Write> = if output == "-" {
                Box::new(BufWriter::new(std::io::stdout().lock()))
            } else {
                Box::new(BufWriter::new(File::create(&output).context("create output file")?))
            };
            for msg in receiver.iter() {
                match msg {
                    SinkMessage::FileResult(r) => {
                        serde_json::to_writer(&mut out, &r)?;
                        writeln!(out)?;
                    }
                    SinkMessage::Trace(m) => trace!("{m}"),
                    SinkMessage::Error(m) => warn!("{m}"),
                }
            }
            out.flush().ok();

            let stats = scan_thread
                .join()
                .map_err(|_| anyhow::anyhow!("scan thread panicked"))??;
            info!(files_seen = stats.files_seen, matches = stats.matches, "scan finished");
        }
    }

    Ok(())
}

/// 遍历输入目录，收集普通文件；遍历错误只记日志
fn collect_files(input: &Path, max_depth: Option<usize>) -> Vec<BatchFile<LocalFile>> {
    let mut walker = WalkDir::new(input).min_depth(1);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }
    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("walk error: {e}");
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(BatchFile::new(LocalFile::new(entry.into_path())));
        }
    }
    // 按路径排序，保证调度顺序可复现
    files.sort_by(|a, b| a.handle.path().cmp(b.handle.path()));
    files
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=trace
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
