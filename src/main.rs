//! 程序入口：初始化日志、解析参数，逐个工作表写出JSON

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;

use export_sheets::utils::fs::default_input_path;
use export_sheets::{ConvertOptions, ExportDocument};

/// 将按工作表组织的XML导出文档转换为每表一份JSON
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// 输入XML文件（默认：可执行文件同目录下的 export.xml）
    input: Option<PathBuf>,
    /// 输出目录（默认：输入文件所在目录）
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> anyhow::Result<ConvertOptions> {
        let input = match &self.input {
            Some(p) => p.clone(),
            None => default_input_path().context("无法定位默认输入文件")?,
        };
        let mut opts = ConvertOptions::new(input);
        if let Some(dir) = &self.out_dir {
            opts = opts.with_output_dir(dir);
        }
        Ok(opts)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 日志写到 stderr，stdout 只保留写出文件清单
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let _ = SubscriberBuilder::default()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();

    let opts = cli.options()?;
    let doc = ExportDocument::load_file(&opts.input)
        .with_context(|| format!("加载导出文档失败: {}", opts.input.display()))?;

    let out_dir = opts.resolved_output_dir();
    // 逐个文件输出，失败前已写出的文件也会列出
    doc.write_sheets_with(&out_dir, |path| println!("已写入: {}", path.display()))
        .with_context(|| format!("写出工作表失败: {}", out_dir.display()))?;
    Ok(())
}
