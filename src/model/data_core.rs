//! ExportDocument：导出文档核心状态与按工作表转换

use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::mapper::{map_node, set_nested};
use crate::model::xml_tree::XmlNode;
use crate::utils::fs::{read_xml_file, sheet_output_path, write_json_file};

/// 工作表元素的标签名
pub const SHEET_TAG: &str = "sheet";
/// 工作表名称属性
pub const SHEET_NAME_ATTR: &str = "name";

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("文件不存在: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML解析失败: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML属性解析失败: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("XML结构错误: {0}")]
    Structure(String),
    #[error("JSON序列化失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("无效的工作表名称: {0:?}")]
    InvalidSheetName(String),
}

/// 转换参数
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input: PathBuf,
    /// 输出目录；为空时使用输入文件所在目录
    pub output_dir: Option<PathBuf>,
}

impl ConvertOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// 实际输出目录
    pub fn resolved_output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// 一次转换的汇总
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    /// 已转换的工作表名称（文档顺序）
    pub converted: Vec<String>,
    /// 因缺少 name 属性而跳过的工作表数
    pub skipped: usize,
}

#[derive(Debug)]
pub struct ExportDocument {
    pub source_path: Option<PathBuf>,
    pub root: XmlNode,
}

impl ExportDocument {
    pub fn new(root: XmlNode) -> Self {
        Self {
            source_path: None,
            root,
        }
    }

    /// 加载XML文件
    pub fn load_file(p: &Path) -> Result<Self, ConvertError> {
        let root = read_xml_file(p)?;
        tracing::info!("已加载导出文档: {}，根元素 <{}>", p.display(), root.tag);
        Ok(Self {
            source_path: Some(p.to_path_buf()),
            root,
        })
    }

    pub fn from_reader<R: BufRead>(source: R) -> Result<Self, ConvertError> {
        Ok(Self::new(XmlNode::from_reader(source)?))
    }

    pub fn parse_str(xml: &str) -> Result<Self, ConvertError> {
        Ok(Self::new(XmlNode::parse_str(xml)?))
    }

    /// 带非空 name 属性的工作表，按文档顺序
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &XmlNode)> + '_ {
        self.root
            .children_named(SHEET_TAG)
            .filter_map(|sheet| match sheet.attr(SHEET_NAME_ATTR) {
                Some(name) if !name.is_empty() => Some((name, sheet)),
                _ => None,
            })
    }

    /// 工作表 → JSON 对象：每个直接子元素映射后按点号路径合并
    pub fn convert_sheet(sheet: &XmlNode) -> Value {
        let mut result = Map::new();
        for child in &sheet.children {
            set_nested(&mut result, &child.tag, map_node(child));
        }
        Value::Object(result)
    }

    /// 逐个工作表转换并交给 sink 处理；任一失败即中止
    pub fn convert_with<F>(&self, mut sink: F) -> Result<ConversionSummary, ConvertError>
    where
        F: FnMut(&str, &Value) -> Result<(), ConvertError>,
    {
        let mut summary = ConversionSummary::default();
        let total = self.root.children_named(SHEET_TAG).count();

        for (name, sheet) in self.sheets() {
            let value = Self::convert_sheet(sheet);
            tracing::debug!("工作表 {} 转换完成，{} 个子元素", name, sheet.children.len());
            sink(name, &value)?;
            summary.converted.push(name.to_string());
        }
        summary.skipped = total - summary.converted.len();

        if summary.skipped > 0 {
            tracing::debug!("跳过 {} 个未命名工作表", summary.skipped);
        }
        Ok(summary)
    }

    /// 将所有工作表写为 `<name>.json`，返回写出的路径
    pub fn write_sheets(&self, out_dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
        self.write_sheets_with(out_dir, |_| {})
    }

    /// 同 `write_sheets`，每写出一个文件立即回调；中途失败时已写出的文件已逐个上报
    pub fn write_sheets_with<F>(
        &self,
        out_dir: &Path,
        mut on_written: F,
    ) -> Result<Vec<PathBuf>, ConvertError>
    where
        F: FnMut(&Path),
    {
        let mut written = Vec::new();
        let mut seen = HashSet::new();

        let summary = self.convert_with(|name, value| {
            let path = sheet_output_path(out_dir, name)?;
            if !seen.insert(name.to_string()) {
                tracing::debug!("工作表名称重复，覆盖: {}", path.display());
            }
            write_json_file(&path, value)?;
            tracing::debug!("已写入: {}", path.display());
            on_written(&path);
            written.push(path);
            Ok(())
        })?;

        tracing::info!(
            "转换完成：写出 {} 个工作表，跳过 {} 个",
            summary.converted.len(),
            summary.skipped
        );
        Ok(written)
    }
}
