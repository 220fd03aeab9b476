//! 导出表转换工具库
//!
//! 将按 `<sheet name="...">` 组织的XML导出文档转换为每个工作表一份JSON
//! 核心为元素映射器：属性、同名分组、点号嵌套与 lineN 序列

pub mod model;
pub mod utils;

// 重新导出主要类型
pub use model::data_core::{ConversionSummary, ConvertError, ConvertOptions, ExportDocument};
pub use model::mapper::{map_node, set_nested};
pub use model::xml_tree::XmlNode;
