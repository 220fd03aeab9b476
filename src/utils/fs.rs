//! IO helper: XML读取、JSON写出与默认路径

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde_json::Value;
use crate::model::{data_core::ConvertError, xml_tree::XmlNode};

/// 默认输入文件名（位于可执行文件同目录）
pub const DEFAULT_INPUT_FILE: &str = "export.xml";

/// 从文件读取XML并构建元素树；文件不存在时返回 NotFound
pub fn read_xml_file(p: &Path) -> Result<XmlNode, ConvertError> {
    if !p.is_file() {
        return Err(ConvertError::NotFound(p.to_path_buf()));
    }
    let f = File::open(p)?;
    XmlNode::from_reader(BufReader::new(f))
}

/// 将JSON数据保存到文件（2空格缩进，非ASCII字符原样输出）
pub fn write_json_file(p: &Path, value: &Value) -> Result<(), ConvertError> {
    let f = File::create(p)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.flush()?;
    Ok(())
}

/// 默认输入路径：可执行文件所在目录下的 export.xml
pub fn default_input_path() -> Result<PathBuf, ConvertError> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(DEFAULT_INPUT_FILE))
}

/// 工作表输出路径 `<dir>/<name>.json`；名称不能逃出输出目录
pub fn sheet_output_path(dir: &Path, sheet_name: &str) -> Result<PathBuf, ConvertError> {
    let invalid = sheet_name.is_empty()
        || sheet_name == "."
        || sheet_name == ".."
        || sheet_name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ConvertError::InvalidSheetName(sheet_name.to_string()));
    }
    Ok(dir.join(format!("{}.json", sheet_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().expect("创建临时目录失败");
        let missing = dir.path().join("export.xml");

        let result = read_xml_file(&missing);
        match result {
            Err(ConvertError::NotFound(p)) => assert_eq!(p, missing),
            other => panic!("应该返回 NotFound，实际: {:?}", other),
        }
    }

    #[test]
    fn test_read_xml_file() {
        let mut file = NamedTempFile::new().expect("创建临时文件失败");
        file.write_all(r#"<export><sheet name="a"/></export>"#.as_bytes())
            .expect("写入临时文件失败");

        let root = read_xml_file(file.path()).expect("读取应该成功");
        assert_eq!(root.tag, "export");
        assert_eq!(root.children[0].attr("name"), Some("a"));
    }

    #[test]
    fn test_write_json_pretty_unescaped() {
        let dir = tempdir().expect("创建临时目录失败");
        let path = dir.path().join("out.json");

        write_json_file(&path, &json!({"名称": {"value": "弓箭手"}})).expect("写入应该成功");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"名称\": {\n    \"value\": \"弓箭手\"\n  }\n}");
    }

    #[test]
    fn test_write_json_keeps_insertion_order() {
        let dir = tempdir().expect("创建临时目录失败");
        let path = dir.path().join("order.json");

        let mut map = serde_json::Map::new();
        map.insert("zeta".into(), json!("1"));
        map.insert("alpha".into(), json!("2"));
        write_json_file(&path, &Value::Object(map)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }

    #[test]
    fn test_sheet_output_path() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            sheet_output_path(dir, "Units").unwrap(),
            PathBuf::from("/tmp/out/Units.json")
        );
        assert_eq!(
            sheet_output_path(dir, "单位.v2").unwrap(),
            PathBuf::from("/tmp/out/单位.v2.json")
        );

        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(sheet_output_path(dir, bad), Err(ConvertError::InvalidSheetName(_))),
                "名称 {:?} 应该被拒绝",
                bad
            );
        }
    }

    #[test]
    fn test_default_input_path_file_name() {
        let path = default_input_path().expect("应该能定位可执行文件");
        assert_eq!(path.file_name().unwrap(), DEFAULT_INPUT_FILE);
    }
}
