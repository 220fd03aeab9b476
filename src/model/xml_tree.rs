//! XML元素树：把导出文档读成只读的节点树，供映射器递归转换

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::model::data_core::ConvertError;

/// XML 元素节点（只保留标签、属性、子元素与文本）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// 标签名（原样保留，含可能的 `prefix:` 前缀）
    pub tag: String,
    /// 属性列表，按声明顺序
    pub attrs: Vec<(String, String)>,
    /// 子元素，按文档顺序
    pub children: Vec<XmlNode>,
    /// 原始文本内容（未去除空白）
    pub text: String,
}

impl XmlNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// 按名称查找属性值
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 按标签名筛选直接子元素
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// 从字符串解析根元素
    pub fn parse_str(xml: &str) -> Result<XmlNode, ConvertError> {
        Self::from_reader(xml.as_bytes())
    }

    /// 从任意 BufRead 读取并构建根元素
    pub fn from_reader<R: BufRead>(source: R) -> Result<XmlNode, ConvertError> {
        let mut reader = Reader::from_reader(source);
        let mut buf = Vec::new();

        // 打开中的元素栈；根元素完成后放入 root
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let node = start_node(&reader, e)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(ConvertError::Structure(format!(
                            "根元素之后出现多余元素: <{}>",
                            node.tag
                        )));
                    }
                    stack.push(node);
                }
                Event::Empty(ref e) => {
                    let node = start_node(&reader, e)?;
                    close_node(&mut stack, &mut root, node)?;
                }
                Event::End(ref e) => {
                    let tag = decode(&reader, e.name().as_ref())?;
                    let node = stack.pop().ok_or_else(|| {
                        ConvertError::Structure(format!("多余的结束标签: </{}>", tag))
                    })?;
                    if node.tag != tag {
                        return Err(ConvertError::Structure(format!(
                            "结束标签不匹配: 期望 </{}>，实际 </{}>",
                            node.tag, tag
                        )));
                    }
                    close_node(&mut stack, &mut root, node)?;
                }
                Event::Text(ref t) => {
                    let text = normalize_line_ends(&decode(&reader, t)?);
                    append_text(&mut stack, &text)?;
                }
                Event::CData(ref t) => {
                    let text = normalize_line_ends(&decode(&reader, t)?);
                    append_text(&mut stack, &text)?;
                }
                Event::GeneralRef(ref r) => {
                    // 引用展开后的字符不参与换行规范化
                    let resolved = resolve_reference(&decode(&reader, r)?)?;
                    append_text(&mut stack, &resolved)?;
                }
                Event::Eof => break,
                // 注释、处理指令、声明、DOCTYPE 均忽略
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(ConvertError::Structure(format!(
                "文档结束时元素未闭合: <{}>",
                open.tag
            )));
        }
        root.ok_or_else(|| ConvertError::Structure("未找到根元素".into()))
    }
}

/// 由开始标签创建节点（属性解码并反转义）
fn start_node<R>(reader: &Reader<R>, e: &BytesStart<'_>) -> Result<XmlNode, ConvertError> {
    let mut node = XmlNode::new(decode(reader, e.name().as_ref())?);
    for attr in e.attributes() {
        let attr = attr?;
        let key = decode(reader, attr.key.as_ref())?;
        let value = attr.decode_and_unescape_value(reader.decoder())?;
        node.attrs.push((key, value.into_owned()));
    }
    Ok(node)
}

/// 元素闭合：挂到父元素下，或成为根元素
fn close_node(
    stack: &mut Vec<XmlNode>,
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), ConvertError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(ConvertError::Structure(format!(
            "根元素之后出现多余元素: <{}>",
            node.tag
        )));
    }
    *root = Some(node);
    Ok(())
}

/// 按文档编码解码；非法字节序列作为解析错误返回
fn decode<R>(reader: &Reader<R>, bytes: &[u8]) -> Result<String, ConvertError> {
    let text = reader
        .decoder()
        .decode(bytes)
        .map_err(quick_xml::Error::from)?;
    Ok(text.into_owned())
}

/// 换行规范化：`\r\n` 与单独的 `\r` 均转为 `\n`
fn normalize_line_ends(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// 文本追加到当前元素；根元素之外只允许空白
fn append_text(stack: &mut [XmlNode], text: &str) -> Result<(), ConvertError> {
    match stack.last_mut() {
        Some(node) => {
            node.text.push_str(text);
            Ok(())
        }
        None if is_blank(text) => Ok(()),
        None => Err(ConvertError::Structure(format!(
            "根元素之外出现文本: {:?}",
            text.trim()
        ))),
    }
}

/// 空白（含 BOM）
fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c == '\u{feff}')
}

/// 解析实体引用：预定义实体与数字字符引用
fn resolve_reference(name: &str) -> Result<String, ConvertError> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| ConvertError::Structure(format!("无效的字符引用: &{};", name)));
    }
    quick_xml::escape::resolve_predefined_entity(name)
        .map(String::from)
        .ok_or_else(|| ConvertError::Structure(format!("未知实体: &{};", name)))
}
