//! 元素映射器：XML 元素树 → JSON 值（属性、同名分组、点号嵌套、lineN 序列）

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::model::xml_tree::XmlNode;

/// 属性对象的键名
pub const ATTRS_KEY: &str = "_attrs";
/// 叶子文本的键名
pub const VALUE_KEY: &str = "value";

/// 将一个元素递归映射为 JSON 对象
pub fn map_node(node: &XmlNode) -> Value {
    let mut obj = Map::new();

    if !node.attrs.is_empty() {
        let attrs: Map<String, Value> = node
            .attrs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        obj.insert(ATTRS_KEY.to_string(), Value::Object(attrs));
    }

    // 叶子：只取去除首尾空白后的文本
    if node.children.is_empty() {
        let text = node.text.trim();
        if !text.is_empty() {
            obj.insert(VALUE_KEY.to_string(), Value::String(text.to_string()));
        }
        return Value::Object(obj);
    }

    let (lines, others): (Vec<&XmlNode>, Vec<&XmlNode>) =
        node.children.iter().partition(|c| is_line_tag(&c.tag));

    // lineN 按文档顺序收集，不按数字排序
    if !lines.is_empty() {
        let items = lines.into_iter().map(map_node).collect();
        obj.insert(list_key(&node.tag).to_string(), Value::Array(items));
    }

    for (tag, group) in group_by_tag(others) {
        let value = if group.len() == 1 {
            map_node(group[0])
        } else {
            Value::Array(group.into_iter().map(map_node).collect())
        };
        set_nested(&mut obj, tag, value);
    }

    Value::Object(obj)
}

/// 按点号路径写入值；末段已存在时合并为数组
pub fn set_nested(target: &mut Map<String, Value>, dotted_key: &str, value: Value) {
    let parts: Vec<&str> = dotted_key.split('.').collect();
    insert_path(target, &parts, value);
}

/// 逐段下降：中间段保证为对象（非对象值被新的空对象覆盖），末段按合并规则写入
fn insert_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => merge_into(map, last, value),
        [head, rest @ ..] => {
            let slot = map.entry(head.to_string()).or_insert(Value::Null);
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}

/// 末段合并规则：不存在则写入；已是数组则追加；否则升级为 `[旧值, 新值]`
fn merge_into(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let old = existing.take();
            *existing = Value::Array(vec![old, value]);
        }
    }
}

/// 是否为 `line` + 十进制数字 形式的标签（`\d` 含全部 Unicode 十进制数字）
pub fn is_line_tag(tag: &str) -> bool {
    static RE_LINE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^line\d+$").expect("lineN 正则应该合法"));
    RE_LINE.is_match(tag)
}

/// 由父元素标签推导数组键：取最后一个 `.` 之后的部分
pub fn list_key(parent_tag: &str) -> &str {
    parent_tag.rsplit('.').next().unwrap_or(parent_tag)
}

/// 按标签分组，组顺序为首次出现顺序，组内保持文档顺序
fn group_by_tag(children: Vec<&XmlNode>) -> Vec<(&str, Vec<&XmlNode>)> {
    let mut groups: Vec<(&str, Vec<&XmlNode>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for child in children {
        match index.get(child.tag.as_str()) {
            Some(&i) => groups[i].1.push(child),
            None => {
                index.insert(child.tag.as_str(), groups.len());
                groups.push((child.tag.as_str(), vec![child]));
            }
        }
    }
    groups
}
