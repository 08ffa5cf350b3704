// xml/json.rs
//! Mechanical XML ⇄ JSON mapping: each element becomes an object with
//! `#name`, `#attributes` and `#nodes`; text nodes become plain strings;
//! attribute values are always strings.

use serde_json::{Map, Value, json};

use super::{Element, Node};
use crate::error::{Error, Result};

pub fn element_to_json(elem: &Element) -> Value {
    let mut attrs = Map::new();
    for (k, v) in elem.attrs() {
        attrs.insert(k.to_string(), Value::String(v.to_string()));
    }
    let nodes: Vec<Value> = elem
        .nodes()
        .iter()
        .map(|n| match n {
            Node::Element(e) => element_to_json(e),
            Node::Text(t) => Value::String(t.clone()),
        })
        .collect();
    json!({
        "#name": elem.name(),
        "#attributes": Value::Object(attrs),
        "#nodes": Value::Array(nodes),
    })
}

pub fn element_from_json(value: &Value) -> Result<Element> {
    let obj = value.as_object().ok_or(Error::InvalidStructure("JSON element is not an object"))?;
    let name = obj
        .get("#name")
        .and_then(Value::as_str)
        .ok_or(Error::InvalidStructure("JSON element has no #name"))?;
    let mut elem = Element::new(name);

    if let Some(attrs) = obj.get("#attributes") {
        let attrs =
            attrs.as_object().ok_or(Error::InvalidStructure("#attributes is not an object"))?;
        for (k, v) in attrs {
            let v = v.as_str().ok_or(Error::InvalidStructure("attribute value is not a string"))?;
            elem.set_attr(k, v);
        }
    }
    if let Some(nodes) = obj.get("#nodes") {
        let nodes = nodes.as_array().ok_or(Error::InvalidStructure("#nodes is not an array"))?;
        for node in nodes {
            match node {
                Value::String(text) => elem.add_text(text.clone()),
                other => elem.add_child(element_from_json(other)?),
            }
        }
    }
    Ok(elem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_identity() {
        let xml = r#"<tsduck>
  <pat version="7" current="true">
    <service service_id="3" program_map_pid="0x0005"/>
  </pat>
  <generic_short_table table_id="0xAB" private="false">01 02 03</generic_short_table>
</tsduck>"#;
        let root = super::super::parse_document(xml).unwrap();
        let json1 = element_to_json(&root);
        let back = element_from_json(&json1).unwrap();
        assert_eq!(back, root);
        assert_eq!(element_to_json(&back), json1);
    }

    #[test]
    fn attributes_stay_strings() {
        let mut e = Element::new("pat");
        e.set_attr_dec("version", 7);
        let v = element_to_json(&e);
        assert_eq!(v["#attributes"]["version"], Value::String("7".into()));
    }
}
