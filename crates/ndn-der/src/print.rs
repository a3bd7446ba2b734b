//! Human-readable dump of a DER tree.

use std::fmt::Write;

use crate::node::DerNode;
use crate::value::Value;

/// Render `node` and its descendants, one node per line, children indented
/// by two spaces.
#[must_use]
pub fn print_tree(node: &DerNode) -> String {
    let mut out = String::new();
    write_node(node, 0, &mut out);
    out
}

fn write_node(node: &DerNode, depth: usize, out: &mut String) {
    let _ = write!(out, "{:indent$}{} ({} bytes)", "", node.kind(), node.size(), indent = depth * 2);

    if node.kind().is_constructed() {
        out.push('\n');
        for child in node.children() {
            write_node(child, depth + 1, out);
        }
        return;
    }

    let rendered = match node.value() {
        Ok(Value::Bool(b)) => b.to_string(),
        Ok(Value::Bytes(bytes)) => hex::encode(bytes),
        Ok(Value::Text(text)) => text,
        Ok(Value::Oid(oid)) => oid.to_string(),
        Ok(Value::Timestamp(ts)) => {
            crate::time::to_iso_string(ts).unwrap_or_else(|_| ts.to_string())
        }
        Ok(Value::Unit) => String::new(),
        Err(e) => format!("<{e}>"),
    };
    if rendered.is_empty() {
        out.push('\n');
    } else {
        let _ = writeln!(out, ": {rendered}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_tree() {
        let tree = DerNode::sequence(vec![
            DerNode::printable_string("/a/b"),
            DerNode::sequence(vec![DerNode::boolean(true), DerNode::null()]),
        ]);
        let text = print_tree(&tree);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("SEQUENCE"));
        assert_eq!(lines[1], "  PrintableString (6 bytes): /a/b");
        assert_eq!(lines[3], "    BOOLEAN (3 bytes): true");
        assert_eq!(lines[4], "    NULL (2 bytes)");
    }
}
