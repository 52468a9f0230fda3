//! DOT (Graphviz) output utilities.
//!
//! Expression trees are drawn as record-shaped nodes where each child slot is
//! a named port, so edges leave from the slot that owns the child.

/// Escape special characters for DOT format strings.
///
/// DOT format requires escaping:
/// - `\` → `\\` (backslash)
/// - `"` → `\"` (double quote)
/// - `<` → `\<` (less than, for HTML-like labels)
/// - `>` → `\>` (greater than, for HTML-like labels)
///
/// # Example
/// ```
/// use declift_core::output::escape_dot_string;
/// assert_eq!(escape_dot_string("m[\"x\"]"), "m[\\\"x\\\"]");
/// assert_eq!(escape_dot_string("a <u b"), "a \\<u b");
/// ```
pub fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

/// Escape text placed inside a record label field.
///
/// On top of [`escape_dot_string`], record labels reserve `|`, `{` and `}`
/// as field separators.
pub fn escape_record_field(s: &str) -> String {
    escape_dot_string(s)
        .replace('|', "\\|")
        .replace('{', "\\{")
        .replace('}', "\\}")
}

/// Configuration for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Font name for nodes and edges.
    pub font_name: String,
    /// Font size for node labels.
    pub node_font_size: u32,
    /// Graph direction: "TB" (top-bottom), "LR" (left-right), etc.
    pub rankdir: String,
    /// Node shape: "record", "box", etc.
    pub node_shape: String,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            font_name: "Courier".to_string(),
            node_font_size: 10,
            rankdir: "TB".to_string(),
            node_shape: "record".to_string(),
        }
    }
}

impl DotConfig {
    /// Config suited for expression trees (records, top to bottom).
    pub fn expression() -> Self {
        Self::default()
    }

    /// Generate the DOT header (digraph declaration and attributes).
    pub fn header(&self, name: &str) -> String {
        format!(
            "digraph {} {{\n    rankdir={};\n    node [shape={}, fontname=\"{}\", fontsize={}];\n",
            name, self.rankdir, self.node_shape, self.font_name, self.node_font_size
        )
    }

    /// Generate the DOT footer.
    pub fn footer(&self) -> &'static str {
        "}\n"
    }
}

/// Format an edge leaving a record port.
pub fn format_port_edge(from: &str, port: &str, to: &str) -> String {
    format!("    {}:{} -> {};\n", from, port, to)
}
