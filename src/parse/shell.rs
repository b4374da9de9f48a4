use tree_sitter::{Node, Parser};

/// Node kinds that represent a single executed command.
const COMMAND_KINDS: &[&str] = &[
    "command",
    "declaration_command",
    "unset_command",
    "test_command",
];

/// Split a shell string into the commands it would execute.
///
/// Walks the tree-sitter-bash AST and collects the text of every command
/// node, in source order. Commands nested inside `$()`, backticks, process
/// substitutions, subshells, loops and conditionals are collected as well,
/// after the command that encloses them.
///
/// If the source cannot be parsed, or contains no command nodes, the whole
/// trimmed string is returned as a single segment.
pub fn command_segments(source: &str) -> Vec<String> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_bash::LANGUAGE.into())
        .is_err()
    {
        log::warn!("tree-sitter-bash grammar failed to load; treating command as one segment");
        return vec![trimmed.to_string()];
    }
    let Some(tree) = parser.parse(trimmed, None) else {
        return vec![trimmed.to_string()];
    };

    let mut segments = Vec::new();
    collect_commands(tree.root_node(), trimmed.as_bytes(), &mut segments);
    if segments.is_empty() {
        segments.push(trimmed.to_string());
    }
    segments
}

fn collect_commands(node: Node<'_>, source: &[u8], out: &mut Vec<String>) {
    if COMMAND_KINDS.contains(&node.kind())
        && let Ok(text) = node.utf8_text(source)
    {
        let text = text.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_commands(child, source, out);
    }
}

/// Redirect destinations in a shell string (`> out`, `>> log`, `< in`),
/// as written. Descriptor duplications such as `2>&1` are included; the
/// caller decides what looks like a path.
///
/// Redirects are siblings of the command they apply to in the AST, so
/// `command_segments` never sees them.
pub fn redirect_targets(source: &str) -> Vec<String> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut parser = Parser::new();
    if parser
        .set_language(&tree_sitter_bash::LANGUAGE.into())
        .is_err()
    {
        return Vec::new();
    }
    let Some(tree) = parser.parse(trimmed, None) else {
        return Vec::new();
    };

    let mut targets = Vec::new();
    collect_redirects(tree.root_node(), trimmed.as_bytes(), &mut targets);
    targets
}

fn collect_redirects(node: Node<'_>, source: &[u8], out: &mut Vec<String>) {
    let mut cursor = node.walk();
    if node.kind() == "file_redirect" {
        for child in node.named_children(&mut cursor) {
            if child.kind() == "file_descriptor" {
                continue;
            }
            if let Ok(text) = child.utf8_text(source) {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(text.to_string());
                }
            }
        }
        return;
    }

    for child in node.children(&mut cursor) {
        collect_redirects(child, source, out);
    }
}
