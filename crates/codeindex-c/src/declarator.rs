//! Declarator shapes
//!
//! C spreads what a declaration means over nested declarator nodes:
//! `int *(*ops[4])(int)` is an array of pointers to functions returning
//! `int *`. Entity extraction and reference collection both need the same
//! few facts out of that nesting, so they share this walk.

use tree_sitter::Node;

/// Facts read off one declarator chain
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Declarator<'t> {
    /// Declared name (`identifier`, `field_identifier` or `type_identifier`)
    pub name: Option<Node<'t>>,
    /// Pointer levels applied to the base type (outside any function declarator)
    pub pointer_depth: usize,
    /// Declares an array
    pub is_array: bool,
    /// Declares a pointer to a function: `int (*op)(int, int)`
    pub is_function_pointer: bool,
    /// Declares a function: `int add(int, int)`
    pub is_prototype: bool,
    /// Parameter list of the outermost function declarator
    pub parameters: Option<Node<'t>>,
    /// Initializer of an `init_declarator`
    pub value: Option<Node<'t>>,
    /// The declarator without its initializer
    pub target: Option<Node<'t>>,
}

impl<'t> Declarator<'t> {
    pub fn inspect(node: Node<'t>) -> Self {
        let mut info = Self::default();
        let mut in_function = false;
        let mut current = Some(node);

        while let Some(node) = current {
            // Unnamed parameters use the abstract_* variants of the same shapes
            let kind = node.kind().trim_start_matches("abstract_");
            current = match kind {
                "identifier" | "field_identifier" | "type_identifier" => {
                    info.name = Some(node);
                    None
                }
                "init_declarator" => {
                    info.value = node.child_by_field_name("value");
                    node.child_by_field_name("declarator")
                }
                "pointer_declarator" => {
                    if in_function {
                        info.is_function_pointer = true;
                    } else {
                        info.pointer_depth += 1;
                    }
                    node.child_by_field_name("declarator")
                }
                "array_declarator" => {
                    info.is_array = true;
                    node.child_by_field_name("declarator")
                }
                "function_declarator" => {
                    if !in_function {
                        info.parameters = node.child_by_field_name("parameters");
                    }
                    in_function = true;
                    node.child_by_field_name("declarator")
                }
                "parenthesized_declarator" | "attributed_declarator" => inner_declarator(node),
                _ => None,
            };
            if info.target.is_none() && kind != "init_declarator" {
                info.target = Some(node);
            }
        }

        info.is_prototype = in_function && !info.is_function_pointer;
        info
    }

    /// Return type of a declared function or function pointer: the base
    /// type plus the pointer levels written before the name.
    pub fn return_type(&self, base: &str) -> String {
        if self.pointer_depth == 0 {
            return base.to_string();
        }
        format!("{base} {}", "*".repeat(self.pointer_depth))
    }

    /// Type text of the declared name given the text of its base type.
    pub fn type_text(&self, base: &str, parameters: Option<&str>) -> String {
        let parameters = parameters.unwrap_or("()");
        if self.is_function_pointer {
            let suffix = if self.is_array { "[]" } else { "" };
            return format!("{base} (*{suffix}){parameters}");
        }
        if self.is_prototype {
            return format!("{base} {parameters}");
        }
        let mut text = base.to_string();
        if self.pointer_depth > 0 {
            text.push(' ');
            text.push_str(&"*".repeat(self.pointer_depth));
        }
        if self.is_array {
            text.push_str("[]");
        }
        text
    }
}

fn inner_declarator(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let inner = node.named_children(&mut cursor).find(|child| {
        let kind = child.kind();
        kind.ends_with("declarator") || kind.ends_with("identifier")
    });
    inner
}

/// The `declarator` children of a declaration, field or typedef.
pub(crate) fn declarators(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let found = node.children_by_field_name("declarator", &mut cursor).collect();
    found
}

/// True for `struct`/`union`/`enum` specifiers.
pub(crate) fn is_tag_specifier(node: Node) -> bool {
    matches!(
        node.kind(),
        "struct_specifier" | "union_specifier" | "enum_specifier"
    )
}

/// True for a tag specifier that defines a body.
pub(crate) fn is_aggregate_definition(node: Node) -> bool {
    is_tag_specifier(node) && node.child_by_field_name("body").is_some()
}

/// Storage-class and type qualifiers written directly on `node`
/// (`static`, `inline`, `extern`, `const`, ...), in source order.
pub(crate) fn qualifiers(node: Node, source: &str) -> Vec<String> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .filter(|child| matches!(child.kind(), "storage_class_specifier" | "type_qualifier"))
        .filter_map(|child| child.utf8_text(source.as_bytes()).ok())
        .map(str::to_string)
        .collect();
    found
}
