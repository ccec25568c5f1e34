//! AST visitor for extracting C entities
//!
//! This visitor traverses the tree-sitter AST and extracts:
//! - The File entity of the unit
//! - Function definitions
//! - Structs, unions and enums that have a body
//! - Typedefs
//! - Object-like and function-like macros
//! - File-scope variables (function-pointer globals included)
//! - Syscalls defined with `SYSCALL_DEFINEn`, as `sys_<name>` functions
//!
//! Anonymous aggregates are named after the declaration that introduces
//! them, never after their position, so ids survive edits elsewhere in the
//! file.

use crate::declarator::{self, Declarator};
use crate::kernel::{self, KernelMacros, SyscallDefinition};
use codeindex_graph::{
    Entity, EntityId, EntityKind, KernelRole, Linkage, Member, Parameter, Signature, SourceUnit,
    Span,
};
use codeindex_parser_api::{ParserConfig, SyntaxTree};
use std::collections::HashMap;
use tree_sitter::Node;

pub struct CVisitor<'a> {
    tree: &'a SyntaxTree,
    unit: &'a SourceUnit,
    config: &'a ParserConfig,
    entities: Vec<Entity>,
    /// Definitions seen so far per (kind, name), for `~N` ids
    ordinals: HashMap<(EntityKind, String), usize>,
    /// Context-less anonymous aggregates seen so far per (kind, scope)
    anonymous: HashMap<(EntityKind, String), usize>,
    file_scope: String,
    kernel: Option<KernelMacros>,
}

impl<'a> CVisitor<'a> {
    pub fn new(tree: &'a SyntaxTree, unit: &'a SourceUnit, config: &'a ParserConfig) -> Self {
        let file_name = unit.id.file_name();
        let file_scope = file_name
            .rsplit_once('.')
            .map_or(file_name, |(stem, _)| stem)
            .to_string();
        Self {
            tree,
            unit,
            config,
            entities: Vec::new(),
            ordinals: HashMap::new(),
            anonymous: HashMap::new(),
            file_scope,
            kernel: None,
        }
    }

    /// Recognize syscalls, lock objects and module parameters.
    pub fn with_kernel_macros(mut self, kernel: KernelMacros) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Extract every entity: the File entity first, then the rest in
    /// source order.
    pub fn extract(mut self) -> Vec<Entity> {
        let root = self.tree.root_node();
        self.visit_items(root);
        let syscalls = self
            .kernel
            .as_ref()
            .map(|k| k.syscalls.clone())
            .unwrap_or_default();
        for syscall in &syscalls {
            self.visit_syscall(syscall);
        }

        let mut entities = self.entities;
        entities.sort_by_key(|e| e.span.start);

        let file = Entity::file(
            self.unit.id.clone(),
            self.tree.source().len(),
            self.tree.line_count(),
        );
        std::iter::once(file).chain(entities).collect()
    }

    fn text(&self, node: Node) -> &'a str {
        self.tree.node_text(node)
    }

    /// Visit the items of a translation unit or of a conditional block.
    fn visit_items(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "function_definition" => self.visit_function(child),
                "declaration" => self.visit_declaration(child),
                "type_definition" => self.visit_typedef(child),
                "preproc_def" | "preproc_function_def" => self.visit_macro(child),
                "struct_specifier" | "union_specifier" | "enum_specifier" => {
                    let scope = self.file_scope.clone();
                    self.visit_aggregate(child, None, &scope);
                }
                // Keep going through conditional compilation and error
                // recovery: what they wrap is still top-level code
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" | "ERROR" => self.visit_items(child),
                _ => {}
            }
        }
    }

    fn visit_function(&mut self, node: Node) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        let info = Declarator::inspect(declarator);
        let Some(name_node) = info.name else {
            return;
        };
        let name = self.text(name_node).to_string();
        let qualifiers = declarator::qualifiers(node, self.tree.source());

        let mut signature = Signature::default();
        if self.config.extract_types {
            if let Some(type_node) = node.child_by_field_name("type") {
                let base = self.base_type(type_node, None);
                signature = signature.with_return_type(info.return_type(&base));
            }
            let parameters = info
                .parameters
                .map(|list| self.parameters(list))
                .unwrap_or_default();
            signature = signature.with_parameters(parameters);
            signature.qualifiers = qualifiers.clone();
        }

        let entity = self
            .entity(node, EntityKind::Function, &name)
            .with_linkage(linkage(&qualifiers))
            .with_signature(signature);
        self.push(entity, node);

        if let Some(body) = node.child_by_field_name("body") {
            self.visit_local_aggregates(body, &name);
        }
    }

    /// A `SYSCALL_DEFINEn` definition. Its header was blanked before
    /// parsing, so the tree only holds the body.
    fn visit_syscall(&mut self, syscall: &SyscallDefinition) {
        let name = syscall.function_name();
        let span = syscall.span();

        let mut signature = Signature::default();
        if self.config.extract_types {
            let parameters = syscall
                .parameters
                .iter()
                .map(|(type_text, name)| Parameter::new(name.as_str()).with_type(type_text.as_str()))
                .collect();
            signature = signature.with_return_type("long").with_parameters(parameters);
        }

        let id = self.next_id(EntityKind::Function, &name);
        let entity = Entity::new(self.unit.id.clone(), EntityKind::Function, &name, span)
            .with_id(id)
            .with_lines(self.line_at(span.start), self.line_at(span.end.saturating_sub(1)))
            .with_signature(signature)
            .with_kernel_role(KernelRole::Syscall {
                name: syscall.name.clone(),
                param_count: syscall.param_count,
                compat: syscall.compat,
            });
        self.push_undocumented(entity);

        let body = syscall.body.and_then(|body| {
            self.tree
                .root_node()
                .descendant_for_byte_range(body.start, body.end)
                .filter(|node| node.kind() == "compound_statement")
        });
        if let Some(body) = body {
            self.visit_local_aggregates(body, &name);
        }
    }

    /// 1-based line of a byte offset.
    fn line_at(&self, offset: usize) -> usize {
        let source = self.tree.source();
        source.as_bytes()[..offset.min(source.len())]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1
    }

    /// Aggregates defined inside a function body are entities too; their
    /// anonymous scope is the function.
    fn visit_local_aggregates(&mut self, node: Node, function: &str) {
        match node.kind() {
            "declaration" | "type_definition" => {
                if let Some(type_node) = node.child_by_field_name("type") {
                    if declarator::is_aggregate_definition(type_node) {
                        let context = self.first_declared_name(node);
                        self.visit_aggregate(type_node, context.as_deref(), function);
                    }
                }
                return;
            }
            "struct_specifier" | "union_specifier" | "enum_specifier" => {
                if declarator::is_aggregate_definition(node) {
                    self.visit_aggregate(node, None, function);
                }
                return;
            }
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit_local_aggregates(child, function);
        }
    }

    fn visit_declaration(&mut self, node: Node) {
        let qualifiers = declarator::qualifiers(node, self.tree.source());
        let declarators = declarator::declarators(node);

        let mut base = String::new();
        if let Some(type_node) = node.child_by_field_name("type") {
            let mut defined = None;
            if declarator::is_aggregate_definition(type_node) {
                let context = self.first_declared_name(node);
                let scope = self.file_scope.clone();
                defined = self.visit_aggregate(type_node, context.as_deref(), &scope);
            }
            base = self.base_type(type_node, defined.as_deref());
            if self.kernel.is_some() {
                if let Some(expanded) = kernel::defined_type(&base) {
                    base = expanded.to_string();
                }
            }
        }

        // `extern int x;` declares, it does not define
        if qualifiers.iter().any(|q| q == "extern") {
            return;
        }

        for (index, &decl) in declarators.iter().enumerate() {
            let info = Declarator::inspect(decl);
            if info.is_prototype {
                continue;
            }
            let Some(name_node) = info.name else {
                continue;
            };
            let name = self.text(name_node).to_string();

            let mut signature = Signature::default();
            if self.config.extract_types {
                let parameters = info.parameters.map(|p| self.text(p));
                signature = signature
                    .with_type(info.type_text(&base, parameters))
                    .with_function_pointer(info.is_function_pointer);
                if info.is_function_pointer {
                    signature = signature
                        .with_return_type(info.return_type(&base))
                        .with_parameters(info.parameters.map(|p| self.parameters(p)).unwrap_or_default());
                }
                signature.qualifiers = qualifiers.clone();
            }

            let span = declarator_span(node, &declarators, index);
            let lines_node = if index == 0 { node } else { decl };
            let mut entity = self
                .entity_with_span(span, lines_node, EntityKind::GlobalVariable, &name)
                .with_linkage(linkage(&qualifiers))
                .with_signature(signature);
            if let Some(role) = self.global_role(&name, &base, &info) {
                entity = entity.with_kernel_role(role);
            }
            if index == 0 {
                self.push(entity, node);
            } else {
                self.push_undocumented(entity);
            }
        }
    }

    /// Kernel role of a file-scope variable: a `module_param`, or a lock
    /// object held by value.
    fn global_role(&self, name: &str, base: &str, info: &Declarator) -> Option<KernelRole> {
        let kernel = self.kernel.as_ref()?;
        if let Some(parameter) = kernel.parameter(name) {
            return Some(KernelRole::ModuleParameter {
                param_type: parameter.param_type.clone(),
                permissions: parameter.permissions.clone(),
                description: parameter.description.clone(),
            });
        }
        if info.pointer_depth > 0 || info.is_array || info.is_function_pointer {
            return None;
        }
        kernel::lock_kind(base).map(KernelRole::Lock)
    }

    fn visit_typedef(&mut self, node: Node) {
        let declarators = declarator::declarators(node);
        let qualifiers = declarator::qualifiers(node, self.tree.source());

        let mut base = String::new();
        if let Some(type_node) = node.child_by_field_name("type") {
            let mut defined = None;
            if declarator::is_aggregate_definition(type_node) {
                let context = self.first_declared_name(node);
                let scope = self.file_scope.clone();
                defined = self.visit_aggregate(type_node, context.as_deref(), &scope);
            }
            base = self.base_type(type_node, defined.as_deref());
            if !qualifiers.is_empty() {
                base = format!("{} {base}", qualifiers.join(" "));
            }
        }

        for (index, &decl) in declarators.iter().enumerate() {
            let info = Declarator::inspect(decl);
            let Some(name_node) = info.name else {
                continue;
            };
            let name = self.text(name_node).to_string();

            let mut signature = Signature::default();
            if self.config.extract_types {
                let parameters = info.parameters.map(|p| self.text(p));
                signature = signature
                    .with_type(info.type_text(&base, parameters))
                    .with_function_pointer(info.is_function_pointer);
                if info.is_function_pointer || info.is_prototype {
                    signature = signature
                        .with_return_type(info.return_type(&base))
                        .with_parameters(info.parameters.map(|p| self.parameters(p)).unwrap_or_default());
                }
            }

            let span = declarator_span(node, &declarators, index);
            let lines_node = if index == 0 { node } else { decl };
            let entity = self
                .entity_with_span(span, lines_node, EntityKind::Typedef, &name)
                .with_signature(signature);
            if index == 0 {
                self.push(entity, node);
            } else {
                self.push_undocumented(entity);
            }
        }
    }

    fn visit_macro(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();

        let mut signature = Signature::default();
        if self.config.extract_types {
            if let Some(value) = node.child_by_field_name("value") {
                let value = self.text(value).trim();
                if !value.is_empty() {
                    signature = signature.with_type(value);
                }
            }
            if let Some(params) = node.child_by_field_name("parameters") {
                let mut cursor = params.walk();
                let parameters = params
                    .children(&mut cursor)
                    .filter_map(|child| match child.kind() {
                        "identifier" => Some(Parameter::new(self.text(child))),
                        "..." => Some(Parameter::variadic()),
                        _ => None,
                    })
                    .collect();
                signature = signature.with_parameters(parameters);
            }
        }

        let entity = self
            .entity(node, EntityKind::Macro, &name)
            .with_signature(signature);
        self.push(entity, node);
    }

    /// Record a struct/union/enum definition (and the aggregates nested in
    /// its fields). Returns the name the aggregate is known by, synthetic
    /// for anonymous ones.
    fn visit_aggregate(&mut self, node: Node, context: Option<&str>, scope: &str) -> Option<String> {
        let kind = match node.kind() {
            "struct_specifier" => EntityKind::Struct,
            "union_specifier" => EntityKind::Union,
            "enum_specifier" => EntityKind::Enum,
            _ => return None,
        };
        let declared = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        let body = node.child_by_field_name("body")?;

        let name = match (declared, context) {
            (Some(name), _) => name,
            (None, Some(context)) => format!("__anon_{}_{context}", kind.tag()),
            (None, None) => {
                let counter = self
                    .anonymous
                    .entry((kind, scope.to_string()))
                    .or_insert(0);
                *counter += 1;
                format!("__anon_{}_{scope}_{counter}", kind.tag())
            }
        };

        let members = if kind == EntityKind::Enum {
            self.enum_constants(body)
        } else {
            self.fields(body, &name)
        };

        let entity = self.entity(node, kind, &name).with_members(members);
        let anchor = doc_anchor(node);
        self.push(entity, anchor);
        Some(name)
    }

    fn fields(&mut self, body: Node, owner: &str) -> Vec<Member> {
        let mut members = Vec::new();
        let mut cursor = body.walk();
        let children: Vec<Node> = body.named_children(&mut cursor).collect();

        for field in children.into_iter().filter(|c| c.kind() == "field_declaration") {
            let declarators = declarator::declarators(field);
            let infos: Vec<Declarator> = declarators.iter().map(|&d| Declarator::inspect(d)).collect();

            let mut base = String::new();
            if let Some(type_node) = field.child_by_field_name("type") {
                let mut defined = None;
                if declarator::is_aggregate_definition(type_node) {
                    let first_field = infos
                        .first()
                        .and_then(|info| info.name)
                        .map(|n| format!("{owner}.{}", self.text(n)));
                    defined = self.visit_aggregate(type_node, first_field.as_deref(), owner);
                }
                base = self.base_type(type_node, defined.as_deref());
                let qualifiers = declarator::qualifiers(field, self.tree.source());
                if !qualifiers.is_empty() {
                    base = format!("{} {base}", qualifiers.join(" "));
                }
            }

            for info in infos {
                let Some(name_node) = info.name else {
                    continue;
                };
                let name = self.text(name_node);
                if self.config.extract_types {
                    let parameters = info.parameters.map(|p| self.text(p));
                    members.push(Member::field(name, info.type_text(&base, parameters)));
                } else {
                    members.push(Member {
                        name: name.to_string(),
                        ..Default::default()
                    });
                }
            }
        }
        members
    }

    fn enum_constants(&self, body: Node) -> Vec<Member> {
        let mut cursor = body.walk();
        let constants = body
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "enumerator")
            .filter_map(|enumerator| {
                let name = enumerator.child_by_field_name("name")?;
                let value = enumerator
                    .child_by_field_name("value")
                    .map(|v| self.text(v).to_string());
                Some(Member::constant(self.text(name), value))
            })
            .collect();
        constants
    }

    fn parameters(&self, list: Node) -> Vec<Parameter> {
        let mut parameters = Vec::new();
        let mut cursor = list.walk();
        for child in list.named_children(&mut cursor) {
            match child.kind() {
                "variadic_parameter" => parameters.push(Parameter::variadic()),
                "parameter_declaration" => {
                    let mut base = child
                        .child_by_field_name("type")
                        .map(|t| self.base_type(t, None))
                        .unwrap_or_default();
                    let qualifiers = declarator::qualifiers(child, self.tree.source());
                    if !qualifiers.is_empty() {
                        base = format!("{} {base}", qualifiers.join(" "));
                    }
                    let Some(decl) = child.child_by_field_name("declarator") else {
                        // `(void)` declares no parameters at all
                        if base != "void" {
                            parameters.push(Parameter::new("").with_type(base));
                        }
                        continue;
                    };
                    let info = Declarator::inspect(decl);
                    let name = info.name.map(|n| self.text(n)).unwrap_or("");
                    let nested = info.parameters.map(|p| self.text(p));
                    parameters.push(Parameter::new(name).with_type(info.type_text(&base, nested)));
                }
                _ => {}
            }
        }
        parameters
    }

    /// Text of a type specifier; aggregates defined in place are written as
    /// `struct <name>` rather than with their whole body.
    fn base_type(&self, type_node: Node, defined: Option<&str>) -> String {
        if declarator::is_tag_specifier(type_node) {
            let keyword = type_node.kind().trim_end_matches("_specifier");
            let name = defined.map(str::to_string).or_else(|| {
                type_node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
            });
            return match name {
                Some(name) => format!("{keyword} {name}"),
                None => keyword.to_string(),
            };
        }
        self.text(type_node).split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn first_declared_name(&self, node: Node) -> Option<String> {
        declarator::declarators(node)
            .into_iter()
            .find_map(|d| Declarator::inspect(d).name)
            .map(|n| self.text(n).to_string())
    }

    fn next_id(&mut self, kind: EntityKind, name: &str) -> EntityId {
        let ordinal = self.ordinals.entry((kind, name.to_string())).or_insert(0);
        *ordinal += 1;
        EntityId::with_ordinal(&self.unit.id, kind, name, *ordinal)
    }

    fn entity(&mut self, node: Node, kind: EntityKind, name: &str) -> Entity {
        let span = Span::new(node.start_byte(), node.end_byte());
        self.entity_with_span(span, node, kind, name)
    }

    fn entity_with_span(&mut self, span: Span, node: Node, kind: EntityKind, name: &str) -> Entity {
        let id = self.next_id(kind, name);
        Entity::new(self.unit.id.clone(), kind, name, span)
            .with_id(id)
            .with_lines(line_start(node), line_end(node))
    }

    fn push(&mut self, entity: Entity, anchor: Node) {
        let entity = match self.doc_comment(anchor) {
            Some(doc) => entity.with_doc(doc),
            None => entity,
        };
        self.entities.push(entity);
    }

    fn push_undocumented(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// The contiguous block of whole-line comments directly above `node`.
    fn doc_comment(&self, node: Node) -> Option<String> {
        if !self.config.include_docs {
            return None;
        }
        let source = self.tree.source();
        let mut expected_row = node.start_position().row;
        let mut block = Vec::new();
        let mut current = node.prev_sibling();

        while let Some(comment) = current {
            if comment.kind() != "comment" || comment.end_position().row + 1 != expected_row {
                break;
            }
            let line_start = source[..comment.start_byte()].rfind('\n').map_or(0, |i| i + 1);
            if !source[line_start..comment.start_byte()].trim().is_empty() {
                break;
            }
            block.push(clean_comment(self.text(comment)));
            expected_row = comment.start_position().row;
            current = comment.prev_sibling();
        }

        block.reverse();
        let doc = block.join("\n").trim().to_string();
        (!doc.is_empty()).then_some(doc)
    }
}

fn linkage(qualifiers: &[String]) -> Linkage {
    if qualifiers.iter().any(|q| q == "static") {
        Linkage::Internal
    } else {
        Linkage::External
    }
}

/// The node whose preceding comment documents an aggregate: the enclosing
/// declaration or typedef when there is one.
fn doc_anchor(node: Node) -> Node {
    match node.parent() {
        Some(parent) if matches!(parent.kind(), "declaration" | "type_definition") => parent,
        _ => node,
    }
}

/// Span of the `index`-th variable of a declaration. A single declarator
/// owns the whole declaration; with several, the first also owns the
/// shared type and the rest own just their declarator.
fn declarator_span(node: Node, declarators: &[Node], index: usize) -> Span {
    match (declarators.len(), declarators.get(index)) {
        (1, _) | (_, None) => Span::new(node.start_byte(), node.end_byte()),
        (_, Some(decl)) if index == 0 => Span::new(node.start_byte(), decl.end_byte()),
        (_, Some(decl)) => Span::new(decl.start_byte(), decl.end_byte()),
    }
}

fn line_start(node: Node) -> usize {
    node.start_position().row + 1
}

/// 1-based last line; directive nodes end after their newline.
fn line_end(node: Node) -> usize {
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    }
}

fn clean_comment(text: &str) -> String {
    let text = text.trim();
    let body = if let Some(rest) = text.strip_prefix("//") {
        rest.trim_start_matches('/').trim_start_matches('!')
    } else {
        text.trim_start_matches("/*")
            .trim_start_matches('*')
            .trim_end_matches("*/")
    };
    body.lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix('*').map_or(line, str::trim_start)
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CParser;
    use codeindex_graph::{LockKind, UnitId};
    use codeindex_parser_api::LanguageParser;
    use std::path::Path;

    fn extract_with(source: &str, config: ParserConfig) -> Vec<Entity> {
        let parser = CParser::with_config(config);
        let unit = SourceUnit::new(UnitId::new("src/test.c"), "/tmp/src/test.c", "c");
        let tree = parser.parse(source, Path::new("src/test.c")).unwrap();
        parser.extract(&tree, &unit)
    }

    fn extract(source: &str) -> Vec<Entity> {
        extract_with(source, ParserConfig::default())
    }

    fn find<'e>(entities: &'e [Entity], kind: EntityKind, name: &str) -> &'e Entity {
        entities
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .unwrap_or_else(|| panic!("no {kind:?} named {name}"))
    }

    #[test]
    fn test_file_entity_comes_first() {
        let entities = extract("int main(void) { return 0; }\n");
        assert_eq!(entities[0].kind, EntityKind::File);
        assert_eq!(entities[0].name, "src/test.c");
        assert_eq!(entities[0].id.as_str(), "src/test.c#file:src/test.c");
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_function_extraction() {
        let entities = extract("int greet(char *name) { return 0; }");
        let f = find(&entities, EntityKind::Function, "greet");
        assert_eq!(f.id.as_str(), "src/test.c#fn:greet");
        assert_eq!(f.signature.return_type.as_deref(), Some("int"));
        assert_eq!(f.signature.parameters.len(), 1);
        assert_eq!(f.signature.parameters[0].name, "name");
        assert_eq!(f.signature.parameters[0].type_annotation.as_deref(), Some("char *"));
        assert_eq!(f.linkage, Linkage::External);
        assert_eq!((f.line_start, f.line_end), (1, 1));
    }

    #[test]
    fn test_static_inline_function() {
        let entities = extract("static inline void helper(void) {}");
        let f = find(&entities, EntityKind::Function, "helper");
        assert_eq!(f.linkage, Linkage::Internal);
        assert_eq!(f.signature.qualifiers, vec!["static", "inline"]);
        assert!(f.signature.parameters.is_empty());
    }

    #[test]
    fn test_pointer_return_and_variadic() {
        let entities = extract("char *format(const char *fmt, ...) { return 0; }");
        let f = find(&entities, EntityKind::Function, "format");
        assert_eq!(f.signature.return_type.as_deref(), Some("char *"));
        assert!(f.signature.is_variadic);
        assert_eq!(f.signature.parameters[0].type_annotation.as_deref(), Some("const char *"));
    }

    #[test]
    fn test_return_types_carry_pointer_levels_only() {
        let source = "int add(int a, int b) { return a + b; }\nchar **names(void) { return 0; }\nchar *(*lookup)(int);\n";
        let entities = extract(source);
        let add = find(&entities, EntityKind::Function, "add");
        assert_eq!(add.signature.return_type.as_deref(), Some("int"));
        let names = find(&entities, EntityKind::Function, "names");
        assert_eq!(names.signature.return_type.as_deref(), Some("char **"));
        let lookup = find(&entities, EntityKind::GlobalVariable, "lookup");
        assert_eq!(lookup.signature.return_type.as_deref(), Some("char *"));
    }

    #[test]
    fn test_struct_union_enum() {
        let source = "struct Person { char *name; int age; };\nunion Data { int i; float f; };\nenum Status { OK = 0, ERR };\n";
        let entities = extract(source);

        let person = find(&entities, EntityKind::Struct, "Person");
        assert_eq!(person.members.len(), 2);
        assert_eq!(person.members[0], Member::field("name", "char *"));

        find(&entities, EntityKind::Union, "Data");

        let status = find(&entities, EntityKind::Enum, "Status");
        assert_eq!(status.members[0], Member::constant("OK", Some("0".to_string())));
        assert_eq!(status.members[1], Member::constant("ERR", None));
    }

    #[test]
    fn test_forward_declaration_ignored() {
        let entities = extract("struct Forward;\nstruct Forward *make(void);\n");
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn test_anonymous_typedef_named_from_typedef() {
        let entities = extract("typedef struct { int x; int y; } Point;\n");
        let anon = find(&entities, EntityKind::Struct, "__anon_struct_Point");
        assert_eq!(anon.id.as_str(), "src/test.c#struct:__anon_struct_Point");
        let point = find(&entities, EntityKind::Typedef, "Point");
        assert_eq!(point.signature.type_annotation.as_deref(), Some("struct __anon_struct_Point"));
    }

    #[test]
    fn test_anonymous_variable_and_field_contexts() {
        let source = "struct { int a; } p;\nstruct Outer { union { int i; float f; } u; };\n";
        let entities = extract(source);
        find(&entities, EntityKind::Struct, "__anon_struct_p");
        find(&entities, EntityKind::GlobalVariable, "p");
        let inner = find(&entities, EntityKind::Union, "__anon_union_Outer.u");
        assert_eq!(inner.members.len(), 2);
        let outer = find(&entities, EntityKind::Struct, "Outer");
        assert_eq!(outer.members[0], Member::field("u", "union __anon_union_Outer.u"));
    }

    #[test]
    fn test_context_less_anonymous_enum_uses_ordinal() {
        let source = "enum { A, B };\nenum { C };\n";
        let entities = extract(source);
        find(&entities, EntityKind::Enum, "__anon_enum_test_1");
        find(&entities, EntityKind::Enum, "__anon_enum_test_2");
    }

    #[test]
    fn test_anonymous_names_ignore_position() {
        let a = extract("typedef struct { int x; } Point;\n");
        let b = extract("\n\n// moved\n\ntypedef struct {\n    int x;\n} Point;\n");
        let ids = |entities: &[Entity]| entities.iter().map(|e| e.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_duplicate_definitions_get_ordinals() {
        let source = "#ifdef A\nstatic int pick(void) { return 1; }\n#else\nstatic int pick(void) { return 2; }\n#endif\n";
        let entities = extract(source);
        let ids: Vec<&str> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Function)
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["src/test.c#fn:pick", "src/test.c#fn:pick~2"]);
    }

    #[test]
    fn test_macros() {
        let source = "#define MAX_SIZE 100\n#define SQUARE(x) ((x) * (x))\n#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)\n";
        let entities = extract(source);

        let max = find(&entities, EntityKind::Macro, "MAX_SIZE");
        assert_eq!(max.signature.type_annotation.as_deref(), Some("100"));
        assert_eq!((max.line_start, max.line_end), (1, 1));

        let square = find(&entities, EntityKind::Macro, "SQUARE");
        assert_eq!(square.signature.parameters, vec![Parameter::new("x")]);

        let log = find(&entities, EntityKind::Macro, "LOG");
        assert!(log.signature.is_variadic);
    }

    #[test]
    fn test_globals_and_prototypes() {
        let source = "int counter = 0, *cursor;\nstatic int (*handler)(int);\nint add(int a, int b);\nextern int shared;\n";
        let entities = extract(source);

        let counter = find(&entities, EntityKind::GlobalVariable, "counter");
        assert_eq!(counter.signature.type_annotation.as_deref(), Some("int"));
        let cursor = find(&entities, EntityKind::GlobalVariable, "cursor");
        assert_eq!(cursor.signature.type_annotation.as_deref(), Some("int *"));
        assert!(counter.span.start < cursor.span.start);

        let handler = find(&entities, EntityKind::GlobalVariable, "handler");
        assert!(handler.signature.is_function_pointer);
        assert_eq!(handler.linkage, Linkage::Internal);
        assert_eq!(handler.signature.type_annotation.as_deref(), Some("int (*)(int)"));

        assert!(!entities.iter().any(|e| e.name == "add"));
        assert!(!entities.iter().any(|e| e.name == "shared"));
    }

    #[test]
    fn test_function_pointer_typedef() {
        let entities = extract("typedef int (*operation_t)(int, int);\n");
        let t = find(&entities, EntityKind::Typedef, "operation_t");
        assert!(t.signature.is_function_pointer);
        assert_eq!(t.signature.type_annotation.as_deref(), Some("int (*)(int, int)"));
        assert_eq!(t.signature.parameters.len(), 2);
    }

    #[test]
    fn test_local_aggregate_scoped_to_function() {
        let source = "void run(void) {\n    struct { int a; } state;\n    enum { X };\n}\n";
        let entities = extract(source);
        find(&entities, EntityKind::Struct, "__anon_struct_state");
        find(&entities, EntityKind::Enum, "__anon_enum_run_1");
        assert!(!entities.iter().any(|e| e.kind == EntityKind::GlobalVariable));
    }

    #[test]
    fn test_doc_comments() {
        let source = "int x;\n\n/**\n * Adds two numbers.\n * Returns the sum.\n */\nint add(int a, int b) { return a + b; }\n\nint y; // trailing\nint sub(int a, int b) { return a - b; }\n";
        let entities = extract(source);
        let add = find(&entities, EntityKind::Function, "add");
        assert_eq!(add.doc_comment.as_deref(), Some("Adds two numbers.\nReturns the sum."));
        let sub = find(&entities, EntityKind::Function, "sub");
        assert_eq!(sub.doc_comment, None);
    }

    #[test]
    fn test_fast_config_skips_docs_and_types() {
        let source = "// Adds.\nint add(int a, int b) { return a + b; }\nstruct S { int v; };\n";
        let entities = extract_with(source, ParserConfig::fast());
        let add = find(&entities, EntityKind::Function, "add");
        assert!(add.doc_comment.is_none());
        assert!(add.signature.is_empty());
        let s = find(&entities, EntityKind::Struct, "S");
        assert_eq!(s.members[0].name, "v");
        assert!(s.members[0].type_annotation.is_none());
    }

    #[test]
    fn test_kernel_annotations_do_not_hide_functions() {
        let source = "static __init int my_init(void) { return 0; }\nlong do_read(char __user *buf) { return 0; }\n";
        let entities = extract(source);
        let init = find(&entities, EntityKind::Function, "my_init");
        assert_eq!(init.linkage, Linkage::Internal);
        // Spans point into the original text
        assert!(source[init.span.start..init.span.end].contains("__init"));
        find(&entities, EntityKind::Function, "do_read");
    }

    #[test]
    fn test_syscall_definitions_become_functions() {
        let source = "/* read(2) */\n\
                      SYSCALL_DEFINE3(read, unsigned int, fd, char __user *, buf, size_t, count)\n\
                      {\n\tstruct { int n; } local;\n\treturn ksys_read(fd, buf, count);\n}\n\n\
                      COMPAT_SYSCALL_DEFINE0(pause)\n{\n\treturn 0;\n}\n";
        let entities = extract(source);

        let read = find(&entities, EntityKind::Function, "sys_read");
        assert_eq!(read.id.as_str(), "src/test.c#fn:sys_read");
        assert_eq!((read.line_start, read.line_end), (2, 6));
        assert!(source[read.span.start..read.span.end].starts_with("SYSCALL_DEFINE3("));
        assert!(source[read.span.start..read.span.end].ends_with('}'));
        assert_eq!(read.linkage, Linkage::External);
        assert_eq!(read.signature.return_type.as_deref(), Some("long"));
        let params: Vec<(&str, Option<&str>)> = read
            .signature
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.type_annotation.as_deref()))
            .collect();
        assert_eq!(
            params,
            vec![("fd", Some("unsigned int")), ("buf", Some("char *")), ("count", Some("size_t"))]
        );
        assert_eq!(
            read.kernel_role,
            Some(KernelRole::Syscall {
                name: "read".to_string(),
                param_count: 3,
                compat: false,
            })
        );
        // Aggregates in the body are scoped to the syscall
        find(&entities, EntityKind::Struct, "__anon_struct_local");

        let pause = find(&entities, EntityKind::Function, "compat_sys_pause");
        assert!(matches!(
            pause.kernel_role,
            Some(KernelRole::Syscall { compat: true, param_count: 0, .. })
        ));
        // Nothing else is taken for a function
        let functions = entities.iter().filter(|e| e.kind == EntityKind::Function).count();
        assert_eq!(functions, 2);
    }

    #[test]
    fn test_lock_objects_and_module_parameters() {
        let source = "static DEFINE_SPINLOCK(example_lock);\nstatic DEFINE_MUTEX(big_lock);\n\
                      static struct semaphore sem;\nstatic spinlock_t *lock_ptr;\n\
                      static int debug_level = 0;\nmodule_param(debug_level, int, 0644);\n\
                      MODULE_PARM_DESC(debug_level, \"Debug level (0-3)\");\n";
        let entities = extract(source);

        let lock = find(&entities, EntityKind::GlobalVariable, "example_lock");
        assert_eq!(lock.kernel_role, Some(KernelRole::Lock(LockKind::Spinlock)));
        assert_eq!(lock.linkage, Linkage::Internal);
        assert_eq!(lock.signature.type_annotation.as_deref(), Some("spinlock_t"));
        let big = find(&entities, EntityKind::GlobalVariable, "big_lock");
        assert_eq!(big.kernel_role, Some(KernelRole::Lock(LockKind::Mutex)));
        assert_eq!(big.signature.type_annotation.as_deref(), Some("struct mutex"));
        let sem = find(&entities, EntityKind::GlobalVariable, "sem");
        assert_eq!(sem.kernel_role, Some(KernelRole::Lock(LockKind::Semaphore)));
        assert_eq!(find(&entities, EntityKind::GlobalVariable, "lock_ptr").kernel_role, None);

        let debug = find(&entities, EntityKind::GlobalVariable, "debug_level");
        assert_eq!(
            debug.kernel_role,
            Some(KernelRole::ModuleParameter {
                param_type: "int".to_string(),
                permissions: "0644".to_string(),
                description: Some("Debug level (0-3)".to_string()),
            })
        );
        assert!(!entities.iter().any(|e| e.name == "module_param"));
    }

    #[test]
    fn test_kernel_macros_disabled() {
        let source = "static struct mutex m;\nSYSCALL_DEFINE0(sync)\n{\n\treturn 0;\n}\n";
        let entities = extract_with(source, ParserConfig::default().with_kernel_macros(false));
        assert_eq!(find(&entities, EntityKind::GlobalVariable, "m").kernel_role, None);
        assert!(!entities.iter().any(|e| e.name == "sys_sync"));
    }

    #[test]
    fn test_error_recovery_keeps_valid_definitions() {
        let source = "int ok(void) { return 1; }\nint broken( { \nint later(void) { return 2; }\n";
        let entities = extract(source);
        find(&entities, EntityKind::Function, "ok");
    }
}
