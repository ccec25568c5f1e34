//! Reference collection (pass 1 of edge resolution)
//!
//! Walks a parsed unit and records every call, type mention, include and
//! function-pointer assignment as an unresolved [`Reference`] owned by the
//! innermost entity that encloses it.
//!
//! Calls through function pointers are over-approximated: every function
//! ever stored into a slot (a variable, parameter or struct field) anywhere
//! in its scope is a possible callee, whatever the order of assignments and
//! calls.
//!
//! With kernel macros enabled, module registrations and exports become
//! references of the File entity, and locking calls (`spin_lock(&lock)`)
//! also reference the file-scope lock object they take.

use crate::declarator::{self, Declarator};
use crate::kernel::{self, KernelMacros};
use codeindex_graph::{Entity, EntityId, EntityKind, SourceUnit, Span};
use codeindex_parser_api::{Reference, SyntaxTree};
use std::collections::{BTreeSet, HashMap, HashSet};
use tree_sitter::Node;

/// A place a function pointer can be stored in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Slot {
    /// Local variable or parameter of a function
    Local(EntityId, String),
    /// File-scope variable
    Global(String),
    /// Struct or union field, shared by every instance in the unit
    Field(String),
}

impl Slot {
    /// How the slot is named in `via`.
    fn label(&self) -> String {
        match self {
            Slot::Local(_, name) | Slot::Global(name) => name.clone(),
            Slot::Field(name) => format!(".{name}"),
        }
    }
}

struct FunctionScope {
    id: EntityId,
    /// Local variables and parameters, and whether each is a function pointer
    slots: HashMap<String, bool>,
}

struct IndirectCall {
    source: EntityId,
    slot: Slot,
    span: Span,
}

pub struct ReferenceCollector<'a> {
    tree: &'a SyntaxTree,
    file: EntityId,
    /// Non-file entities that may own a reference
    owners: Vec<(Span, &'a EntityId)>,
    /// Functions defined or declared in the unit
    functions: HashSet<String>,
    /// Typedefs of pointer-to-function types
    pointer_typedefs: HashSet<String>,
    /// Typedefs of function types (`typedef void handler_t(int)`)
    function_typedefs: HashSet<String>,
    /// File-scope variables, and whether each is a function pointer
    globals: HashMap<String, bool>,
    /// Fields declared as function pointers
    pointer_fields: HashSet<String>,
    scope: Option<FunctionScope>,
    references: Vec<Reference>,
    candidates: HashMap<Slot, BTreeSet<String>>,
    indirect: Vec<IndirectCall>,
    kernel: Option<KernelMacros>,
}

impl<'a> ReferenceCollector<'a> {
    pub fn new(tree: &'a SyntaxTree, unit: &'a SourceUnit, entities: &'a [Entity]) -> Self {
        let file = entities
            .iter()
            .find(|e| e.kind == EntityKind::File)
            .map(|e| e.id.clone())
            .unwrap_or_else(|| EntityId::new(&unit.id, EntityKind::File, unit.id.as_str()));
        let owners = entities
            .iter()
            .filter(|e| e.kind != EntityKind::File)
            .map(|e| (e.span, &e.id))
            .collect();
        Self {
            tree,
            file,
            owners,
            functions: HashSet::new(),
            pointer_typedefs: HashSet::new(),
            function_typedefs: HashSet::new(),
            globals: HashMap::new(),
            pointer_fields: HashSet::new(),
            scope: None,
            references: Vec::new(),
            candidates: HashMap::new(),
            indirect: Vec::new(),
            kernel: None,
        }
    }

    /// Collect module registrations, exports and lock operations too.
    pub fn with_kernel_macros(mut self, kernel: KernelMacros) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Collect the unit's references, in source order.
    pub fn collect(mut self) -> Vec<Reference> {
        let root = self.tree.root_node();
        self.prescan(root);
        self.scan_fields(root);
        self.visit(root);
        self.expand_indirect_calls();
        self.collect_registrations();

        let mut references = self.references;
        references.sort_by_key(|r| r.span.start);
        references
    }

    fn text(&self, node: Node) -> &'a str {
        self.tree.node_text(node)
    }

    fn span(node: Node) -> Span {
        Span::new(node.start_byte(), node.end_byte())
    }

    /// Innermost entity whose span encloses `span`, else the File entity.
    fn owner(&self, span: Span) -> EntityId {
        self.owners
            .iter()
            .filter(|(owner, _)| owner.contains(&span))
            .min_by_key(|(owner, _)| owner.len())
            .map_or_else(|| self.file.clone(), |(_, id)| (*id).clone())
    }

    // ---- What the unit declares at file scope ----

    fn prescan(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "function_definition" => {
                    if let Some(name) = child
                        .child_by_field_name("declarator")
                        .and_then(|d| Declarator::inspect(d).name)
                    {
                        self.functions.insert(self.text(name).to_string());
                    }
                }
                "declaration" => {
                    let type_node = child.child_by_field_name("type");
                    for decl in declarator::declarators(child) {
                        let info = Declarator::inspect(decl);
                        let Some(name) = info.name.map(|n| self.text(n).to_string()) else {
                            continue;
                        };
                        if info.is_prototype {
                            self.functions.insert(name);
                        } else {
                            let is_pointer = self.holds_function_pointer(type_node, &info);
                            self.globals.insert(name, is_pointer);
                        }
                    }
                }
                "type_definition" => {
                    for decl in declarator::declarators(child) {
                        let info = Declarator::inspect(decl);
                        let Some(name) = info.name.map(|n| self.text(n).to_string()) else {
                            continue;
                        };
                        let type_node = child.child_by_field_name("type");
                        if info.is_function_pointer || self.holds_function_pointer(type_node, &info) {
                            self.pointer_typedefs.insert(name);
                        } else if info.is_prototype {
                            self.function_typedefs.insert(name);
                        }
                    }
                }
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" | "ERROR" => self.prescan(child),
                _ => {}
            }
        }
    }

    fn scan_fields(&mut self, node: Node) {
        if node.kind() == "field_declaration" {
            let type_node = node.child_by_field_name("type");
            for decl in declarator::declarators(node) {
                let info = Declarator::inspect(decl);
                if let Some(name) = info.name {
                    if self.holds_function_pointer(type_node, &info) {
                        self.pointer_fields.insert(self.text(name).to_string());
                    }
                }
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.scan_fields(child);
        }
    }

    /// True if a declarator of `type_node` declares a function-pointer slot:
    /// by its own shape, or through an in-unit typedef.
    fn holds_function_pointer(&self, type_node: Option<Node>, info: &Declarator) -> bool {
        if info.is_function_pointer {
            return true;
        }
        let Some(type_node) = type_node.filter(|t| t.kind() == "type_identifier") else {
            return false;
        };
        let type_name = self.text(type_node);
        (self.pointer_typedefs.contains(type_name) && info.pointer_depth == 0)
            || (self.function_typedefs.contains(type_name) && info.pointer_depth >= 1)
    }

    /// The slot a bare identifier denotes in the current scope, if it is a
    /// variable at all.
    fn variable(&self, name: &str) -> Option<Slot> {
        if let Some(scope) = &self.scope {
            if scope.slots.contains_key(name) {
                return Some(Slot::Local(scope.id.clone(), name.to_string()));
            }
        }
        self.globals
            .contains_key(name)
            .then(|| Slot::Global(name.to_string()))
    }

    fn is_pointer_slot(&self, slot: &Slot) -> bool {
        match slot {
            Slot::Local(_, name) => self
                .scope
                .as_ref()
                .and_then(|scope| scope.slots.get(name))
                .copied()
                .unwrap_or(false),
            Slot::Global(name) => self.globals.get(name).copied().unwrap_or(false),
            Slot::Field(name) => self.pointer_fields.contains(name),
        }
    }

    // ---- The walk ----

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "function_definition" => self.visit_function(node),
            "declaration" => self.visit_declaration(node),
            "type_definition" => self.visit_type_definition(node),
            "preproc_include" => self.visit_include(node),
            "call_expression" => self.visit_call(node),
            "assignment_expression" => self.visit_assignment(node),
            "initializer_pair" => self.visit_initializer_pair(node),
            "struct_specifier" | "union_specifier" | "enum_specifier" => self.visit_tag(node),
            // Body of a syscall whose header was blanked
            "compound_statement" if self.scope.is_none() => self.visit_detached_body(node),
            "type_identifier" => {
                let span = Self::span(node);
                let name = self.text(node);
                let source = self.owner(span);
                self.references
                    .push(Reference::type_use(source, name, vec![EntityKind::Typedef], span));
            }
            // Macro bodies are unparsed token soup
            "preproc_def" | "preproc_function_def" => {}
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit_function(&mut self, node: Node) {
        let id = self.owner(Self::span(node));
        let mut slots = HashMap::new();

        if let Some(declarator) = node.child_by_field_name("declarator") {
            let info = Declarator::inspect(declarator);
            if let Some(list) = info.parameters {
                let mut cursor = list.walk();
                let params: Vec<Node> = list.named_children(&mut cursor).collect();
                for param in params {
                    let Some(decl) = param.child_by_field_name("declarator") else {
                        continue;
                    };
                    let param_info = Declarator::inspect(decl);
                    if let Some(name) = param_info.name {
                        let is_pointer =
                            self.holds_function_pointer(param.child_by_field_name("type"), &param_info);
                        slots.insert(self.text(name).to_string(), is_pointer);
                    }
                }
            }
        }

        let outer = self.scope.replace(FunctionScope { id, slots });
        self.visit_children(node);
        self.scope = outer;
    }

    fn visit_detached_body(&mut self, node: Node) {
        let span = Self::span(node);
        let id = self.owner(span);
        let slots: HashMap<String, bool> = self
            .kernel
            .as_ref()
            .and_then(|kernel| kernel.syscall_with_body(span))
            .map(|syscall| {
                syscall
                    .parameters
                    .iter()
                    .map(|(_, name)| (name.clone(), false))
                    .collect()
            })
            .unwrap_or_default();

        self.scope = Some(FunctionScope { id, slots });
        self.visit_children(node);
        self.scope = None;
    }

    fn visit_declaration(&mut self, node: Node) {
        let type_node = node.child_by_field_name("type");
        if let Some(type_node) = type_node {
            self.visit(type_node);
        }

        for decl in declarator::declarators(node) {
            let info = Declarator::inspect(decl);
            if info.is_prototype {
                if let Some(list) = info.parameters {
                    self.visit(list);
                }
                continue;
            }
            let Some(name) = info.name.map(|n| self.text(n).to_string()) else {
                self.visit(decl);
                continue;
            };

            let is_pointer = self.holds_function_pointer(type_node, &info);
            let slot = match self.scope.as_mut() {
                Some(scope) => {
                    scope.slots.insert(name.clone(), is_pointer);
                    Slot::Local(scope.id.clone(), name)
                }
                None => Slot::Global(name),
            };

            if let Some(target) = info.target {
                self.visit(target);
            }
            if let Some(value) = info.value {
                self.record_assignment(slot, value, Self::span(decl));
                self.visit(value);
            }
        }
    }

    fn visit_type_definition(&mut self, node: Node) {
        if let Some(type_node) = node.child_by_field_name("type") {
            self.visit(type_node);
        }
        // The declared name is a definition, not a mention
        for decl in declarator::declarators(node) {
            if let Some(list) = Declarator::inspect(decl).parameters {
                self.visit(list);
            }
        }
    }

    fn visit_tag(&mut self, node: Node) {
        match node.child_by_field_name("body") {
            Some(body) => self.visit(body),
            None => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let kind = match node.kind() {
                    "struct_specifier" => EntityKind::Struct,
                    "union_specifier" => EntityKind::Union,
                    _ => EntityKind::Enum,
                };
                let span = Self::span(node);
                let source = self.owner(span);
                self.references
                    .push(Reference::type_use(source, self.text(name), vec![kind], span));
            }
        }
    }

    fn visit_include(&mut self, node: Node) {
        let Some(path) = node.child_by_field_name("path") else {
            return;
        };
        let path = self
            .text(path)
            .trim()
            .trim_matches('"')
            .trim_start_matches('<')
            .trim_end_matches('>');
        if path.is_empty() {
            return;
        }
        self.references
            .push(Reference::include(self.file.clone(), path, Self::span(node)));
    }

    fn visit_call(&mut self, node: Node) {
        let span = Self::span(node);
        if let Some(function) = node.child_by_field_name("function") {
            let source = self.owner(span);
            let callee = self.callee(function);
            if let Callee::Direct(name) = &callee {
                self.record_lock_operation(&source, name, node);
            }
            match callee {
                Callee::Direct(name) => self.references.push(Reference::call(source, name, span)),
                Callee::Indirect(slot) => self.indirect.push(IndirectCall { source, slot, span }),
                Callee::Unknown => {}
            }
            if function.kind() != "identifier" {
                self.visit(function);
            }
        }
        if let Some(arguments) = node.child_by_field_name("arguments") {
            self.visit(arguments);
        }
    }

    /// `spin_lock(&lock)`: a lock edge to `lock` when it is a file-scope
    /// object. Locks inside structs or locals have no entity to land on.
    fn record_lock_operation(&mut self, source: &EntityId, function: &str, call: Node) {
        if self.kernel.is_none() {
            return;
        }
        let Some((kind, _)) = kernel::lock_operation(function) else {
            return;
        };
        let Some(object) = call
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
            .and_then(function_operand)
        else {
            return;
        };
        let name = self.text(object);
        if matches!(self.variable(name), Some(Slot::Local(..))) {
            return;
        }
        self.references.push(Reference::new(
            source.clone(),
            kind,
            name,
            vec![EntityKind::GlobalVariable],
            Self::span(object),
        ));
    }

    fn callee(&self, function: Node) -> Callee {
        match function.kind() {
            "identifier" => {
                let name = self.text(function);
                match self.variable(name) {
                    Some(slot) => Callee::Indirect(slot),
                    None => Callee::Direct(name.to_string()),
                }
            }
            // (*op)(x, y)
            "parenthesized_expression" | "pointer_expression" => {
                let Some(inner) = unwrap_dereference(function) else {
                    return Callee::Unknown;
                };
                match inner.kind() {
                    "identifier" => {
                        let name = self.text(inner);
                        match self.variable(name) {
                            Some(slot) => Callee::Indirect(slot),
                            None if self.functions.contains(name) => Callee::Direct(name.to_string()),
                            None => Callee::Indirect(Slot::Global(name.to_string())),
                        }
                    }
                    _ => self.callee(inner),
                }
            }
            // s.f(x), s->f(x)
            "field_expression" => match function.child_by_field_name("field") {
                Some(field) => Callee::Indirect(Slot::Field(self.text(field).to_string())),
                None => Callee::Unknown,
            },
            // handlers[i](x)
            "subscript_expression" => function
                .child_by_field_name("argument")
                .map_or(Callee::Unknown, |base| match self.callee(base) {
                    Callee::Direct(_) => Callee::Unknown,
                    other => other,
                }),
            _ => Callee::Unknown,
        }
    }

    fn visit_assignment(&mut self, node: Node) {
        let is_plain = node
            .child_by_field_name("operator")
            .is_some_and(|op| self.text(op) == "=");
        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");

        if let (true, Some(left), Some(right)) = (is_plain, left, right) {
            if let Some(slot) = self.assigned_slot(left) {
                self.record_assignment(slot, right, Self::span(node));
            }
        }
        if let Some(left) = left {
            self.visit(left);
        }
        if let Some(right) = right {
            self.visit(right);
        }
    }

    fn assigned_slot(&self, left: Node) -> Option<Slot> {
        match left.kind() {
            "identifier" => {
                let name = self.text(left);
                // Unknown names are declared elsewhere (a header): global
                Some(self.variable(name).unwrap_or_else(|| Slot::Global(name.to_string())))
            }
            "field_expression" => left
                .child_by_field_name("field")
                .map(|field| Slot::Field(self.text(field).to_string())),
            "subscript_expression" => left
                .child_by_field_name("argument")
                .and_then(|base| self.assigned_slot(base)),
            "parenthesized_expression" => left
                .named_child(0)
                .and_then(|inner| self.assigned_slot(inner)),
            "pointer_expression" => left
                .child_by_field_name("argument")
                .and_then(|inner| self.assigned_slot(inner)),
            _ => None,
        }
    }

    fn visit_initializer_pair(&mut self, node: Node) {
        let mut cursor = node.walk();
        let field = node
            .children_by_field_name("designator", &mut cursor)
            .filter_map(|designator| match designator.kind() {
                "field_designator" => designator.named_child(0),
                "field_identifier" => Some(designator),
                _ => None,
            })
            .last();
        let value = node.child_by_field_name("value");

        if let (Some(field), Some(value)) = (field, value) {
            let slot = Slot::Field(self.text(field).to_string());
            self.record_assignment(slot, value, Self::span(node));
        }
        if let Some(value) = value {
            self.visit(value);
        }
    }

    /// `slot = rhs`: when `rhs` names a function (`f` or `&f`) and either the
    /// slot is typed as a function pointer or `f` is a function of this
    /// unit, record `f` as a candidate callee of the slot.
    fn record_assignment(&mut self, slot: Slot, rhs: Node, span: Span) {
        let Some(function) = function_operand(rhs).map(|n| self.text(n)) else {
            return;
        };
        if self.variable(function).is_some() {
            return;
        }
        if !self.is_pointer_slot(&slot) && !self.functions.contains(function) {
            return;
        }

        let source = self.owner(span);
        self.references
            .push(Reference::pointer_assignment(source, function, slot.label(), span));
        self.candidates
            .entry(slot)
            .or_default()
            .insert(function.to_string());
    }

    /// `module_init(f)`, `module_exit(f)` and `EXPORT_SYMBOL*(f)` belong to
    /// the File entity.
    fn collect_registrations(&mut self) {
        let Some(kernel) = &self.kernel else {
            return;
        };
        for registration in &kernel.registrations {
            self.references.push(Reference::new(
                self.file.clone(),
                registration.kind,
                registration.target.as_str(),
                registration.target_kinds(),
                registration.span,
            ));
        }
    }

    /// One call edge per candidate of the slot; an unresolved edge naming
    /// the slot itself when nothing was ever assigned to it.
    fn expand_indirect_calls(&mut self) {
        for call in std::mem::take(&mut self.indirect) {
            let via = call.slot.label();
            match self.candidates.get(&call.slot) {
                Some(functions) if !functions.is_empty() => {
                    for function in functions {
                        self.references.push(
                            Reference::call(call.source.clone(), function.clone(), call.span)
                                .with_via(via.clone()),
                        );
                    }
                }
                _ => self
                    .references
                    .push(Reference::call(call.source, via.clone(), call.span).with_via(via)),
            }
        }
    }
}

enum Callee {
    Direct(String),
    Indirect(Slot),
    Unknown,
}

/// Strip parentheses and `*` dereferences: `(*op)` -> `op`.
fn unwrap_dereference(node: Node) -> Option<Node> {
    let mut current = node;
    loop {
        current = match current.kind() {
            "parenthesized_expression" => current.named_child(0)?,
            "pointer_expression" if current.child(0).is_some_and(|op| op.kind() == "*") => {
                current.child_by_field_name("argument")?
            }
            _ => return Some(current),
        };
    }
}

/// The function named by an assigned value: `f`, `&f`, `(f)`, `(T)f`.
fn function_operand(node: Node) -> Option<Node> {
    match node.kind() {
        "identifier" => Some(node),
        "pointer_expression" if node.child(0).is_some_and(|op| op.kind() == "&") => {
            node.child_by_field_name("argument")
                .filter(|arg| arg.kind() == "identifier")
        }
        "parenthesized_expression" => node.named_child(0).and_then(function_operand),
        "cast_expression" => node.child_by_field_name("value").and_then(function_operand),
        _ => None,
    }
}
