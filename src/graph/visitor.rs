//! Method call visitor
//!
//! Walks every method body in a file and emits the outbound call-edge
//! candidates: direct calls, constructor invocations, property accessor
//! reads and writes, extension-style calls, static calls, and delegate
//! invocations through statically-known method groups. Edges are emitted in
//! source order and deduplicated per body; unresolvable call sites increment
//! a counter instead of producing edges.

use tree_sitter::Node;

use crate::compilation::SemanticModel;
use crate::graph::model::MethodInfo;
use crate::symbols::id::MethodId;
use crate::symbols::resolver::{LocalScope, ResolvedCall, SymbolResolver};
use crate::syntax::{self, node_text, CallableKind};

/// One visited method and its outbound calls
pub struct VisitedMethod {
    pub info: MethodInfo,
    pub calls: Vec<ResolvedCall>,
}

/// The visit result for one file
#[derive(Default)]
pub struct FileVisit {
    pub methods: Vec<VisitedMethod>,
    /// Call sites that could not be bound to a declared method
    pub unresolved: usize,
}

/// Visit every method body in the model's file
pub fn visit_file(model: &SemanticModel<'_>, inclusive_dispatch: bool) -> FileVisit {
    let resolver = SymbolResolver::new(model).with_inclusive_dispatch(inclusive_dispatch);
    let mut visit = FileVisit::default();
    let root = model.file.tree.root_node();
    walk_types(
        root,
        model,
        &resolver,
        &mut String::new(),
        &mut visit,
    );
    visit
}

fn walk_types(
    node: Node<'_>,
    model: &SemanticModel<'_>,
    resolver: &SymbolResolver<'_>,
    namespace: &mut String,
    visit: &mut FileVisit,
) {
    let source = &model.file.source;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "namespace_declaration" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                let mut inner = join_ns(namespace, &name);
                if let Some(body) = child.child_by_field_name("body") {
                    walk_types(body, model, resolver, &mut inner, visit);
                }
            }
            "file_scoped_namespace_declaration" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                *namespace = join_ns(namespace, &name);
            }
            "class_declaration" | "struct_declaration" | "record_declaration"
            | "interface_declaration" => {
                visit_type(child, model, resolver, namespace, visit);
            }
            _ if child.named_child_count() > 0 => {
                walk_types(child, model, resolver, namespace, visit);
            }
            _ => {}
        }
    }
}

fn visit_type(
    node: Node<'_>,
    model: &SemanticModel<'_>,
    resolver: &SymbolResolver<'_>,
    namespace: &str,
    visit: &mut FileVisit,
) {
    let source = &model.file.source;
    let simple = match node.child_by_field_name("name") {
        Some(n) => node_text(n, source).to_string(),
        None => return,
    };
    let arity = node
        .child_by_field_name("type_parameters")
        .map(|list| list.named_children(&mut list.walk()).filter(|c| c.kind() == "type_parameter").count())
        .unwrap_or(0);
    let type_name = syntax::with_arity(&simple, arity);
    let type_fqn = if namespace.is_empty() {
        type_name.clone()
    } else {
        format!("{}.{}", namespace, type_name)
    };

    let body = match node.child_by_field_name("body") {
        Some(b) => b,
        None => return,
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_declaration" => {
                visit_callable(member, CallableKind::Method, &type_fqn, model, resolver, visit);
            }
            "constructor_declaration" => {
                visit_callable(
                    member,
                    CallableKind::Constructor,
                    &type_fqn,
                    model,
                    resolver,
                    visit,
                );
            }
            "operator_declaration" => {
                visit_callable(
                    member,
                    CallableKind::Operator,
                    &type_fqn,
                    model,
                    resolver,
                    visit,
                );
            }
            "property_declaration" => {
                visit_property_bodies(member, &type_fqn, model, resolver, visit);
            }
            "class_declaration" | "struct_declaration" | "record_declaration"
            | "interface_declaration" => {
                let outer = type_fqn.clone();
                visit_type(member, model, resolver, &outer, visit);
            }
            _ => {}
        }
    }
}

fn visit_callable(
    node: Node<'_>,
    kind: CallableKind,
    type_fqn: &str,
    model: &SemanticModel<'_>,
    resolver: &SymbolResolver<'_>,
    visit: &mut FileVisit,
) {
    let source = &model.file.source;
    let decl = match syntax::extract_callable(node, source, kind) {
        Some(d) => d,
        None => return,
    };

    let id = MethodId::new(
        type_fqn,
        syntax::with_arity(decl.name.split('`').next().unwrap_or(&decl.name), decl.generic_arity),
        decl.params.iter().map(|p| p.ty.clone()).collect(),
    );
    let info = MethodInfo::declared(id.clone(), model.file.path.clone(), decl.start_line);

    let mut scope = LocalScope::new();
    for param in &decl.params {
        scope.bind(&param.name, &param.ty);
    }

    let mut calls = Vec::new();
    let body = node
        .child_by_field_name("body")
        .or_else(|| find_child_of_kind(node, "arrow_expression_clause"));
    if let Some(body) = body {
        let mut ctx = BodyContext {
            model,
            resolver,
            type_fqn,
            calls: &mut calls,
            unresolved: &mut visit.unresolved,
        };
        visit_body(body, &mut scope, &mut ctx);
    }

    dedupe_in_place(&mut calls);
    visit.methods.push(VisitedMethod { info, calls });
}

/// Property accessor bodies get their own caller ids (`get_X` / `set_X`)
fn visit_property_bodies(
    node: Node<'_>,
    type_fqn: &str,
    model: &SemanticModel<'_>,
    resolver: &SymbolResolver<'_>,
    visit: &mut FileVisit,
) {
    let source = &model.file.source;
    let name = match node.child_by_field_name("name") {
        Some(n) => node_text(n, source).to_string(),
        None => return,
    };
    let ty = node
        .child_by_field_name("type")
        .map(|n| syntax::normalize_type_text(node_text(n, source)))
        .unwrap_or_default();

    let mut emit = |accessor_id: MethodId, body: Node<'_>, line: usize| {
        let info = MethodInfo::declared(accessor_id, model.file.path.clone(), line);
        let mut scope = LocalScope::new();
        scope.bind("value", &ty);
        let mut calls = Vec::new();
        let mut ctx = BodyContext {
            model,
            resolver,
            type_fqn,
            calls: &mut calls,
            unresolved: &mut visit.unresolved,
        };
        visit_body(body, &mut scope, &mut ctx);
        dedupe_in_place(&mut calls);
        visit.methods.push(VisitedMethod { info, calls });
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "accessor_list" => {
                let mut ac = child.walk();
                for accessor in child.named_children(&mut ac) {
                    let text = node_text(accessor, source);
                    let has_body = accessor.child_by_field_name("body").is_some()
                        || find_child_of_kind(accessor, "arrow_expression_clause").is_some();
                    if !has_body {
                        continue;
                    }
                    let body = accessor
                        .child_by_field_name("body")
                        .or_else(|| find_child_of_kind(accessor, "arrow_expression_clause"))
                        .unwrap();
                    if text.starts_with("get") {
                        emit(
                            MethodId::getter(type_fqn, &name),
                            body,
                            syntax::start_line(accessor),
                        );
                    } else if text.starts_with("set") || text.starts_with("init") {
                        emit(
                            MethodId::setter(type_fqn, &name, &ty),
                            body,
                            syntax::start_line(accessor),
                        );
                    }
                }
            }
            "arrow_expression_clause" => {
                emit(
                    MethodId::getter(type_fqn, &name),
                    child,
                    syntax::start_line(node),
                );
            }
            _ => {}
        }
    }
}

struct BodyContext<'a, 'b> {
    model: &'a SemanticModel<'a>,
    resolver: &'a SymbolResolver<'a>,
    type_fqn: &'a str,
    calls: &'b mut Vec<ResolvedCall>,
    unresolved: &'b mut usize,
}

fn visit_body(node: Node<'_>, scope: &mut LocalScope, ctx: &mut BodyContext<'_, '_>) {
    let source = &ctx.model.file.source;
    match node.kind() {
        "invocation_expression" => {
            handle_invocation(node, scope, ctx);
            // Arguments may contain nested calls
            if let Some(args) = node.child_by_field_name("arguments") {
                visit_children(args, scope, ctx);
            }
        }
        "object_creation_expression" => {
            let type_name = node
                .child_by_field_name("type")
                .map(|n| syntax::normalize_type_text(node_text(n, source)))
                .unwrap_or_default();
            let arg_count = node
                .child_by_field_name("arguments")
                .map(count_arguments)
                .unwrap_or(0);
            if !type_name.is_empty() {
                match ctx
                    .resolver
                    .resolve_object_creation(&type_name, arg_count, ctx.type_fqn)
                {
                    Some(call) => ctx.calls.push(call),
                    None => *ctx.unresolved += 1,
                }
            }
            visit_children(node, scope, ctx);
        }
        "assignment_expression" => {
            handle_assignment(node, scope, ctx);
        }
        "member_access_expression" => {
            // Plain read context; invocation and assignment targets were
            // consumed by their parents before descending here.
            handle_property_read(node, scope, ctx);
        }
        "local_declaration_statement" | "variable_declaration" => {
            handle_local_declaration(node, scope, ctx);
        }
        "local_function_statement" => {
            // Edges inside a local function belong to the enclosing method
            let mut inner = scope.child();
            if let Some(body) = node.child_by_field_name("body") {
                visit_body(body, &mut inner, ctx);
            }
        }
        // New blocks fork the scope so bindings do not leak upward
        "block" | "for_statement" | "foreach_statement" | "while_statement" | "do_statement"
        | "if_statement" | "switch_statement" | "switch_expression" | "try_statement"
        | "using_statement" | "lock_statement" => {
            let mut inner = scope.child();
            visit_children_scoped(node, &mut inner, ctx);
        }
        _ => {
            visit_children(node, scope, ctx);
        }
    }
}

fn visit_children(node: Node<'_>, scope: &mut LocalScope, ctx: &mut BodyContext<'_, '_>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_body(child, scope, ctx);
    }
}

fn visit_children_scoped(node: Node<'_>, scope: &mut LocalScope, ctx: &mut BodyContext<'_, '_>) {
    // foreach binds its loop variable before the body
    let source = &ctx.model.file.source;
    if node.kind() == "foreach_statement" {
        let ty = node
            .child_by_field_name("type")
            .map(|n| syntax::normalize_type_text(node_text(n, source)))
            .unwrap_or_default();
        if let Some(left) = node.child_by_field_name("left") {
            let name = node_text(left, source);
            scope.bind(name, element_type(&ty));
        }
    }
    visit_children(node, scope, ctx);
}

fn handle_invocation(node: Node<'_>, scope: &mut LocalScope, ctx: &mut BodyContext<'_, '_>) {
    let source = &ctx.model.file.source;
    let function = match node.child_by_field_name("function") {
        Some(f) => f,
        None => return,
    };
    let arg_count = node
        .child_by_field_name("arguments")
        .map(count_arguments)
        .unwrap_or(0);

    let (receiver, name) = match function.kind() {
        "identifier" | "generic_name" => (None, node_text(function, source).to_string()),
        "member_access_expression" => {
            let receiver = function
                .child_by_field_name("expression")
                .map(|n| node_text(n, source).to_string());
            let name = function
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            // The receiver itself may contain calls: user.Build().Run()
            if let Some(expr) = function.child_by_field_name("expression") {
                visit_body(expr, scope, ctx);
            }
            (receiver, name)
        }
        _ => {
            visit_body(function, scope, ctx);
            return;
        }
    };

    if name.is_empty() || name == "nameof" || name == "typeof" {
        return;
    }
    let name = syntax::normalize_type_text(&name);

    match ctx.resolver.resolve_invocation(
        receiver.as_deref(),
        &name,
        arg_count,
        scope,
        ctx.type_fqn,
    ) {
        Some(call) => {
            for implementation in &call.implementations {
                ctx.calls.push(ResolvedCall {
                    id: implementation.clone(),
                    kind: call.kind,
                    implementations: Vec::new(),
                    type_args: call.type_args.clone(),
                });
            }
            ctx.calls.push(call);
        }
        None => *ctx.unresolved += 1,
    }
}

fn handle_assignment(node: Node<'_>, scope: &mut LocalScope, ctx: &mut BodyContext<'_, '_>) {
    let source = &ctx.model.file.source;
    let left = node.child_by_field_name("left");
    let right = node.child_by_field_name("right");

    let compound = {
        let mut cursor = node.walk();
        let result = node.children(&mut cursor).any(|c| {
            matches!(
                node_text(c, source),
                "+=" | "-=" | "*=" | "/=" | "%=" | "??=" | "|=" | "&=" | "^="
            )
        });
        result
    };

    if let Some(left) = left {
        if left.kind() == "member_access_expression" {
            let receiver = left
                .child_by_field_name("expression")
                .map(|n| node_text(n, source).to_string());
            let member = left
                .child_by_field_name("name")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default();
            if !member.is_empty() {
                if let Some(call) = ctx.resolver.resolve_property_access(
                    receiver.as_deref(),
                    &member,
                    true,
                    scope,
                    ctx.type_fqn,
                ) {
                    ctx.calls.push(call);
                }
                // Compound assignment reads before writing
                if compound {
                    if let Some(call) = ctx.resolver.resolve_property_access(
                        receiver.as_deref(),
                        &member,
                        false,
                        scope,
                        ctx.type_fqn,
                    ) {
                        ctx.calls.push(call);
                    }
                }
            }
        }
    }
    if let Some(right) = right {
        visit_body(right, scope, ctx);
    }
}

fn handle_property_read(node: Node<'_>, scope: &mut LocalScope, ctx: &mut BodyContext<'_, '_>) {
    let source = &ctx.model.file.source;
    let receiver = node
        .child_by_field_name("expression")
        .map(|n| node_text(n, source).to_string());
    let member = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();

    if !member.is_empty() {
        if let Some(call) = ctx.resolver.resolve_property_access(
            receiver.as_deref(),
            &member,
            false,
            scope,
            ctx.type_fqn,
        ) {
            ctx.calls.push(call);
        }
    }
    // Chained receivers may themselves contain calls
    if let Some(expr) = node.child_by_field_name("expression") {
        if expr.kind() != "identifier" {
            visit_body(expr, scope, ctx);
        }
    }
}

fn handle_local_declaration(node: Node<'_>, scope: &mut LocalScope, ctx: &mut BodyContext<'_, '_>) {
    let source = &ctx.model.file.source;
    let declaration = if node.kind() == "variable_declaration" {
        node
    } else {
        match find_child_of_kind(node, "variable_declaration") {
            Some(d) => d,
            None => {
                visit_children(node, scope, ctx);
                return;
            }
        }
    };

    let declared_ty = declaration
        .child_by_field_name("type")
        .map(|n| syntax::normalize_type_text(node_text(n, source)))
        .unwrap_or_default();

    let mut cursor = declaration.walk();
    for declarator in declaration.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let name = declarator
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .or_else(|| {
                declarator
                    .named_child(0)
                    .map(|n| node_text(n, source).to_string())
            })
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }

        let initializer = find_child_of_kind(declarator, "equals_value_clause")
            .and_then(|eq| eq.named_child(eq.named_child_count().saturating_sub(1)));

        // `var` infers from a constructor initializer; method groups feed
        // delegate tracking.
        let mut bound_ty = declared_ty.clone();
        if let Some(init) = initializer {
            match init.kind() {
                "object_creation_expression" => {
                    if declared_ty == "var" || declared_ty.is_empty() {
                        if let Some(ty) = init.child_by_field_name("type") {
                            bound_ty = syntax::normalize_type_text(node_text(ty, source));
                        }
                    }
                }
                "identifier" | "member_access_expression" => {
                    scope.bind_delegate(&name, node_text(init, source));
                }
                _ => {}
            }
            visit_body(init, scope, ctx);
        }
        if !bound_ty.is_empty() && bound_ty != "var" {
            scope.bind(&name, &bound_ty);
        }
    }
}

fn count_arguments(args: Node<'_>) -> usize {
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|c| c.kind() == "argument")
        .count()
}

fn find_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).find(|c| c.kind() == kind);
    result
}

/// `List<T>` element type for foreach bindings; best-effort
fn element_type(collection_ty: &str) -> &str {
    if let Some(open) = collection_ty.find('<') {
        if collection_ty.ends_with('>') {
            return &collection_ty[open + 1..collection_ty.len() - 1];
        }
    }
    collection_ty.strip_suffix("[]").unwrap_or(collection_ty)
}

fn dedupe_in_place(calls: &mut Vec<ResolvedCall>) {
    let mut seen = ahash::AHashSet::new();
    calls.retain(|c| seen.insert((c.id.clone(), c.kind)));
}

fn join_ns(outer: &str, inner: &str) -> String {
    if outer.is_empty() {
        inner.to_string()
    } else if inner.is_empty() {
        outer.to_string()
    } else {
        format!("{}.{}", outer, inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::Compilation;
    use crate::graph::model::CallEdgeKind;
    use crate::project::{finalize_project, parse_project_file};
    use std::fs;
    use std::path::Path;

    fn build(files: &[(&str, &str)]) -> (tempfile::TempDir, Compilation) {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("P.csproj"), "<Project></Project>").unwrap();
        for (name, content) in files {
            fs::write(temp.path().join(name), content).unwrap();
        }
        let parsed = parse_project_file("P", &temp.path().join("P.csproj")).unwrap();
        let info = finalize_project(&parsed, vec![], &[]);
        let c = Compilation::build(&info).unwrap();
        (temp, c)
    }

    fn visit<'a>(c: &'a Compilation, file: &str) -> FileVisit {
        let idx = c
            .decls
            .iter()
            .position(|d| d.path.file_name().unwrap() == Path::new(file))
            .unwrap();
        let model = SemanticModel {
            file: &c.files[idx],
            decls: &c.decls[idx],
            compilation: c,
            dependencies: vec![],
        };
        visit_file(&model, false)
    }

    fn calls_of<'v>(visit: &'v FileVisit, method: &str) -> &'v [ResolvedCall] {
        &visit
            .methods
            .iter()
            .find(|m| m.info.id.qualified_name().contains(method))
            .unwrap()
            .calls
    }

    #[test]
    fn test_direct_and_ctor_edges_in_source_order() {
        let (_t, c) = build(&[(
            "Svc.cs",
            r#"
namespace App
{
    public class User
    {
        public User(string name) { }
    }

    public class Svc
    {
        public User Create(string name)
        {
            Check(name);
            return new User(name);
        }

        private void Check(string name) { }
    }
}
"#,
        )]);
        let v = visit(&c, "Svc.cs");
        let calls = calls_of(&v, "Svc.Create");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.qualified_name(), "App.Svc.Check(string)");
        assert_eq!(calls[1].id.qualified_name(), "App.User..ctor(string)");
        assert_eq!(calls[1].kind, CallEdgeKind::Constructor);
    }

    #[test]
    fn test_property_write_emits_setter_only() {
        let (_t, c) = build(&[(
            "Prop.cs",
            r#"
namespace App
{
    public class User
    {
        public string Name { get; set; }
    }

    public class Writer
    {
        public void Rename(User user)
        {
            user.Name = "x";
        }
    }
}
"#,
        )]);
        let v = visit(&c, "Prop.cs");
        let calls = calls_of(&v, "Writer.Rename");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id.qualified_name(), "App.User.set_Name(string)");
        assert_eq!(calls[0].kind, CallEdgeKind::PropertySetter);
    }

    #[test]
    fn test_compound_assignment_emits_both_accessors() {
        let (_t, c) = build(&[(
            "Prop.cs",
            r#"
namespace App
{
    public class Counter
    {
        public int Value { get; set; }
    }

    public class Bump
    {
        public void Incr(Counter counter)
        {
            counter.Value += 1;
        }
    }
}
"#,
        )]);
        let v = visit(&c, "Prop.cs");
        let calls = calls_of(&v, "Bump.Incr");
        let kinds: Vec<_> = calls.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&CallEdgeKind::PropertySetter));
        assert!(kinds.contains(&CallEdgeKind::PropertyGetter));
    }

    #[test]
    fn test_property_read_emits_getter() {
        let (_t, c) = build(&[(
            "Read.cs",
            r#"
namespace App
{
    public class User
    {
        public string Name { get; set; }
    }

    public class Reader
    {
        public string NameOf(User user)
        {
            return user.Name;
        }
    }
}
"#,
        )]);
        let v = visit(&c, "Read.cs");
        let calls = calls_of(&v, "Reader.NameOf");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id.qualified_name(), "App.User.get_Name()");
    }

    #[test]
    fn test_duplicate_calls_coalesce() {
        let (_t, c) = build(&[(
            "Dup.cs",
            r#"
namespace App
{
    public class Svc
    {
        public void Go()
        {
            Step();
            Step();
            Step();
        }

        private void Step() { }
    }
}
"#,
        )]);
        let v = visit(&c, "Dup.cs");
        assert_eq!(calls_of(&v, "Svc.Go").len(), 1);
    }

    #[test]
    fn test_unresolved_counted_not_emitted() {
        let (_t, c) = build(&[(
            "Dyn.cs",
            r#"
namespace App
{
    public class Svc
    {
        public void Go(dynamic thing)
        {
            thing.Whatever();
            Console.WriteLine("hi");
        }
    }
}
"#,
        )]);
        let v = visit(&c, "Dyn.cs");
        assert!(calls_of(&v, "Svc.Go").is_empty());
        assert!(v.unresolved >= 2);
    }

    #[test]
    fn test_delegate_invoke_through_method_group() {
        let (_t, c) = build(&[(
            "Del.cs",
            r#"
namespace App
{
    public class Svc
    {
        public void Go()
        {
            Action handler = Handle;
            handler();
        }

        private void Handle() { }
    }
}
"#,
        )]);
        let v = visit(&c, "Del.cs");
        let calls = calls_of(&v, "Svc.Go");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id.qualified_name(), "App.Svc.Handle()");
        assert_eq!(calls[0].kind, CallEdgeKind::DelegateInvoke);
    }

    #[test]
    fn test_local_var_type_inference_from_new() {
        let (_t, c) = build(&[(
            "Var.cs",
            r#"
namespace App
{
    public class Repo
    {
        public void Save() { }
    }

    public class Svc
    {
        public void Go()
        {
            var repo = new Repo();
            repo.Save();
        }
    }
}
"#,
        )]);
        let v = visit(&c, "Var.cs");
        let calls = calls_of(&v, "Svc.Go");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.qualified_name(), "App.Repo..ctor()");
        assert_eq!(calls[1].id.qualified_name(), "App.Repo.Save()");
    }

    #[test]
    fn test_expression_bodied_property_getter_edges() {
        let (_t, c) = build(&[(
            "Expr.cs",
            r#"
namespace App
{
    public class Svc
    {
        public int Total => Compute();

        private int Compute() { return 0; }
    }
}
"#,
        )]);
        let v = visit(&c, "Expr.cs");
        let calls = calls_of(&v, "get_Total");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id.qualified_name(), "App.Svc.Compute()");
    }
}
