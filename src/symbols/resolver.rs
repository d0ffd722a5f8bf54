//! Symbol resolver
//!
//! Translates syntactic call sites into canonical `MethodId`s against a
//! semantic model. Resolution is deliberately conservative: a call that
//! cannot be bound to a declared method (dynamic dispatch through unknown
//! values, references outside the solution) returns `None` and the caller
//! counts it for diagnostics rather than guessing.

use ahash::AHashSet;

use crate::compilation::SemanticModel;
use crate::graph::model::CallEdgeKind;
use crate::symbols::id::MethodId;
use crate::syntax::{self, MethodDecl, TypeDecl, TypeKind};

/// A variable binding visible at a call site
#[derive(Debug, Clone, Default)]
pub struct LocalScope {
    /// Variable name -> declared (or inferred) type text
    vars: Vec<(String, String)>,

    /// Variable name -> method group it was assigned, for delegate tracking
    delegate_targets: Vec<(String, String)>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: &str, ty: &str) {
        self.vars.push((name.to_string(), ty.to_string()));
    }

    /// Record `Action a = Foo;` style method-group assignments
    pub fn bind_delegate(&mut self, name: &str, target: &str) {
        self.delegate_targets
            .push((name.to_string(), target.to_string()));
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        // Later bindings shadow earlier ones
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }

    pub fn delegate_target(&self, name: &str) -> Option<&str> {
        self.delegate_targets
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }

    /// Fork the scope for a nested block
    pub fn child(&self) -> Self {
        self.clone()
    }
}

/// How a receiver expression bound
#[derive(Debug, Clone)]
pub struct ReceiverBinding {
    /// Fully-qualified type of the receiver
    pub type_fqn: String,

    /// True when the receiver is the type itself (static access)
    pub is_static_access: bool,
}

/// A resolved call: the canonical id plus edge classification
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub id: MethodId,
    pub kind: CallEdgeKind,

    /// Known implementations, populated only in inclusive dispatch mode for
    /// interface and virtual targets
    pub implementations: Vec<MethodId>,

    /// Generic instantiation arguments, recorded for display only
    pub type_args: Vec<String>,
}

/// Resolver over one file's semantic model
pub struct SymbolResolver<'a> {
    model: &'a SemanticModel<'a>,
    inclusive_dispatch: bool,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(model: &'a SemanticModel<'a>) -> Self {
        Self {
            model,
            inclusive_dispatch: false,
        }
    }

    /// Also record edges to known implementations of interface/virtual
    /// targets (off by default)
    pub fn with_inclusive_dispatch(mut self, enabled: bool) -> Self {
        self.inclusive_dispatch = enabled;
        self
    }

    /// Resolve an invocation: `receiver.Name(args)` or bare `Name(args)`
    pub fn resolve_invocation(
        &self,
        receiver: Option<&str>,
        name: &str,
        arg_count: usize,
        scope: &LocalScope,
        enclosing_type: &str,
    ) -> Option<ResolvedCall> {
        let (open_name, type_args) = syntax::open_generic_name(name);
        let simple = open_name.split('`').next().unwrap_or(&open_name);

        match receiver {
            None | Some("this") => {
                // Delegate invocation through a local variable
                if receiver.is_none() {
                    if let Some(target) = scope.delegate_target(simple) {
                        return self
                            .resolve_method_group(target, scope, enclosing_type)
                            .map(|mut r| {
                                r.kind = CallEdgeKind::DelegateInvoke;
                                r
                            });
                    }
                    if scope.type_of(simple).is_some() {
                        // A delegate-typed variable with an unknown target
                        return None;
                    }
                }
                // Own or inherited member
                self.resolve_member_call(enclosing_type, simple, arg_count, false, &type_args)
            }
            Some("base") => {
                let base = self.first_base_class(enclosing_type)?;
                self.resolve_member_call(&base, simple, arg_count, false, &type_args)
            }
            Some(recv) => {
                let binding = self.bind_receiver(recv, scope, enclosing_type)?;
                let result = self.resolve_member_call(
                    &binding.type_fqn,
                    simple,
                    arg_count,
                    binding.is_static_access,
                    &type_args,
                );
                if result.is_some() {
                    return result;
                }
                if !binding.is_static_access {
                    // Receiver-style call with no declared member: extension
                    return self.resolve_extension(
                        &binding.type_fqn,
                        simple,
                        arg_count,
                        &type_args,
                    );
                }
                None
            }
        }
    }

    /// Resolve `new Type(args)` to a constructor id
    pub fn resolve_object_creation(
        &self,
        type_name: &str,
        arg_count: usize,
        enclosing_type: &str,
    ) -> Option<ResolvedCall> {
        let namespace = type_namespace(enclosing_type);
        let (open_name, type_args) = syntax::open_generic_name(type_name);
        let fqn = self
            .model
            .resolve_type_name(&open_name, namespace)
            .map(|f| self.model.canonical_fqn(&f))?;
        let (_, decl) = self.model.find_type(&fqn)?;

        let ctors: Vec<&MethodDecl> = decl
            .methods
            .iter()
            .filter(|m| m.name == ".ctor")
            .collect();
        let id = match select_overload(&ctors, arg_count) {
            Some(ctor) => MethodId::ctor(fqn, param_types(ctor)),
            // Implicit default constructor
            None => MethodId::ctor(fqn, vec![]),
        };
        Some(ResolvedCall {
            id,
            kind: CallEdgeKind::Constructor,
            implementations: Vec::new(),
            type_args,
        })
    }

    /// Resolve a property access to its getter or setter id
    pub fn resolve_property_access(
        &self,
        receiver: Option<&str>,
        name: &str,
        is_write: bool,
        scope: &LocalScope,
        enclosing_type: &str,
    ) -> Option<ResolvedCall> {
        let type_fqn = match receiver {
            None | Some("this") => enclosing_type.to_string(),
            Some(recv) => self.bind_receiver(recv, scope, enclosing_type)?.type_fqn,
        };
        let (owner, property) = self.find_property(&type_fqn, name)?;

        let (id, kind) = if is_write {
            if !property.has_setter {
                return None;
            }
            (
                MethodId::setter(owner, name, &property.ty),
                CallEdgeKind::PropertySetter,
            )
        } else {
            if !property.has_getter {
                return None;
            }
            (MethodId::getter(owner, name), CallEdgeKind::PropertyGetter)
        };
        Some(ResolvedCall {
            id,
            kind,
            implementations: Vec::new(),
            type_args: Vec::new(),
        })
    }

    /// Resolve the type of a receiver expression (dotted chains included)
    pub fn bind_receiver(
        &self,
        receiver: &str,
        scope: &LocalScope,
        enclosing_type: &str,
    ) -> Option<ReceiverBinding> {
        let namespace = type_namespace(enclosing_type);
        let receiver = receiver.trim();

        // A dotted expression may be a namespace-qualified type; locals win
        // for single segments, so only the multi-segment form is tried here.
        if receiver.contains('.') {
            if let Some(fqn) = self.try_resolve_as_type(receiver, namespace) {
                return Some(ReceiverBinding {
                    type_fqn: fqn,
                    is_static_access: true,
                });
            }
        }

        let mut segments = receiver.split('.');
        let first = segments.next()?;

        let mut current: Option<ReceiverBinding> = if first == "this" {
            Some(ReceiverBinding {
                type_fqn: enclosing_type.to_string(),
                is_static_access: false,
            })
        } else if first == "base" {
            self.first_base_class(enclosing_type)
                .map(|fqn| ReceiverBinding {
                    type_fqn: fqn,
                    is_static_access: false,
                })
        } else if let Some(ty) = scope.type_of(first) {
            self.resolve_written_type(ty, namespace)
                .map(|fqn| ReceiverBinding {
                    type_fqn: fqn,
                    is_static_access: false,
                })
        } else if let Some(field_ty) = self.field_or_property_type(enclosing_type, first) {
            self.resolve_written_type(&field_ty, namespace)
                .map(|fqn| ReceiverBinding {
                    type_fqn: fqn,
                    is_static_access: false,
                })
        } else {
            self.try_resolve_as_type(first, namespace)
                .map(|fqn| ReceiverBinding {
                    type_fqn: fqn,
                    is_static_access: true,
                })
        };

        // Walk the remaining member chain through field/property types
        for segment in segments {
            let binding = current.take()?;
            let member_ty = self.field_or_property_type(&binding.type_fqn, segment)?;
            let fqn = self.resolve_written_type(&member_ty, namespace)?;
            current = Some(ReceiverBinding {
                type_fqn: fqn,
                is_static_access: false,
            });
        }
        current
    }

    /// Resolve `X.M` method-group text to a method id
    fn resolve_method_group(
        &self,
        target: &str,
        scope: &LocalScope,
        enclosing_type: &str,
    ) -> Option<ResolvedCall> {
        match target.rsplit_once('.') {
            Some((receiver, name)) => {
                self.resolve_invocation(Some(receiver), name, usize::MAX, scope, enclosing_type)
            }
            None => self.resolve_invocation(None, target, usize::MAX, scope, enclosing_type),
        }
    }

    /// Member lookup walking the base-type chain
    fn resolve_member_call(
        &self,
        type_fqn: &str,
        name: &str,
        arg_count: usize,
        static_access: bool,
        type_args: &[String],
    ) -> Option<ResolvedCall> {
        let mut visited: AHashSet<String> = AHashSet::new();
        let mut frontier = vec![type_fqn.to_string()];

        while let Some(fqn) = frontier.pop() {
            if !visited.insert(fqn.clone()) {
                continue;
            }
            let (_, decl) = match self.model.find_type(&fqn) {
                Some(found) => found,
                None => continue,
            };

            let candidates: Vec<&MethodDecl> = decl
                .methods
                .iter()
                .filter(|m| m.name.split('`').next() == Some(name) && m.name != ".ctor")
                .collect();
            if let Some(method) = select_overload(&candidates, arg_count) {
                let kind = classify_member(decl, method, static_access);
                let id = MethodId::new(
                    fqn.clone(),
                    syntax::with_arity(name, method.generic_arity),
                    param_types(method),
                );
                let implementations = if self.inclusive_dispatch
                    && matches!(kind, CallEdgeKind::InterfaceCall | CallEdgeKind::VirtualCall)
                {
                    self.known_implementations(decl, name, arg_count)
                } else {
                    Vec::new()
                };
                return Some(ResolvedCall {
                    id,
                    kind,
                    implementations,
                    type_args: type_args.to_vec(),
                });
            }

            // Property accessors can be called method-style through the
            // member chain; not handled here, the visitor routes those.

            let namespace = decl.namespace.clone();
            for base in &decl.base_types {
                if let Some(base_fqn) = self.resolve_written_type(base, &namespace) {
                    frontier.push(base_fqn);
                }
            }
        }
        None
    }

    /// Extension-method lookup across static classes in scope
    fn resolve_extension(
        &self,
        receiver_fqn: &str,
        name: &str,
        arg_count: usize,
        type_args: &[String],
    ) -> Option<ResolvedCall> {
        let receiver_simple = receiver_fqn
            .rsplit('.')
            .next()
            .unwrap_or(receiver_fqn)
            .split('`')
            .next()
            .unwrap_or(receiver_fqn);

        let mut fallback: Option<MethodId> = None;
        let compilations = std::iter::once(self.model.compilation)
            .chain(self.model.dependencies.iter().copied());
        for compilation in compilations {
            for (fqn, decl) in compilation.all_types() {
                if !decl.is_static {
                    continue;
                }
                for method in &decl.methods {
                    if !method.is_extension() {
                        continue;
                    }
                    if method.name.split('`').next() != Some(name) {
                        continue;
                    }
                    // Receiver argument is implicit at the call site
                    if arg_count != usize::MAX && method.params.len() != arg_count + 1 {
                        continue;
                    }
                    let id = MethodId::new(
                        fqn.clone(),
                        syntax::with_arity(name, method.generic_arity),
                        param_types(method),
                    );
                    let this_ty = method.params[0].ty.clone();
                    let this_simple = this_ty
                        .rsplit('.')
                        .next()
                        .unwrap_or(&this_ty)
                        .split('<')
                        .next()
                        .unwrap_or(&this_ty);
                    if this_simple == receiver_simple {
                        return Some(ResolvedCall {
                            id,
                            kind: CallEdgeKind::ExtensionMethod,
                            implementations: Vec::new(),
                            type_args: type_args.to_vec(),
                        });
                    }
                    if fallback.is_none() {
                        fallback = Some(id);
                    }
                }
            }
        }
        fallback.map(|id| ResolvedCall {
            id,
            kind: CallEdgeKind::ExtensionMethod,
            implementations: Vec::new(),
            type_args: type_args.to_vec(),
        })
    }

    /// Implementations of an interface/virtual member, for inclusive mode
    fn known_implementations(
        &self,
        owner: &TypeDecl,
        name: &str,
        arg_count: usize,
    ) -> Vec<MethodId> {
        let owner_simple = owner.name.split('`').next().unwrap_or(&owner.name);
        let mut out = Vec::new();
        let compilations = std::iter::once(self.model.compilation)
            .chain(self.model.dependencies.iter().copied());
        for compilation in compilations {
            for (fqn, decl) in compilation.all_types() {
                let inherits = decl.base_types.iter().any(|b| {
                    let simple = b.rsplit('.').next().unwrap_or(b);
                    simple.split('<').next().unwrap_or(simple) == owner_simple
                });
                if !inherits {
                    continue;
                }
                let candidates: Vec<&MethodDecl> = decl
                    .methods
                    .iter()
                    .filter(|m| m.name.split('`').next() == Some(name))
                    .collect();
                if let Some(method) = select_overload(&candidates, arg_count) {
                    out.push(MethodId::new(
                        fqn,
                        syntax::with_arity(name, method.generic_arity),
                        param_types(method),
                    ));
                }
            }
        }
        out.sort();
        out
    }

    fn find_property(&self, type_fqn: &str, name: &str) -> Option<(String, syntax::PropertyDecl)> {
        let mut visited: AHashSet<String> = AHashSet::new();
        let mut frontier = vec![type_fqn.to_string()];
        while let Some(fqn) = frontier.pop() {
            if !visited.insert(fqn.clone()) {
                continue;
            }
            let (_, decl) = match self.model.find_type(&fqn) {
                Some(found) => found,
                None => continue,
            };
            if let Some(p) = decl.properties.iter().find(|p| p.name == name) {
                return Some((fqn, p.clone()));
            }
            let namespace = decl.namespace.clone();
            for base in &decl.base_types {
                if let Some(base_fqn) = self.resolve_written_type(base, &namespace) {
                    frontier.push(base_fqn);
                }
            }
        }
        None
    }

    fn field_or_property_type(&self, type_fqn: &str, member: &str) -> Option<String> {
        let (_, decl) = self.model.find_type(type_fqn)?;
        decl.fields
            .iter()
            .find(|f| f.name == member)
            .map(|f| f.ty.clone())
            .or_else(|| {
                decl.properties
                    .iter()
                    .find(|p| p.name == member)
                    .map(|p| p.ty.clone())
            })
    }

    fn first_base_class(&self, type_fqn: &str) -> Option<String> {
        let (_, decl) = self.model.find_type(type_fqn)?;
        let namespace = decl.namespace.clone();
        decl.base_types
            .first()
            .and_then(|b| self.resolve_written_type(b, &namespace))
    }

    /// Resolve a type as written (possibly generic) to a declared fqn
    fn resolve_written_type(&self, written: &str, namespace: &str) -> Option<String> {
        let (open, _) = syntax::open_generic_name(written);
        let simple = open.split('`').next().unwrap_or(&open);
        if let Some(fqn) = self.model.resolve_type_name(simple, namespace) {
            return Some(self.model.canonical_fqn(&fqn));
        }
        None
    }

    fn try_resolve_as_type(&self, text: &str, namespace: &str) -> Option<String> {
        if text.contains('.') {
            // Fully or partially qualified: accept if declared anywhere
            if self.model.find_type(text).is_some() {
                return Some(text.to_string());
            }
            let canonical = self.model.canonical_fqn(text);
            if self.model.find_type(&canonical).is_some() {
                return Some(canonical);
            }
            return None;
        }
        // Single segment: only a type if it is NOT shadowed by a local; the
        // caller checks locals first, so reaching here means type lookup.
        self.resolve_written_type(text, namespace)
    }
}

/// Deterministic overload selection: exact parameter count first, then the
/// first declared candidate (stable because declaration order is stable).
fn select_overload<'m>(candidates: &[&'m MethodDecl], arg_count: usize) -> Option<&'m MethodDecl> {
    if candidates.is_empty() {
        return None;
    }
    if arg_count == usize::MAX {
        return candidates.first().copied();
    }
    candidates
        .iter()
        .find(|m| m.params.len() == arg_count)
        .or_else(|| {
            // Optional/params arguments allow fewer call-site args
            candidates.iter().find(|m| m.params.len() > arg_count)
        })
        .or_else(|| candidates.first())
        .copied()
}

fn classify_member(owner: &TypeDecl, method: &MethodDecl, static_access: bool) -> CallEdgeKind {
    if owner.kind == TypeKind::Interface {
        CallEdgeKind::InterfaceCall
    } else if method.is_virtual() {
        CallEdgeKind::VirtualCall
    } else if method.is_static() || static_access {
        CallEdgeKind::StaticCall
    } else {
        CallEdgeKind::DirectCall
    }
}

fn param_types(method: &MethodDecl) -> Vec<String> {
    method.params.iter().map(|p| p.ty.clone()).collect()
}

fn type_namespace(type_fqn: &str) -> &str {
    match type_fqn.rfind('.') {
        Some(idx) => &type_fqn[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::Compilation;
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

    fn model_for<'a>(c: &'a Compilation, file: &str) -> SemanticModel<'a> {
        let idx = c
            .decls
            .iter()
            .position(|d| d.path.file_name().unwrap() == Path::new(file))
            .unwrap();
        SemanticModel {
            file: &c.files[idx],
            decls: &c.decls[idx],
            compilation: c,
            dependencies: vec![],
        }
    }

    const SERVICE: &str = r#"
using App.Models;

namespace App.Services
{
    public class UserService
    {
        private readonly UserRepository _repository;

        public User CreateUser(string name, int age)
        {
            Validate(name);
            return _repository.Add(new User(name, age));
        }

        private void Validate(string name) { }
    }

    public class UserRepository
    {
        public User Add(User user) { return user; }
        public User Add(User user, bool overwrite) { return user; }
    }
}
"#;

    const MODELS: &str = r#"
namespace App.Models
{
    public class User
    {
        public string Name { get; set; }

        public User(string name, int age) { }
    }
}
"#;

    #[test]
    fn test_resolve_implicit_this_call() {
        let (_t, c) = build(&[("Service.cs", SERVICE), ("Models.cs", MODELS)]);
        let model = model_for(&c, "Service.cs");
        let resolver = SymbolResolver::new(&model);
        let scope = LocalScope::new();

        let resolved = resolver
            .resolve_invocation(None, "Validate", 1, &scope, "App.Services.UserService")
            .unwrap();
        assert_eq!(
            resolved.id.qualified_name(),
            "App.Services.UserService.Validate(string)"
        );
        assert_eq!(resolved.kind, CallEdgeKind::DirectCall);
    }

    #[test]
    fn test_resolve_through_field_receiver() {
        let (_t, c) = build(&[("Service.cs", SERVICE), ("Models.cs", MODELS)]);
        let model = model_for(&c, "Service.cs");
        let resolver = SymbolResolver::new(&model);
        let scope = LocalScope::new();

        let resolved = resolver
            .resolve_invocation(
                Some("_repository"),
                "Add",
                1,
                &scope,
                "App.Services.UserService",
            )
            .unwrap();
        assert_eq!(
            resolved.id.qualified_name(),
            "App.Services.UserRepository.Add(User)"
        );
    }

    #[test]
    fn test_overloads_disambiguate_by_arg_count() {
        let (_t, c) = build(&[("Service.cs", SERVICE), ("Models.cs", MODELS)]);
        let model = model_for(&c, "Service.cs");
        let resolver = SymbolResolver::new(&model);
        let scope = LocalScope::new();

        let two = resolver
            .resolve_invocation(
                Some("_repository"),
                "Add",
                2,
                &scope,
                "App.Services.UserService",
            )
            .unwrap();
        assert_eq!(
            two.id.qualified_name(),
            "App.Services.UserRepository.Add(User,bool)"
        );
    }

    #[test]
    fn test_object_creation_binds_ctor() {
        let (_t, c) = build(&[("Service.cs", SERVICE), ("Models.cs", MODELS)]);
        let model = model_for(&c, "Service.cs");
        let resolver = SymbolResolver::new(&model);

        let resolved = resolver
            .resolve_object_creation("User", 2, "App.Services.UserService")
            .unwrap();
        assert_eq!(
            resolved.id.qualified_name(),
            "App.Models.User..ctor(string,int)"
        );
        assert_eq!(resolved.kind, CallEdgeKind::Constructor);
    }

    #[test]
    fn test_property_read_and_write() {
        let (_t, c) = build(&[("Service.cs", SERVICE), ("Models.cs", MODELS)]);
        let model = model_for(&c, "Models.cs");
        let resolver = SymbolResolver::new(&model);
        let mut scope = LocalScope::new();
        scope.bind("user", "User");

        let read = resolver
            .resolve_property_access(Some("user"), "Name", false, &scope, "App.Models.User")
            .unwrap();
        assert_eq!(read.id.qualified_name(), "App.Models.User.get_Name()");
        assert_eq!(read.kind, CallEdgeKind::PropertyGetter);

        let write = resolver
            .resolve_property_access(Some("user"), "Name", true, &scope, "App.Models.User")
            .unwrap();
        assert_eq!(write.id.qualified_name(), "App.Models.User.set_Name(string)");
        assert_eq!(write.kind, CallEdgeKind::PropertySetter);
    }

    #[test]
    fn test_static_call_through_type_name() {
        let (_t, c) = build(&[(
            "Util.cs",
            r#"
namespace App
{
    public static class MathUtil
    {
        public static int Square(int x) { return x * x; }
    }

    public class Caller
    {
        public int Go() { return MathUtil.Square(3); }
    }
}
"#,
        )]);
        let model = model_for(&c, "Util.cs");
        let resolver = SymbolResolver::new(&model);
        let scope = LocalScope::new();

        let resolved = resolver
            .resolve_invocation(Some("MathUtil"), "Square", 1, &scope, "App.Caller")
            .unwrap();
        assert_eq!(resolved.id.qualified_name(), "App.MathUtil.Square(int)");
        assert_eq!(resolved.kind, CallEdgeKind::StaticCall);
    }

    #[test]
    fn test_extension_method_resolves_to_static_id() {
        let (_t, c) = build(&[(
            "Ext.cs",
            r#"
namespace App
{
    public class Order { }

    public static class OrderExtensions
    {
        public static bool IsEmpty(this Order order) { return true; }
    }

    public class Caller
    {
        public bool Check(Order order) { return order.IsEmpty(); }
    }
}
"#,
        )]);
        let model = model_for(&c, "Ext.cs");
        let resolver = SymbolResolver::new(&model);
        let mut scope = LocalScope::new();
        scope.bind("order", "Order");

        let resolved = resolver
            .resolve_invocation(Some("order"), "IsEmpty", 0, &scope, "App.Caller")
            .unwrap();
        assert_eq!(
            resolved.id.qualified_name(),
            "App.OrderExtensions.IsEmpty(Order)"
        );
        assert_eq!(resolved.kind, CallEdgeKind::ExtensionMethod);
    }

    #[test]
    fn test_interface_call_and_inclusive_dispatch() {
        let (_t, c) = build(&[(
            "Iface.cs",
            r#"
namespace App
{
    public interface INotifier
    {
        void Notify(string message);
    }

    public class EmailNotifier : INotifier
    {
        public void Notify(string message) { }
    }

    public class Caller
    {
        private INotifier _notifier;
        public void Go() { _notifier.Notify("hi"); }
    }
}
"#,
        )]);
        let model = model_for(&c, "Iface.cs");
        let scope = LocalScope::new();

        let plain = SymbolResolver::new(&model)
            .resolve_invocation(Some("_notifier"), "Notify", 1, &scope, "App.Caller")
            .unwrap();
        assert_eq!(plain.id.qualified_name(), "App.INotifier.Notify(string)");
        assert_eq!(plain.kind, CallEdgeKind::InterfaceCall);
        assert!(plain.implementations.is_empty());

        let inclusive = SymbolResolver::new(&model)
            .with_inclusive_dispatch(true)
            .resolve_invocation(Some("_notifier"), "Notify", 1, &scope, "App.Caller")
            .unwrap();
        assert_eq!(inclusive.implementations.len(), 1);
        assert_eq!(
            inclusive.implementations[0].qualified_name(),
            "App.EmailNotifier.Notify(string)"
        );
    }

    #[test]
    fn test_generic_instantiation_collapses_to_open_generic() {
        let (_t, c) = build(&[(
            "Gen.cs",
            r#"
namespace App
{
    public class Mapper
    {
        public T Map<T>(object value) { return default; }
    }

    public class Caller
    {
        private Mapper _mapper;
        public int Go() { return _mapper.Map<int>(null); }
    }
}
"#,
        )]);
        let model = model_for(&c, "Gen.cs");
        let resolver = SymbolResolver::new(&model);
        let scope = LocalScope::new();

        let resolved = resolver
            .resolve_invocation(Some("_mapper"), "Map<int>", 1, &scope, "App.Caller")
            .unwrap();
        assert_eq!(resolved.id.qualified_name(), "App.Mapper.Map`1(object)");
        assert_eq!(resolved.type_args, vec!["int"]);
    }

    #[test]
    fn test_unresolved_returns_none() {
        let (_t, c) = build(&[("Models.cs", MODELS)]);
        let model = model_for(&c, "Models.cs");
        let resolver = SymbolResolver::new(&model);
        let scope = LocalScope::new();

        assert!(resolver
            .resolve_invocation(Some("unknown"), "Whatever", 0, &scope, "App.Models.User")
            .is_none());
    }
}
