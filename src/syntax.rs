//! C# parsing layer
//!
//! Wraps tree-sitter with the C# grammar and extracts the declaration shapes
//! the rest of the engine works with: namespaces (block and file-scoped),
//! type declarations with base lists and attributes, methods, constructors,
//! properties with their accessors, fields, and using directives.
//!
//! The extraction here is purely syntactic. Semantic resolution (binding a
//! call site to a declared method across projects) lives in
//! `symbols::resolver` on top of these tables.

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::error::{EngineError, Result};

const MODIFIER_KEYWORDS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "virtual", "override", "abstract",
    "sealed", "async", "partial", "readonly", "extern", "new",
];

/// Construct a parser configured for C#
pub fn csharp_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| EngineError::Internal {
            message: format!("failed to load C# grammar: {}", e),
        })?;
    Ok(parser)
}

/// Parse a single C# source file
pub fn parse_source(path: &Path, source: &str) -> Result<Tree> {
    let mut parser = csharp_parser()?;
    parser
        .parse(source, None)
        .ok_or_else(|| EngineError::Compilation {
            project: String::new(),
            message: format!("tree-sitter failed to parse {}", path.display()),
        })
}

/// UTF-8 text of a node
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-indexed start line of a node
pub fn start_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Kind of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Struct,
    Record,
    Interface,
    Enum,
}

impl TypeKind {
    fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "class_declaration" => Some(Self::Class),
            "struct_declaration" => Some(Self::Struct),
            "record_declaration" => Some(Self::Record),
            "interface_declaration" => Some(Self::Interface),
            "enum_declaration" => Some(Self::Enum),
            _ => None,
        }
    }
}

/// A parameter as written in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    /// Normalized type text, e.g. `int`, `List<int>`
    pub ty: String,
    /// `this` modifier marks the receiver of an extension method
    pub is_this: bool,
}

/// What kind of callable a `MethodDecl` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Method,
    Constructor,
    Operator,
    LocalFunction,
}

/// A method-shaped declaration inside a type
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub kind: CallableKind,
    pub params: Vec<ParamDecl>,
    pub return_type: String,
    pub generic_arity: usize,
    pub attributes: Vec<String>,
    pub modifiers: Vec<String>,
    pub start_line: usize,
}

impl MethodDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.iter().any(|m| m == "static")
    }

    pub fn is_virtual(&self) -> bool {
        self.modifiers.iter().any(|m| m == "virtual" || m == "override" || m == "abstract")
    }

    /// First parameter carries `this`
    pub fn is_extension(&self) -> bool {
        self.params.first().map(|p| p.is_this).unwrap_or(false)
    }
}

/// A property declaration with its accessors
#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: String,
    pub has_getter: bool,
    pub has_setter: bool,
    pub attributes: Vec<String>,
    pub start_line: usize,
}

/// A field, kept for receiver-type resolution
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
}

/// A declared type with everything the resolver needs
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub namespace: String,
    /// Simple name including generic arity suffix, e.g. ``Repository`1``
    pub name: String,
    pub kind: TypeKind,
    pub base_types: Vec<String>,
    pub attributes: Vec<String>,
    pub methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
    pub fields: Vec<FieldDecl>,
    pub is_static: bool,
    pub start_line: usize,
}

impl TypeDecl {
    /// Fully-qualified name, namespace included
    pub fn fqn(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// All declarations extracted from one file
#[derive(Debug, Clone, Default)]
pub struct FileDecls {
    pub path: PathBuf,
    pub usings: Vec<String>,
    pub types: Vec<TypeDecl>,
}

/// Extract the declaration tables for one parsed file
pub fn extract_file_decls(path: &Path, source: &str, tree: &Tree) -> FileDecls {
    let mut decls = FileDecls {
        path: path.to_path_buf(),
        ..Default::default()
    };
    walk_decls(tree.root_node(), source, &mut String::new(), &mut decls);
    decls
}

fn walk_decls(node: Node<'_>, source: &str, namespace: &mut String, decls: &mut FileDecls) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "using_directive" => {
                if let Some(name) = child.child_by_field_name("name") {
                    decls.usings.push(node_text(name, source).to_string());
                } else {
                    // Older grammar versions expose the name as the last named child
                    let mut c = child.walk();
                    let found = child
                        .named_children(&mut c)
                        .find(|n| matches!(n.kind(), "qualified_name" | "identifier"));
                    if let Some(name) = found {
                        decls.usings.push(node_text(name, source).to_string());
                    }
                }
            }
            "namespace_declaration" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                let mut inner = join_namespace(namespace, &name);
                if let Some(body) = child.child_by_field_name("body") {
                    walk_decls(body, source, &mut inner, decls);
                }
            }
            "file_scoped_namespace_declaration" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                *namespace = join_namespace(namespace, &name);
            }
            kind if TypeKind::from_node_kind(kind).is_some() => {
                extract_type(child, source, namespace, decls);
            }
            // Descend through containers such as declaration lists
            _ if child.named_child_count() > 0 => {
                walk_decls(child, source, namespace, decls);
            }
            _ => {}
        }
    }
}

fn extract_type(node: Node<'_>, source: &str, namespace: &str, decls: &mut FileDecls) {
    let kind = match TypeKind::from_node_kind(node.kind()) {
        Some(k) => k,
        None => return,
    };
    let simple = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    if simple.is_empty() {
        return;
    }
    let arity = node
        .child_by_field_name("type_parameters")
        .map(type_param_count)
        .unwrap_or(0);
    let name = with_arity(&simple, arity);
    let modifiers = modifiers_of(node, source);

    let mut ty = TypeDecl {
        namespace: namespace.to_string(),
        name: name.clone(),
        kind,
        base_types: base_type_names(node, source),
        attributes: attribute_names(node, source),
        methods: Vec::new(),
        properties: Vec::new(),
        fields: Vec::new(),
        is_static: modifiers.iter().any(|m| m == "static"),
        start_line: start_line(node),
    };

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "method_declaration" => {
                    if let Some(m) = extract_callable(member, source, CallableKind::Method) {
                        ty.methods.push(m);
                    }
                }
                "constructor_declaration" => {
                    if let Some(m) = extract_callable(member, source, CallableKind::Constructor) {
                        ty.methods.push(m);
                    }
                }
                "operator_declaration" => {
                    if let Some(m) = extract_callable(member, source, CallableKind::Operator) {
                        ty.methods.push(m);
                    }
                }
                "property_declaration" => {
                    if let Some(p) = extract_property(member, source) {
                        ty.properties.push(p);
                    }
                }
                "field_declaration" => {
                    extract_fields(member, source, &mut ty.fields);
                }
                // Nested types become their own entries, qualified by the outer name
                k if TypeKind::from_node_kind(k).is_some() => {
                    let outer = if namespace.is_empty() {
                        name.clone()
                    } else {
                        format!("{}.{}", namespace, name)
                    };
                    extract_type(member, source, &outer, decls);
                }
                _ => {}
            }
        }
    }

    decls.types.push(ty);
}

/// Extract a method, constructor, operator, or local function declaration
pub fn extract_callable(node: Node<'_>, source: &str, kind: CallableKind) -> Option<MethodDecl> {
    let name = match kind {
        CallableKind::Operator => {
            let op = node
                .child_by_field_name("operator")
                .map(|n| node_text(n, source))
                .unwrap_or("");
            format!("op_{}", operator_method_name(op))
        }
        CallableKind::Constructor => ".ctor".to_string(),
        _ => node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())?,
    };
    if name.is_empty() {
        return None;
    }

    let generic_arity = node
        .child_by_field_name("type_parameters")
        .map(type_param_count)
        .unwrap_or(0);

    Some(MethodDecl {
        name,
        kind,
        params: param_decls(node, source),
        return_type: node
            .child_by_field_name("returns")
            .or_else(|| node.child_by_field_name("type"))
            .map(|n| normalize_type_text(node_text(n, source)))
            .unwrap_or_else(|| "void".to_string()),
        generic_arity,
        attributes: attribute_names(node, source),
        modifiers: modifiers_of(node, source),
        start_line: start_line(node),
    })
}

fn extract_property(node: Node<'_>, source: &str) -> Option<PropertyDecl> {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())?;
    let ty = node
        .child_by_field_name("type")
        .map(|n| normalize_type_text(node_text(n, source)))
        .unwrap_or_default();

    let mut has_getter = false;
    let mut has_setter = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "accessor_list" => {
                let mut ac = child.walk();
                for accessor in child.named_children(&mut ac) {
                    let text = node_text(accessor, source);
                    if text.starts_with("get") {
                        has_getter = true;
                    } else if text.starts_with("set") || text.starts_with("init") {
                        has_setter = true;
                    }
                }
            }
            // Expression-bodied property is getter-only
            "arrow_expression_clause" => has_getter = true,
            _ => {}
        }
    }

    Some(PropertyDecl {
        name,
        ty,
        has_getter,
        has_setter,
        attributes: attribute_names(node, source),
        start_line: start_line(node),
    })
}

fn extract_fields(node: Node<'_>, source: &str, out: &mut Vec<FieldDecl>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "variable_declaration" {
            continue;
        }
        let ty = child
            .child_by_field_name("type")
            .map(|n| normalize_type_text(node_text(n, source)))
            .unwrap_or_default();
        let mut vc = child.walk();
        for declarator in child.named_children(&mut vc) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            if let Some(name) = declarator.child_by_field_name("name") {
                out.push(FieldDecl {
                    name: node_text(name, source).to_string(),
                    ty: ty.clone(),
                });
            } else if let Some(first) = declarator.named_child(0) {
                out.push(FieldDecl {
                    name: node_text(first, source).to_string(),
                    ty: ty.clone(),
                });
            }
        }
    }
}

/// Parameter list of a callable declaration
pub fn param_decls(node: Node<'_>, source: &str) -> Vec<ParamDecl> {
    let mut params = Vec::new();
    let list = match node.child_by_field_name("parameters") {
        Some(l) => l,
        None => return params,
    };
    let mut cursor = list.walk();
    for param in list.named_children(&mut cursor) {
        if param.kind() != "parameter" {
            continue;
        }
        let ty = param
            .child_by_field_name("type")
            .map(|n| normalize_type_text(node_text(n, source)))
            .unwrap_or_else(|| "object".to_string());
        let name = param
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default();
        let is_this = {
            let mut pc = param.walk();
            let result = param
                .children(&mut pc)
                .any(|c| node_text(c, source) == "this" && c.start_byte() == param.start_byte());
            result
        };
        params.push(ParamDecl { name, ty, is_this });
    }
    params
}

/// Attribute simple names on a declaration, e.g. `Fact`, `TestMethod`
pub fn attribute_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "attribute_list" {
            continue;
        }
        let mut ac = child.walk();
        for attr in child.named_children(&mut ac) {
            if attr.kind() != "attribute" {
                continue;
            }
            if let Some(name) = attr.child_by_field_name("name") {
                let text = node_text(name, source);
                // `[Xunit.Fact]` and `[Fact]` name the same marker
                let simple = text.rsplit('.').next().unwrap_or(text);
                names.push(simple.to_string());
            }
        }
    }
    names
}

/// Modifier keywords present on a declaration
pub fn modifiers_of(node: Node<'_>, source: &str) -> Vec<String> {
    let mut mods = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let text = node_text(child, source);
        if MODIFIER_KEYWORDS.contains(&text) {
            mods.push(text.to_string());
        }
    }
    mods
}

fn base_type_names(node: Node<'_>, source: &str) -> Vec<String> {
    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "base_list" {
            continue;
        }
        let mut bc = child.walk();
        for base in child.named_children(&mut bc) {
            let text = normalize_type_text(node_text(base, source));
            if !text.is_empty() {
                bases.push(text);
            }
        }
    }
    bases
}

fn type_param_count(list: Node<'_>) -> usize {
    let mut count = 0;
    let mut cursor = list.walk();
    for child in list.named_children(&mut cursor) {
        if child.kind() == "type_parameter" {
            count += 1;
        }
    }
    count
}

/// Append the C#-style arity suffix to a generic name
pub fn with_arity(name: &str, arity: usize) -> String {
    if arity == 0 {
        name.to_string()
    } else {
        format!("{}`{}", name, arity)
    }
}

/// Strip whitespace from a type as written so `List<int >` and `List<int>`
/// compare equal in method ids
pub fn normalize_type_text(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Reduce a constructed generic name to its open-generic form:
/// `Parse<int>` becomes ``Parse`1``
pub fn open_generic_name(text: &str) -> (String, Vec<String>) {
    if let Some(open) = text.find('<') {
        if text.ends_with('>') {
            let base = &text[..open];
            let args: Vec<String> = split_type_args(&text[open + 1..text.len() - 1]);
            return (with_arity(base, args.len()), args);
        }
    }
    (text.to_string(), Vec::new())
}

fn split_type_args(inner: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

fn operator_method_name(op: &str) -> &'static str {
    match op {
        "+" => "Addition",
        "-" => "Subtraction",
        "*" => "Multiply",
        "/" => "Division",
        "%" => "Modulus",
        "==" => "Equality",
        "!=" => "Inequality",
        "<" => "LessThan",
        ">" => "GreaterThan",
        "<=" => "LessThanOrEqual",
        ">=" => "GreaterThanOrEqual",
        "!" => "LogicalNot",
        "++" => "Increment",
        "--" => "Decrement",
        _ => "Operator",
    }
}

fn join_namespace(outer: &str, inner: &str) -> String {
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

    fn decls_of(source: &str) -> FileDecls {
        let path = Path::new("Test.cs");
        let tree = parse_source(path, source).unwrap();
        extract_file_decls(path, source, &tree)
    }

    #[test]
    fn test_extracts_class_with_methods() {
        let decls = decls_of(
            r#"
using System;

namespace MyApp.Services
{
    public class UserService
    {
        private readonly IUserRepository _repository;

        public UserService(IUserRepository repository)
        {
            _repository = repository;
        }

        public User CreateUser(string name, int age)
        {
            Validate(name);
            return _repository.Add(new User(name, age));
        }

        private void Validate(string name)
        {
        }
    }
}
"#,
        );

        assert_eq!(decls.usings, vec!["System"]);
        assert_eq!(decls.types.len(), 1);
        let ty = &decls.types[0];
        assert_eq!(ty.namespace, "MyApp.Services");
        assert_eq!(ty.name, "UserService");
        assert_eq!(ty.kind, TypeKind::Class);

        let names: Vec<_> = ty.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec![".ctor", "CreateUser", "Validate"]);

        let create = &ty.methods[1];
        assert_eq!(create.params.len(), 2);
        assert_eq!(create.params[0].ty, "string");
        assert_eq!(create.params[1].ty, "int");
        assert_eq!(ty.fields.len(), 1);
        assert_eq!(ty.fields[0].ty, "IUserRepository");
    }

    #[test]
    fn test_file_scoped_namespace() {
        let decls = decls_of(
            r#"
namespace MyApp.Models;

public class User
{
    public string Name { get; set; }
    public int Age { get; }
}
"#,
        );
        assert_eq!(decls.types.len(), 1);
        let ty = &decls.types[0];
        assert_eq!(ty.namespace, "MyApp.Models");
        assert_eq!(ty.properties.len(), 2);
        assert!(ty.properties[0].has_getter);
        assert!(ty.properties[0].has_setter);
        assert!(ty.properties[1].has_getter);
        assert!(!ty.properties[1].has_setter);
    }

    #[test]
    fn test_generic_type_arity_suffix() {
        let decls = decls_of(
            r#"
namespace Core
{
    public class Repository<T>
    {
        public T Find(int id) { return default; }
    }
}
"#,
        );
        assert_eq!(decls.types[0].name, "Repository`1");
        assert_eq!(decls.types[0].fqn(), "Core.Repository`1");
    }

    #[test]
    fn test_test_attributes_extracted() {
        let decls = decls_of(
            r#"
namespace MyApp.Tests
{
    public class CalcTests
    {
        [Fact]
        public void Add_TwoPositives_ReturnsSum() { }

        [Xunit.Theory]
        public void Add_Cases(int a) { }
    }
}
"#,
        );
        let methods = &decls.types[0].methods;
        assert_eq!(methods[0].attributes, vec!["Fact"]);
        assert_eq!(methods[1].attributes, vec!["Theory"]);
    }

    #[test]
    fn test_extension_method_this_param() {
        let decls = decls_of(
            r#"
namespace Ext
{
    public static class StringExtensions
    {
        public static bool IsBlank(this string value) { return false; }
    }
}
"#,
        );
        let ty = &decls.types[0];
        assert!(ty.is_static);
        assert!(ty.methods[0].is_extension());
        assert!(ty.methods[0].is_static());
    }

    #[test]
    fn test_open_generic_name() {
        let (name, args) = open_generic_name("Parse<int>");
        assert_eq!(name, "Parse`1");
        assert_eq!(args, vec!["int"]);

        let (name, args) = open_generic_name("Map<string,List<int>>");
        assert_eq!(name, "Map`2");
        assert_eq!(args, vec!["string", "List<int>"]);

        let (name, args) = open_generic_name("Plain");
        assert_eq!(name, "Plain");
        assert!(args.is_empty());
    }

    #[test]
    fn test_base_types_recorded() {
        let decls = decls_of(
            r#"
namespace App
{
    public interface IService { }
    public class Service : BaseService, IService { }
}
"#,
        );
        let service = decls.types.iter().find(|t| t.name == "Service").unwrap();
        assert_eq!(service.base_types, vec!["BaseService", "IService"]);
    }
}
