//! Canonical method identifiers
//!
//! A `MethodId` is the sole key used in call graphs and caches. Its canonical
//! string form is `Namespace.Type.Method(paramTy,paramTy)`; generic arity is
//! encoded in the name with the C# backtick convention (``Method`1``), so
//! constructed-generic instances collapse onto their open-generic id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical, value-typed identifier of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId {
    /// Fully-qualified declaring type name, e.g. `MyApp.Services.UserService`
    pub type_fqn: String,
    /// Method name; `.ctor` for constructors, ``Name`N`` for generic methods,
    /// `get_X`/`set_X` for property accessors
    pub method: String,
    /// Ordered parameter type names as written, whitespace-normalized
    pub params: Vec<String>,
}

impl MethodId {
    pub fn new(
        type_fqn: impl Into<String>,
        method: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            type_fqn: type_fqn.into(),
            method: method.into(),
            params,
        }
    }

    /// Constructor id for a type
    pub fn ctor(type_fqn: impl Into<String>, params: Vec<String>) -> Self {
        Self::new(type_fqn, ".ctor", params)
    }

    /// Property getter id
    pub fn getter(type_fqn: impl Into<String>, property: &str) -> Self {
        Self::new(type_fqn, format!("get_{}", property), Vec::new())
    }

    /// Property setter id; the single parameter is the property type
    pub fn setter(type_fqn: impl Into<String>, property: &str, ty: &str) -> Self {
        Self::new(type_fqn, format!("set_{}", property), vec![ty.to_string()])
    }

    /// Method simple name without arity suffix or accessor prefix
    pub fn simple_name(&self) -> &str {
        let base = self.method.split('`').next().unwrap_or(&self.method);
        base.strip_prefix("get_")
            .or_else(|| base.strip_prefix("set_"))
            .unwrap_or(base)
    }

    /// Simple name of the declaring type, arity suffix stripped
    pub fn type_simple_name(&self) -> &str {
        let simple = self.type_fqn.rsplit('.').next().unwrap_or(&self.type_fqn);
        simple.split('`').next().unwrap_or(simple)
    }

    /// Namespace portion of the declaring type
    pub fn namespace(&self) -> &str {
        match self.type_fqn.rfind('.') {
            Some(idx) => &self.type_fqn[..idx],
            None => "",
        }
    }

    /// Number of shared leading namespace segments with another id
    pub fn shared_namespace_segments(&self, other: &MethodId) -> usize {
        self.namespace()
            .split('.')
            .zip(other.namespace().split('.'))
            .take_while(|(a, b)| !a.is_empty() && a == b)
            .count()
    }

    /// Canonical serialized form; `Display` renders the same string
    pub fn qualified_name(&self) -> String {
        format!("{}.{}({})", self.type_fqn, self.method, self.params.join(","))
    }

    /// Parse the canonical form back into an id.
    ///
    /// Returns `None` when the string is not a well-formed qualified name.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let open = input.find('(')?;
        if !input.ends_with(')') {
            return None;
        }
        let path = &input[..open];
        let args = &input[open + 1..input.len() - 1];

        let dot = path.rfind('.')?;
        let (type_fqn, method) = if path[dot..].starts_with(".ctor") && path.ends_with(".ctor") {
            // `.ctor` contains the separating dot itself
            let type_end = path.len() - ".ctor".len() - 1;
            (&path[..type_end.max(0)], ".ctor")
        } else {
            (&path[..dot], &path[dot + 1..])
        };
        if type_fqn.is_empty() || method.is_empty() {
            return None;
        }

        let params = if args.is_empty() {
            Vec::new()
        } else {
            args.split(',').map(|p| p.trim().to_string()).collect()
        };

        Some(Self::new(type_fqn, method, params))
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

impl Serialize for MethodId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.qualified_name())
    }
}

impl<'de> Deserialize<'de> for MethodId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MethodId::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid method id: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name_round_trip() {
        let id = MethodId::new(
            "MyApp.Services.UserService",
            "CreateUser",
            vec!["string".into(), "int".into()],
        );
        let s = id.qualified_name();
        assert_eq!(s, "MyApp.Services.UserService.CreateUser(string,int)");
        assert_eq!(MethodId::parse(&s).unwrap(), id);
    }

    #[test]
    fn test_ctor_round_trip() {
        let id = MethodId::ctor("MyApp.Models.User", vec!["string".into()]);
        let s = id.qualified_name();
        assert_eq!(s, "MyApp.Models.User..ctor(string)");
        assert_eq!(MethodId::parse(&s).unwrap(), id);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let s = "Core.Repository`1.Find(int)";
        let id = MethodId::parse(s).unwrap();
        assert_eq!(id.qualified_name(), s);
        assert_eq!(MethodId::parse(&id.qualified_name()).unwrap(), id);
    }

    #[test]
    fn test_overloads_differ_in_params() {
        let a = MethodId::new("Calc", "Add", vec!["int".into(), "int".into()]);
        let b = MethodId::new("Calc", "Add", vec!["double".into(), "double".into()]);
        assert_ne!(a, b);
        assert_eq!(a.simple_name(), b.simple_name());
    }

    #[test]
    fn test_simple_names() {
        let id = MethodId::new("MyApp.Models.User", "get_Name", vec![]);
        assert_eq!(id.simple_name(), "Name");
        assert_eq!(id.type_simple_name(), "User");
        assert_eq!(id.namespace(), "MyApp.Models");

        let generic = MethodId::new("Core.Mapper`1", "Map`1", vec!["T".into()]);
        assert_eq!(generic.simple_name(), "Map");
        assert_eq!(generic.type_simple_name(), "Mapper");
    }

    #[test]
    fn test_shared_namespace_segments() {
        let a = MethodId::new("MyApp.Services.UserService", "A", vec![]);
        let b = MethodId::new("MyApp.Services.Tests.UserServiceTests", "B", vec![]);
        let c = MethodId::new("Other.Place.Thing", "C", vec![]);
        assert_eq!(a.shared_namespace_segments(&b), 2);
        assert_eq!(a.shared_namespace_segments(&c), 0);
    }

    #[test]
    fn test_serde_as_string() {
        let id = MethodId::new("Ns.Type", "M", vec!["int".into()]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Ns.Type.M(int)\"");
        let back: MethodId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
