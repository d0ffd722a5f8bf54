//! Test method classification
//!
//! Identifies test methods and tags them with a framework and category.
//! Frameworks are a closed set of tagged variants; there is no runtime
//! handler discovery. A method is a test when any of the following holds:
//!
//! - its attribute list carries a recognized test marker,
//! - its simple name matches a test naming convention and its project
//!   references a test framework package,
//! - it is a public method of a conventionally-named test type inside a
//!   project classified as a test project.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::project::ProjectInfo;
use crate::syntax::{MethodDecl, TypeDecl};

/// Supported test frameworks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    XUnit,
    NUnit,
    MsTest,
    #[default]
    Unknown,
}

impl TestFramework {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::XUnit => "xunit",
            Self::NUnit => "nunit",
            Self::MsTest => "mstest",
            Self::Unknown => "unknown",
        }
    }
}

/// Test category inferred from naming and project markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TestCategory {
    Unit,
    Integration,
    EndToEnd,
    Performance,
    #[default]
    Unknown,
}

impl TestCategory {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Integration => "integration",
            Self::EndToEnd => "end_to_end",
            Self::Performance => "performance",
            Self::Unknown => "unknown",
        }
    }

    /// Rough per-test duration estimate used by selection budgets
    pub fn estimated_duration_secs(&self) -> f64 {
        match self {
            Self::Unit => 0.5,
            Self::Integration => 5.0,
            Self::EndToEnd => 30.0,
            Self::Performance => 60.0,
            Self::Unknown => 2.0,
        }
    }
}

const XUNIT_MARKERS: &[&str] = &["Fact", "Theory"];
const NUNIT_MARKERS: &[&str] = &["Test", "TestCase", "TestCaseSource"];
const MSTEST_MARKERS: &[&str] = &["TestMethod", "DataTestMethod"];

static TEST_NAME_CONVENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(test|should|when|given)|(_test|_should|_returns|_throws|_succeeds|_fails)")
        .unwrap()
});

const TEST_TYPE_SUFFIXES: &[&str] = &["Tests", "Test", "Spec", "Specs", "Fixture"];

/// Framework indicated by a method's attribute markers
pub fn framework_from_attributes(attributes: &[String]) -> Option<TestFramework> {
    for attr in attributes {
        if XUNIT_MARKERS.contains(&attr.as_str()) {
            return Some(TestFramework::XUnit);
        }
        if NUNIT_MARKERS.contains(&attr.as_str()) {
            return Some(TestFramework::NUnit);
        }
        if MSTEST_MARKERS.contains(&attr.as_str()) {
            return Some(TestFramework::MsTest);
        }
    }
    None
}

/// Framework indicated by a project's package references
pub fn framework_from_project(project: &ProjectInfo) -> TestFramework {
    if project.references_package("xunit") {
        TestFramework::XUnit
    } else if project.references_package("nunit") {
        TestFramework::NUnit
    } else if project.references_package("mstest") {
        TestFramework::MsTest
    } else {
        TestFramework::Unknown
    }
}

/// Whether a method simple name follows a test naming convention
pub fn matches_test_name(name: &str) -> bool {
    TEST_NAME_CONVENTION.is_match(name) || name.contains('_')
}

/// Whether a type name follows test-type conventions
pub fn is_test_type_name(name: &str) -> bool {
    let simple = name.split('`').next().unwrap_or(name);
    TEST_TYPE_SUFFIXES.iter().any(|s| simple.ends_with(s))
}

/// Decide whether a declared method is a test
pub fn is_test_method(method: &MethodDecl, ty: &TypeDecl, project: &ProjectInfo) -> bool {
    if method.name == ".ctor" {
        return false;
    }
    if framework_from_attributes(&method.attributes).is_some() {
        return true;
    }
    if !project.is_test_project {
        return false;
    }
    let has_framework = framework_from_project(project) != TestFramework::Unknown;
    if has_framework && matches_test_name(&method.name) {
        return true;
    }
    is_test_type_name(&ty.name) && method.modifiers.iter().any(|m| m == "public")
}

/// Framework tag for a test, preferring attribute evidence
pub fn classify_framework(method: &MethodDecl, project: &ProjectInfo) -> TestFramework {
    framework_from_attributes(&method.attributes)
        .unwrap_or_else(|| framework_from_project(project))
}

/// Category tag from namespace, type, and project name markers
pub fn classify_category(namespace: &str, type_name: &str, project: &ProjectInfo) -> TestCategory {
    let haystack = format!("{} {} {}", namespace, type_name, project.name).to_ascii_lowercase();
    if haystack.contains("e2e") || haystack.contains("endtoend") || haystack.contains("end2end") {
        TestCategory::EndToEnd
    } else if haystack.contains("integration") {
        TestCategory::Integration
    } else if haystack.contains("perf") || haystack.contains("benchmark") {
        TestCategory::Performance
    } else if project.is_test_project {
        TestCategory::Unit
    } else {
        TestCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{finalize_project, parse_project_file};
    use std::fs;

    fn test_project(packages: &str, name: &str) -> (tempfile::TempDir, ProjectInfo) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(format!("{}.csproj", name));
        fs::write(
            &path,
            format!(
                "<Project Sdk=\"Microsoft.NET.Sdk\"><ItemGroup>{}</ItemGroup></Project>",
                packages
            ),
        )
        .unwrap();
        let parsed = parse_project_file(name, &path).unwrap();
        let info = finalize_project(&parsed, vec![], &[]);
        (temp, info)
    }

    fn method(name: &str, attrs: &[&str], modifiers: &[&str]) -> MethodDecl {
        MethodDecl {
            name: name.to_string(),
            kind: crate::syntax::CallableKind::Method,
            params: vec![],
            return_type: "void".to_string(),
            generic_arity: 0,
            attributes: attrs.iter().map(|s| s.to_string()).collect(),
            modifiers: modifiers.iter().map(|s| s.to_string()).collect(),
            start_line: 1,
        }
    }

    fn ty(name: &str) -> TypeDecl {
        TypeDecl {
            namespace: "App.Tests".to_string(),
            name: name.to_string(),
            kind: crate::syntax::TypeKind::Class,
            base_types: vec![],
            attributes: vec![],
            methods: vec![],
            properties: vec![],
            fields: vec![],
            is_static: false,
            start_line: 1,
        }
    }

    #[test]
    fn test_attribute_marker_wins_everywhere() {
        let (_t, project) = test_project("", "App");
        assert!(!project.is_test_project);
        let m = method("Whatever", &["Fact"], &["public"]);
        assert!(is_test_method(&m, &ty("Helpers"), &project));
        assert_eq!(classify_framework(&m, &project), TestFramework::XUnit);
    }

    #[test]
    fn test_name_convention_requires_framework_reference() {
        let (_t, plain) = test_project("", "App.Tests");
        let m = method("Should_Create_User", &[], &["public"]);
        // Test project by name, but no framework package: falls to the
        // test-type-name rule, which Helpers does not satisfy
        assert!(!is_test_method(&m, &ty("Helpers"), &plain));

        let (_t2, with_xunit) = test_project(
            "<PackageReference Include=\"xunit\" Version=\"2.6\" />",
            "App.Tests",
        );
        assert!(is_test_method(&m, &ty("Helpers"), &with_xunit));
    }

    #[test]
    fn test_test_type_residency() {
        let (_t, project) = test_project("", "App.Tests");
        let m = method("RunScenario", &[], &["public"]);
        assert!(is_test_method(&m, &ty("CalcTests"), &project));
        let private = method("Helper", &[], &["private"]);
        assert!(!is_test_method(&private, &ty("CalcTests"), &project));
    }

    #[test]
    fn test_categories() {
        let (_t, project) = test_project(
            "<PackageReference Include=\"xunit\" Version=\"2.6\" />",
            "App.Tests",
        );
        assert_eq!(
            classify_category("App.Tests.Integration", "DbTests", &project),
            TestCategory::Integration
        );
        assert_eq!(
            classify_category("App.Tests", "CalcTests", &project),
            TestCategory::Unit
        );
        assert_eq!(
            classify_category("App.E2E", "FlowTests", &project),
            TestCategory::EndToEnd
        );
    }

    #[test]
    fn test_framework_tags() {
        assert_eq!(
            framework_from_attributes(&["Theory".to_string()]),
            Some(TestFramework::XUnit)
        );
        assert_eq!(
            framework_from_attributes(&["TestCase".to_string()]),
            Some(TestFramework::NUnit)
        );
        assert_eq!(
            framework_from_attributes(&["TestMethod".to_string()]),
            Some(TestFramework::MsTest)
        );
        assert_eq!(framework_from_attributes(&["Obsolete".to_string()]), None);
    }
}
