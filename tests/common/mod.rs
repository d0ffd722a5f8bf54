//! Shared test fixtures
//!
//! `TestSolution` builds a temporary C# solution on disk: a `.sln` manifest,
//! one `.csproj` per project (with project and package references), and
//! source files. Tests drive the real engine against these trees instead of
//! checking in fixture files.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

struct ProjectSpec {
    name: String,
    references: Vec<String>,
    packages: Vec<(String, String)>,
    files: Vec<(String, String)>,
}

/// Builder for temporary C# solutions
pub struct TestSolution {
    dir: TempDir,
    name: String,
    projects: Vec<ProjectSpec>,
}

impl TestSolution {
    pub fn new(name: &str) -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            name: name.to_string(),
            projects: Vec::new(),
        }
    }

    /// Add a project; `references` are project names added elsewhere
    pub fn project(mut self, name: &str, references: &[&str]) -> Self {
        self.projects.push(ProjectSpec {
            name: name.to_string(),
            references: references.iter().map(|s| s.to_string()).collect(),
            packages: Vec::new(),
            files: Vec::new(),
        });
        self
    }

    /// Add a package reference to the most recently added project
    pub fn package(mut self, package: &str, version: &str) -> Self {
        self.projects
            .last_mut()
            .expect("add a project first")
            .packages
            .push((package.to_string(), version.to_string()));
        self
    }

    /// Add a source file to the most recently added project
    pub fn file(mut self, name: &str, content: &str) -> Self {
        self.projects
            .last_mut()
            .expect("add a project first")
            .files
            .push((name.to_string(), content.to_string()));
        self
    }

    /// Write everything to disk and return the fixture handle
    pub fn build(self) -> BuiltSolution {
        let root = self.dir.path().to_path_buf();
        let mut sln = String::from("Microsoft Visual Studio Solution File, Format Version 12.00\n");

        for project in &self.projects {
            sln.push_str(&format!(
                "Project(\"{{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}}\") = \"{0}\", \"{0}\\{0}.csproj\", \"{{00000000-0000-0000-0000-000000000000}}\"\nEndProject\n",
                project.name
            ));

            let project_dir = root.join(&project.name);
            fs::create_dir_all(&project_dir).expect("create project dir");

            let mut csproj = String::from("<Project Sdk=\"Microsoft.NET.Sdk\">\n");
            csproj.push_str(
                "  <PropertyGroup>\n    <TargetFramework>net8.0</TargetFramework>\n  </PropertyGroup>\n",
            );
            if !project.references.is_empty() || !project.packages.is_empty() {
                csproj.push_str("  <ItemGroup>\n");
                for reference in &project.references {
                    csproj.push_str(&format!(
                        "    <ProjectReference Include=\"..\\{0}\\{0}.csproj\" />\n",
                        reference
                    ));
                }
                for (package, version) in &project.packages {
                    csproj.push_str(&format!(
                        "    <PackageReference Include=\"{}\" Version=\"{}\" />\n",
                        package, version
                    ));
                }
                csproj.push_str("  </ItemGroup>\n");
            }
            csproj.push_str("</Project>\n");
            fs::write(project_dir.join(format!("{}.csproj", project.name)), csproj)
                .expect("write csproj");

            for (file, content) in &project.files {
                let path = project_dir.join(file);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).expect("create source dir");
                }
                fs::write(path, content).expect("write source");
            }
        }

        let sln_path = root.join(format!("{}.sln", self.name));
        fs::write(&sln_path, sln).expect("write sln");

        BuiltSolution {
            dir: self.dir,
            sln_path,
        }
    }
}

/// A solution written to disk; dropping it removes the tree
pub struct BuiltSolution {
    dir: TempDir,
    sln_path: PathBuf,
}

impl BuiltSolution {
    pub fn sln(&self) -> &Path {
        &self.sln_path
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Cache directory isolated to this fixture
    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join(".testmap-cache")
    }

    /// Overwrite one source file
    pub fn rewrite(&self, project: &str, file: &str, content: &str) {
        fs::write(self.dir.path().join(project).join(file), content).expect("rewrite source");
    }

    /// Rewrite a file with its current bytes (bumps mtime, keeps content)
    pub fn touch(&self, project: &str, file: &str) {
        let path = self.dir.path().join(project).join(file);
        let content = fs::read(&path).expect("read source");
        fs::write(&path, content).expect("touch source");
    }
}

/// The standard calculator fixture used across scenario tests:
/// a production project plus an xunit test project covering it.
pub fn calculator_solution() -> BuiltSolution {
    TestSolution::new("CalcApp")
        .project("CalcApp", &[])
        .file(
            "Calc.cs",
            r#"
namespace CalcApp
{
    public class Calc
    {
        public int Add(int a, int b)
        {
            return a + b;
        }

        public int Scale(int a, int factor)
        {
            return Multiply(a, factor);
        }

        private int Multiply(int a, int b)
        {
            return a * b;
        }
    }

    public class Helper
    {
        public void Unused()
        {
        }
    }
}
"#,
        )
        .file(
            "User.cs",
            r#"
namespace CalcApp
{
    public class User
    {
        public string Name { get; set; }
    }
}
"#,
        )
        .project("CalcApp.Tests", &["CalcApp"])
        .package("xunit", "2.6.1")
        .package("Microsoft.NET.Test.Sdk", "17.8.0")
        .file(
            "CalcTests.cs",
            r#"
using CalcApp;

namespace CalcApp.Tests
{
    public class CalcTests
    {
        [Fact]
        public void Add_TwoPositives_ReturnsSum()
        {
            var calc = new Calc();
            calc.Add(2, 3);
        }

        [Fact]
        public void Scale_ByTwo_Doubles()
        {
            var calc = new Calc();
            calc.Scale(4, 2);
        }

        [Fact]
        public void Rename_SetsName()
        {
            var user = new User();
            user.Name = "x";
        }
    }
}
"#,
        )
        .build()
}
