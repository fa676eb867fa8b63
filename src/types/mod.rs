//! Type information for a loaded Go package
//!
//! The checker resolves just enough of Go's type system to answer one
//! question reliably: what is the static type of a call receiver. Results
//! live in a side table keyed by [`NodeKey`], so the syntax tree itself is
//! never touched.

pub mod checker;
pub mod external;
pub mod registry;

use crate::errors::Result;
use crate::loader::SourceFile;
use std::collections::HashMap;
use std::fmt;
use tree_sitter::Node;

pub use checker::Checker;
pub use registry::PackageRegistry;

/// A named type together with the import path of the package declaring it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedType {
    pub package: String,
    pub name: String,
}

impl NamedType {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// Parameter and result types of a function or method
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<GoType>,
    pub results: Vec<GoType>,
}

impl Signature {
    pub fn returning(results: Vec<GoType>) -> Self {
        Self {
            params: Vec::new(),
            results,
        }
    }

    /// Type of a call expression invoking this signature
    pub fn call_result(&self) -> GoType {
        match self.results.len() {
            0 => GoType::Unknown,
            1 => self.results[0].clone(),
            _ => GoType::Tuple(self.results.clone()),
        }
    }
}

/// A resolved Go type as far as the checker understands it
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GoType {
    Named(NamedType),
    Pointer(Box<GoType>),
    Slice(Box<GoType>),
    Map(Box<GoType>, Box<GoType>),
    Func(Box<Signature>),
    /// Results of a multi-value call
    Tuple(Vec<GoType>),
    /// Predeclared types such as `string` or `error`
    Basic(String),
    /// An identifier naming an imported package
    Package(String),
    #[default]
    Unknown,
}

impl GoType {
    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        GoType::Named(NamedType::new(package, name))
    }

    pub fn pointer_to(inner: GoType) -> Self {
        GoType::Pointer(Box::new(inner))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, GoType::Unknown)
    }

    /// Strip one level of pointer indirection
    pub fn deref(&self) -> &GoType {
        match self {
            GoType::Pointer(inner) => inner,
            other => other,
        }
    }

    /// Projection onto the descriptor the classifier works with
    pub fn describe(&self) -> TypeDesc {
        match self {
            GoType::Named(named) => TypeDesc::Named(named.clone()),
            GoType::Pointer(inner) => match inner.as_ref() {
                GoType::Named(named) => TypeDesc::NamedPointer(named.clone()),
                _ => TypeDesc::Unresolved,
            },
            _ => TypeDesc::Unresolved,
        }
    }
}

/// Resolved type of an expression as seen by the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    NamedPointer(NamedType),
    Named(NamedType),
    Unresolved,
}

impl TypeDesc {
    /// Go's spelling of the type, e.g. `*database/sql.DB`
    pub fn type_string(&self) -> Option<String> {
        match self {
            TypeDesc::NamedPointer(named) => Some(format!("*{}", named)),
            TypeDesc::Named(named) => Some(named.to_string()),
            TypeDesc::Unresolved => None,
        }
    }
}

/// Stable handle for a syntax node: its byte span and grammar kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub start: usize,
    pub end: usize,
    pub kind: u16,
}

impl NodeKey {
    pub fn of(node: &Node) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
            kind: node.kind_id(),
        }
    }
}

/// Expression types of a single file
#[derive(Debug, Default)]
pub struct FileTypes {
    types: HashMap<NodeKey, GoType>,
}

impl FileTypes {
    pub fn record(&mut self, node: &Node, ty: GoType) {
        self.types.insert(NodeKey::of(node), ty);
    }

    pub fn get(&self, node: &Node) -> Option<&GoType> {
        self.types.get(&NodeKey::of(node))
    }

    /// Descriptor for an expression; unvisited or unknown nodes are unresolved
    pub fn describe(&self, node: &Node) -> TypeDesc {
        self.get(node)
            .map(GoType::describe)
            .unwrap_or(TypeDesc::Unresolved)
    }
}

/// Package-wide declarations plus per-file expression types, read-only
/// once the package has been checked
#[derive(Debug)]
pub struct TypeEnvironment {
    pub registry: PackageRegistry,
    files: Vec<FileTypes>,
}

impl TypeEnvironment {
    /// Types for the file at `index` in the package's file order
    pub fn file(&self, index: usize) -> Option<&FileTypes> {
        self.files.get(index)
    }
}

/// Resolve declarations and expression types for one package
pub fn check_package(
    package_name: &str,
    package_path: &str,
    files: &[SourceFile],
) -> Result<TypeEnvironment> {
    let registry = PackageRegistry::build(package_name, package_path, files)?;
    let files = files
        .iter()
        .map(|file| Checker::new(&registry, file).check_file())
        .collect();
    Ok(TypeEnvironment { registry, files })
}
