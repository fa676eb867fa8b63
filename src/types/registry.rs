//! Package-level declarations shared by every file of a package

use super::external::is_basic_type;
use super::{Checker, GoType, NamedType, Signature};
use crate::errors::{Error, Result};
use crate::loader::imports::import_bindings;
use crate::loader::parser::{field_children, named_children, node_text};
use crate::loader::SourceFile;
use std::collections::HashMap;
use tree_sitter::Node;

/// A field of a locally declared struct
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: GoType,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclKind {
    Struct(Vec<FieldDecl>),
    /// `type A = B`
    Alias(GoType),
    /// Any other defined type, keeping its underlying type
    Defined(GoType),
}

/// Resolves type expressions of one file against its imports
pub struct TypeResolver<'a> {
    pub package_path: &'a str,
    pub imports: &'a HashMap<String, String>,
    pub source: &'a str,
}

impl<'a> TypeResolver<'a> {
    pub fn resolve(&self, node: &Node) -> GoType {
        match node.kind() {
            "type_identifier" | "identifier" => {
                let name = node_text(node, self.source);
                if is_basic_type(name) {
                    GoType::Basic(name.to_string())
                } else {
                    GoType::named(self.package_path, name)
                }
            }
            "qualified_type" => {
                let (Some(pkg), Some(name)) = (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) else {
                    return GoType::Unknown;
                };
                match self.imports.get(node_text(&pkg, self.source)) {
                    Some(path) => GoType::named(path.as_str(), node_text(&name, self.source)),
                    None => GoType::Unknown,
                }
            }
            "pointer_type" => match named_children(node).first() {
                Some(inner) => GoType::pointer_to(self.resolve(inner)),
                None => GoType::Unknown,
            },
            "slice_type" | "array_type" | "implicit_length_array_type" => node
                .child_by_field_name("element")
                .map(|e| GoType::Slice(Box::new(self.resolve(&e))))
                .unwrap_or_default(),
            "map_type" => match (
                node.child_by_field_name("key"),
                node.child_by_field_name("value"),
            ) {
                (Some(k), Some(v)) => {
                    GoType::Map(Box::new(self.resolve(&k)), Box::new(self.resolve(&v)))
                }
                _ => GoType::Unknown,
            },
            "generic_type" => node
                .child_by_field_name("type")
                .map(|t| self.resolve(&t))
                .unwrap_or_default(),
            "parenthesized_type" => named_children(node)
                .first()
                .map(|t| self.resolve(t))
                .unwrap_or_default(),
            "function_type" => GoType::Func(Box::new(self.signature(node))),
            _ => GoType::Unknown,
        }
    }

    /// Parameter and result types of a function declaration, literal or type
    pub fn signature(&self, func: &Node) -> Signature {
        let params = func
            .child_by_field_name("parameters")
            .map(|p| self.parameter_types(&p))
            .unwrap_or_default();
        let results = match func.child_by_field_name("result") {
            Some(result) if result.kind() == "parameter_list" => self.parameter_types(&result),
            Some(result) => vec![self.resolve(&result)],
            None => Vec::new(),
        };
        Signature { params, results }
    }

    /// One type per declared parameter, repeating shared types (`a, b int`)
    pub fn parameter_types(&self, list: &Node) -> Vec<GoType> {
        let mut types = Vec::new();
        for param in named_children(list) {
            let Some(type_node) = param.child_by_field_name("type") else {
                continue;
            };
            let mut ty = self.resolve(&type_node);
            if param.kind() == "variadic_parameter_declaration" {
                ty = GoType::Slice(Box::new(ty));
            }
            let count = field_children(&param, "name").len().max(1);
            types.extend(std::iter::repeat(ty).take(count));
        }
        types
    }
}

/// Declarations collected across all files of a package
#[derive(Debug, Default)]
pub struct PackageRegistry {
    pub package_name: String,
    pub package_path: String,
    types: HashMap<String, TypeDeclKind>,
    funcs: HashMap<String, Signature>,
    methods: HashMap<(String, String), Signature>,
    vars: HashMap<String, GoType>,
}

impl PackageRegistry {
    /// Collect declarations from every file.
    ///
    /// Fails when the package redeclares a function or method, which the
    /// Go type checker would reject as well.
    pub fn build(package_name: &str, package_path: &str, files: &[SourceFile]) -> Result<Self> {
        let mut registry = Self {
            package_name: package_name.to_string(),
            package_path: package_path.to_string(),
            ..Self::default()
        };

        let mut untyped_vars = Vec::new();
        for (index, file) in files.iter().enumerate() {
            let imports = import_bindings(file);
            let resolver = TypeResolver {
                package_path,
                imports: &imports,
                source: &file.source,
            };
            for decl in named_children(&file.root()) {
                match decl.kind() {
                    "type_declaration" => registry.register_types(&decl, &resolver),
                    "function_declaration" => registry.register_function(&decl, file, &resolver)?,
                    "method_declaration" => registry.register_method(&decl, file, &resolver)?,
                    "var_declaration" => {
                        for spec in var_specs(&decl) {
                            match spec.child_by_field_name("type") {
                                Some(type_node) => {
                                    let ty = resolver.resolve(&type_node);
                                    for name in field_children(&spec, "name") {
                                        registry.insert_var(file.text(&name), ty.clone());
                                    }
                                }
                                None => untyped_vars.push((index, spec)),
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        // Initializers may mention each other; two rounds cover the usual
        // "declared after use" ordering without a dependency graph.
        for _ in 0..2 {
            let mut resolved = Vec::new();
            for (index, spec) in &untyped_vars {
                let file = &files[*index];
                let types = Checker::new(&registry, file).value_types(spec);
                for (name, ty) in field_children(spec, "name").iter().zip(types) {
                    if !ty.is_unknown() {
                        resolved.push((file.text(name).to_string(), ty));
                    }
                }
            }
            for (name, ty) in resolved {
                registry.insert_var(&name, ty);
            }
        }

        log::debug!(
            "package {} ({}): {} types, {} functions, {} methods, {} variables",
            registry.package_name,
            registry.package_path,
            registry.types.len(),
            registry.funcs.len(),
            registry.methods.len(),
            registry.vars.len()
        );
        Ok(registry)
    }

    fn insert_var(&mut self, name: &str, ty: GoType) {
        if name != "_" {
            self.vars.insert(name.to_string(), ty);
        }
    }

    fn register_types(&mut self, decl: &Node, resolver: &TypeResolver) {
        let mut specs = Vec::new();
        collect_kinds(decl, &["type_spec", "type_alias"], &mut specs);
        for spec in specs {
            let (Some(name), Some(type_node)) = (
                spec.child_by_field_name("name"),
                spec.child_by_field_name("type"),
            ) else {
                continue;
            };
            let name = node_text(&name, resolver.source).to_string();
            let kind = if spec.kind() == "type_alias" {
                TypeDeclKind::Alias(resolver.resolve(&type_node))
            } else if type_node.kind() == "struct_type" {
                TypeDeclKind::Struct(struct_fields(&type_node, resolver))
            } else {
                TypeDeclKind::Defined(resolver.resolve(&type_node))
            };
            self.types.insert(name, kind);
        }
    }

    fn register_function(
        &mut self,
        decl: &Node,
        file: &SourceFile,
        resolver: &TypeResolver,
    ) -> Result<()> {
        let Some(name) = decl.child_by_field_name("name") else {
            return Ok(());
        };
        let name = file.text(&name).to_string();
        let signature = resolver.signature(decl);
        if name == "init" || name == "_" {
            return Ok(());
        }
        if self.funcs.insert(name.clone(), signature).is_some() {
            return Err(Error::type_check(
                &self.package_name,
                format!("function {} redeclared in {}", name, file.file_name()),
            ));
        }
        Ok(())
    }

    fn register_method(
        &mut self,
        decl: &Node,
        file: &SourceFile,
        resolver: &TypeResolver,
    ) -> Result<()> {
        let (Some(receiver), Some(name)) = (
            decl.child_by_field_name("receiver"),
            decl.child_by_field_name("name"),
        ) else {
            return Ok(());
        };
        let Some(base) = receiver_base_name(&receiver, &file.source) else {
            return Ok(());
        };
        let name = file.text(&name).to_string();
        if name == "_" {
            return Ok(());
        }
        let key = (base.clone(), name.clone());
        if self.methods.insert(key, resolver.signature(decl)).is_some() {
            return Err(Error::type_check(
                &self.package_name,
                format!("method {}.{} redeclared in {}", base, name, file.file_name()),
            ));
        }
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&Signature> {
        self.funcs.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&GoType> {
        self.vars.get(name)
    }

    pub fn declares_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn method(&self, type_name: &str, method: &str) -> Option<&Signature> {
        self.methods.get(&(type_name.to_string(), method.to_string()))
    }

    pub fn type_decl(&self, name: &str) -> Option<&TypeDeclKind> {
        self.types.get(name)
    }

    fn is_local(&self, named: &NamedType) -> bool {
        named.package == self.package_path
    }

    /// Replace local aliases by their targets, through pointers
    pub fn normalize(&self, ty: GoType) -> GoType {
        self.normalize_at_depth(ty, 0)
    }

    fn normalize_at_depth(&self, ty: GoType, depth: usize) -> GoType {
        const MAX_ALIAS_DEPTH: usize = 8;
        if depth > MAX_ALIAS_DEPTH {
            return ty;
        }
        match ty {
            GoType::Named(named) if self.is_local(&named) => match self.types.get(&named.name) {
                Some(TypeDeclKind::Alias(target)) => {
                    self.normalize_at_depth(target.clone(), depth + 1)
                }
                _ => GoType::Named(named),
            },
            GoType::Pointer(inner) => {
                GoType::pointer_to(self.normalize_at_depth(*inner, depth + 1))
            }
            other => other,
        }
    }

    /// Field or method `member` of a value of type `ty`, with auto-deref
    /// and promotion through embedded fields
    pub fn member(&self, ty: &GoType, member: &str) -> GoType {
        self.member_at_depth(ty, member, 0)
    }

    fn member_at_depth(&self, ty: &GoType, member: &str, depth: usize) -> GoType {
        const MAX_EMBED_DEPTH: usize = 4;
        let base = self.normalize(ty.clone());
        let GoType::Named(named) = base.deref() else {
            return GoType::Unknown;
        };
        if !self.is_local(named) {
            return super::external::type_member(named, member);
        }

        if let Some(sig) = self.method(&named.name, member) {
            return GoType::Func(Box::new(sig.clone()));
        }

        let fields = match self.types.get(&named.name) {
            Some(TypeDeclKind::Struct(fields)) => fields,
            // Defined types reuse the fields of their underlying type
            Some(TypeDeclKind::Defined(underlying)) if depth < MAX_EMBED_DEPTH => {
                return self.member_at_depth(underlying, member, depth + 1);
            }
            _ => return GoType::Unknown,
        };

        if let Some(field) = fields.iter().find(|f| f.name == member) {
            return self.normalize(field.ty.clone());
        }
        if depth < MAX_EMBED_DEPTH {
            for field in fields.iter().filter(|f| f.embedded) {
                let promoted = self.member_at_depth(&field.ty, member, depth + 1);
                if !promoted.is_unknown() {
                    return promoted;
                }
            }
        }
        GoType::Unknown
    }
}

fn collect_kinds<'t>(node: &Node<'t>, kinds: &[&str], out: &mut Vec<Node<'t>>) {
    for child in named_children(node) {
        if kinds.contains(&child.kind()) {
            out.push(child);
        } else {
            collect_kinds(&child, kinds, out);
        }
    }
}

/// `var_spec` nodes of a declaration, looking through grouping nodes
pub fn var_specs<'t>(decl: &Node<'t>) -> Vec<Node<'t>> {
    let mut specs = Vec::new();
    collect_kinds(decl, &["var_spec"], &mut specs);
    specs
}

fn struct_fields(struct_type: &Node, resolver: &TypeResolver) -> Vec<FieldDecl> {
    let mut fields = Vec::new();
    let mut decls = Vec::new();
    collect_kinds(struct_type, &["field_declaration"], &mut decls);
    for decl in decls {
        let Some(type_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let names = field_children(&decl, "name");
        let mut ty = resolver.resolve(&type_node);
        if names.is_empty() {
            // Embedded field: `*T` carries the star as a separate token
            if node_text(&decl, resolver.source).trim_start().starts_with('*') {
                ty = GoType::pointer_to(ty);
            }
            let field_name = match ty.deref() {
                GoType::Named(named) => named.name.clone(),
                _ => continue,
            };
            fields.push(FieldDecl {
                name: field_name,
                ty,
                embedded: true,
            });
        } else {
            for name in names {
                fields.push(FieldDecl {
                    name: node_text(&name, resolver.source).to_string(),
                    ty: ty.clone(),
                    embedded: false,
                });
            }
        }
    }
    fields
}

/// Base type name of a method receiver: `(s *Store)` and `(s Store[T])` give `Store`
pub fn receiver_base_name(receiver: &Node, source: &str) -> Option<String> {
    let param = named_children(receiver).into_iter().next()?;
    let mut ty = param.child_by_field_name("type")?;
    loop {
        match ty.kind() {
            "pointer_type" | "parenthesized_type" => ty = named_children(&ty).into_iter().next()?,
            "generic_type" => ty = ty.child_by_field_name("type")?,
            "type_identifier" => return Some(node_text(&ty, source).to_string()),
            _ => return None,
        }
    }
}
