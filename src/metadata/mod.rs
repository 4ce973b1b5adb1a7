//! Owning context for method bodies
//!
//! A method body needs very little from the rest of the metadata: the method it belongs to, that
//! method's declaring type (for the `this` parameter), and the types of its local variables. This
//! module models exactly that much as a graph of arena-allocated definitions, so that bodies can
//! hold plain `&'g` references into it.

use elsa::map::FrozenMap;
use elsa::FrozenVec;
use std::fmt;
use std::fmt::Debug;
use typed_arena::Arena;

mod attributes;
mod token;

pub use attributes::*;
pub use token::*;

pub type TypeId<'g> = &'g TypeData<'g>;
pub type MethodId<'g> = &'g MethodData<'g>;

pub struct TypeGraphArenas<'g> {
    type_arena: Arena<TypeData<'g>>,
    method_arena: Arena<MethodData<'g>>,
}

impl<'g> TypeGraphArenas<'g> {
    pub fn new() -> Self {
        TypeGraphArenas {
            type_arena: Arena::new(),
            method_arena: Arena::new(),
        }
    }
}

impl<'g> Default for TypeGraphArenas<'g> {
    fn default() -> Self {
        TypeGraphArenas::new()
    }
}

/// Types and methods that method bodies can refer to
///
/// Types are registered once and looked up by their full name (`Namespace.Name`).
pub struct TypeGraph<'g> {
    arenas: &'g TypeGraphArenas<'g>,
    types: FrozenMap<String, &'g TypeData<'g>>,
}

impl<'g> TypeGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g TypeGraphArenas<'g>) -> Self {
        TypeGraph {
            arenas,
            types: FrozenMap::new(),
        }
    }

    pub fn lookup_type(&'g self, full_name: &str) -> Option<TypeId<'g>> {
        self.types.get(full_name)
    }

    /// Add a new type to the graph
    ///
    /// If a type with the same full name already exists, that one is returned instead.
    pub fn add_type(&'g self, data: TypeData<'g>) -> TypeId<'g> {
        let full_name = data.full_name();
        if let Some(existing) = self.types.get(full_name.as_str()) {
            return existing;
        }
        let data = &*self.arenas.type_arena.alloc(data);
        self.types.insert(full_name, data);
        data
    }

    /// Add a method to the graph and to its declaring type (if it has one)
    pub fn add_method(&self, method: MethodData<'g>) -> MethodId<'g> {
        let data = &*self.arenas.method_arena.alloc(method);
        if let Some(declaring_type) = data.declaring_type {
            declaring_type.methods.push(data);
        }
        data
    }

    /// Add the handful of core library types that local variables commonly use
    pub fn insert_core_types(&'g self) -> CoreTypes<'g> {
        let object = self.add_type(TypeData::new("System", "Object", None));
        let value_type = self.add_type(TypeData::new("System", "ValueType", Some(object)));
        let primitive = |name: &str| {
            let mut data = TypeData::new("System", name, Some(value_type));
            data.is_value_type = true;
            self.add_type(data)
        };
        CoreTypes {
            object,
            boolean: primitive("Boolean"),
            int32: primitive("Int32"),
            int64: primitive("Int64"),
            double: primitive("Double"),
            string: self.add_type(TypeData::new("System", "String", Some(object))),
            exception: self.add_type(TypeData::new("System", "Exception", Some(object))),
        }
    }
}

/// Core library types registered by [`TypeGraph::insert_core_types`]
#[derive(Copy, Clone)]
pub struct CoreTypes<'g> {
    pub object: TypeId<'g>,
    pub boolean: TypeId<'g>,
    pub int32: TypeId<'g>,
    pub int64: TypeId<'g>,
    pub double: TypeId<'g>,
    pub string: TypeId<'g>,
    pub exception: TypeId<'g>,
}

pub struct TypeData<'g> {
    pub namespace: String,

    pub name: String,

    /// Base type is only missing for `System.Object`, interfaces, and `<Module>`
    pub base_type: Option<TypeId<'g>>,

    /// Value types get their `this` passed by reference
    pub is_value_type: bool,

    /// Token for the type (`TypeDef`, `TypeRef`, or `TypeSpec`), zero if not yet assigned
    pub token: MetadataToken,

    /// Methods declared on the type
    pub methods: FrozenVec<&'g MethodData<'g>>,
}

impl<'g> TypeData<'g> {
    pub fn new(namespace: &str, name: &str, base_type: Option<TypeId<'g>>) -> TypeData<'g> {
        TypeData {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            base_type,
            is_value_type: false,
            token: MetadataToken::ZERO,
            methods: FrozenVec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl<'g> PartialEq for TypeData<'g> {
    fn eq(&self, other: &TypeData<'g>) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl<'g> Eq for TypeData<'g> {}

impl<'g> Debug for TypeData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

pub struct MethodData<'g> {
    /// Type declaring the method
    ///
    /// This is missing for methods that have not been attached to a type yet.
    pub declaring_type: Option<TypeId<'g>>,

    pub name: String,

    pub attributes: MethodAttributes,

    /// `MethodDef` token, zero if not yet assigned
    pub token: MetadataToken,
}

impl<'g> MethodData<'g> {
    pub fn new(
        declaring_type: Option<TypeId<'g>>,
        name: &str,
        attributes: MethodAttributes,
    ) -> MethodData<'g> {
        MethodData {
            declaring_type,
            name: name.to_owned(),
            attributes,
            token: MetadataToken::ZERO,
        }
    }
}

impl<'g> Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.declaring_type {
            Some(declaring_type) => write!(f, "{:?}::{}", declaring_type, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A method parameter
#[derive(Clone, PartialEq, Eq)]
pub struct ParameterData<'g> {
    pub name: String,

    /// Position in the argument list (`this` is 0 for instance methods)
    pub sequence: u16,

    pub attributes: ParameterAttributes,

    pub parameter_type: TypeId<'g>,

    /// Is the parameter passed as a managed pointer to `parameter_type`?
    pub is_by_ref: bool,
}

impl<'g> Debug for ParameterData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}{} {}",
            self.parameter_type,
            if self.is_by_ref { "&" } else { "" },
            self.name
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn types_are_interned_by_full_name() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();

        let again = graph.add_type(TypeData::new("System", "Int32", None));
        assert!(std::ptr::eq(again, core.int32));
        assert!(core.int32.is_value_type);
        assert!(!core.string.is_value_type);
        assert_eq!(graph.lookup_type("System.String"), Some(core.string));
        assert_eq!(graph.lookup_type("System.Missing"), None);
    }

    #[test]
    fn methods_attach_to_declaring_type() {
        let arenas = TypeGraphArenas::new();
        let graph = TypeGraph::new(&arenas);
        let core = graph.insert_core_types();
        let point = graph.add_type(TypeData::new("Geometry", "Point", Some(core.object)));

        let method = graph.add_method(MethodData::new(
            Some(point),
            "Length",
            MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
        ));
        let orphan = graph.add_method(MethodData::new(None, "Orphan", MethodAttributes::STATIC));

        assert_eq!(point.methods.len(), 1);
        assert!(std::ptr::eq(&point.methods[0], method));
        assert_eq!(format!("{:?}", method), "Geometry.Point::Length");
        assert_eq!(format!("{:?}", orphan), "Orphan");
    }
}
