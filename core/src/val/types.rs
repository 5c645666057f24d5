//! Process-wide canonicalizing store of type descriptors.
//!
//! Descriptors are registered once and never freed, so a [`Type`] handle is
//! a stable identity: `==` on handles stands in for structural type
//! equality everywhere in the engine. Array types are canonicalized per
//! element type, making `array_type(t)` idempotent.

use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::util::fast_map::FastHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Real,
    Char,
    Boolean,
    Array,
    Object,
}

/// Canonical identity handle into the type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type(u32);

struct Descriptor {
    kind: TypeKind,
    element: Option<Type>,
}

struct Registry {
    descriptors: Vec<Descriptor>,
    /// element type -> canonical array-of-element type
    arrays: FastHashMap<Type, Type>,
}

const REAL: Type = Type(0);
const CHAR: Type = Type(1);
const BOOLEAN: Type = Type(2);
const STRING: Type = Type(3);
const OBJECT: Type = Type(4);

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| {
    let mut registry = Registry {
        descriptors: Vec::new(),
        arrays: FastHashMap::default(),
    };
    for kind in [TypeKind::Real, TypeKind::Char, TypeKind::Boolean] {
        registry.descriptors.push(Descriptor { kind, element: None });
    }
    // A string is the canonical array-of-char.
    registry.descriptors.push(Descriptor {
        kind: TypeKind::Array,
        element: Some(CHAR),
    });
    registry.arrays.insert(CHAR, STRING);
    registry.descriptors.push(Descriptor {
        kind: TypeKind::Object,
        element: None,
    });
    RwLock::new(registry)
});

pub fn real_type() -> Type {
    Lazy::force(&REGISTRY);
    REAL
}

pub fn char_type() -> Type {
    Lazy::force(&REGISTRY);
    CHAR
}

pub fn boolean_type() -> Type {
    Lazy::force(&REGISTRY);
    BOOLEAN
}

pub fn string_type() -> Type {
    Lazy::force(&REGISTRY);
    STRING
}

pub fn object_type() -> Type {
    Lazy::force(&REGISTRY);
    OBJECT
}

/// The canonical array type over `element`.
pub fn array_type(element: Type) -> Type {
    if let Some(t) = REGISTRY
        .read()
        .expect("type registry poisoned")
        .arrays
        .get(&element)
    {
        return *t;
    }
    let mut registry = REGISTRY.write().expect("type registry poisoned");
    // Re-check: another thread may have registered it between the locks.
    if let Some(t) = registry.arrays.get(&element) {
        return *t;
    }
    let id = Type(registry.descriptors.len() as u32);
    registry.descriptors.push(Descriptor {
        kind: TypeKind::Array,
        element: Some(element),
    });
    registry.arrays.insert(element, id);
    id
}

impl Type {
    pub fn kind(self) -> TypeKind {
        REGISTRY.read().expect("type registry poisoned").descriptors[self.0 as usize].kind
    }

    /// Element type of an array descriptor.
    pub fn element(self) -> Option<Type> {
        REGISTRY.read().expect("type registry poisoned").descriptors[self.0 as usize].element
    }

    pub fn is_array(self) -> bool {
        self.kind() == TypeKind::Array
    }
}
