//! Copy-on-write dynamic values.
//!
//! A [`Val`] is a handle to an optional reference-counted cell; "no value"
//! is a distinct, valid state. Cloning a handle shares the cell. Every
//! mutation path funnels through one make-unique step (`Rc::make_mut`), so
//! a cell observed through more than one handle is copied before it is
//! written: arrays copy at the owning cell while their elements remain
//! shared handles.

use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::util::fast_map::FastHashMap;

pub mod types;

pub use types::{Type, TypeKind};


#[derive(Clone, Default)]
pub struct Val(Option<Rc<Body>>);

#[derive(Clone)]
struct Body {
    ty: Type,
    data: Data,
}

#[derive(Clone, PartialEq)]
enum Data {
    Real(f64),
    Char(char),
    Boolean(bool),
    Array(Vec<Val>),
    Object(FastHashMap<String, Val>),
}

impl Val {
    pub fn real(v: f64) -> Val {
        Val(Some(Rc::new(Body {
            ty: types::real_type(),
            data: Data::Real(v),
        })))
    }

    pub fn character(c: char) -> Val {
        Val(Some(Rc::new(Body {
            ty: types::char_type(),
            data: Data::Char(c),
        })))
    }

    pub fn boolean(b: bool) -> Val {
        Val(Some(Rc::new(Body {
            ty: types::boolean_type(),
            data: Data::Boolean(b),
        })))
    }

    /// A string value: an array of characters with the canonical string type.
    pub fn string(s: &str) -> Val {
        Val(Some(Rc::new(Body {
            ty: types::string_type(),
            data: Data::Array(s.chars().map(Val::character).collect()),
        })))
    }

    /// An empty array carrying an existing array type.
    pub fn empty_array(ty: Type) -> Val {
        Val(Some(Rc::new(Body {
            ty,
            data: Data::Array(Vec::new()),
        })))
    }

    pub fn object() -> Val {
        Val(Some(Rc::new(Body {
            ty: types::object_type(),
            data: Data::Object(FastHashMap::default()),
        })))
    }

    pub fn has_data(&self) -> bool {
        self.0.is_some()
    }

    pub fn ty(&self) -> Option<Type> {
        self.0.as_ref().map(|b| b.ty)
    }

    pub fn kind(&self) -> Option<TypeKind> {
        self.ty().map(Type::kind)
    }

    fn make_unique(&mut self) -> Option<&mut Body> {
        self.0.as_mut().map(Rc::make_mut)
    }

    // Conversions. These follow the engine's coercion table; a handle with
    // no data converts to the neutral element of each target.

    pub fn as_real(&self) -> f64 {
        let Some(body) = self.0.as_deref() else {
            return 0.0;
        };
        match &body.data {
            Data::Real(v) => *v,
            Data::Char(c) => *c as u32 as f64,
            Data::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Data::Array(_) => {
                if body.ty.element() == Some(types::char_type()) {
                    parse_real_prefix(&self.as_string())
                } else {
                    0.0
                }
            }
            Data::Object(_) => 0.0,
        }
    }

    pub fn as_char(&self) -> char {
        let Some(body) = self.0.as_deref() else {
            return '\0';
        };
        match &body.data {
            Data::Real(v) => char::from_u32(*v as u32).unwrap_or('\0'),
            Data::Char(c) => *c,
            Data::Boolean(b) => {
                if *b {
                    '1'
                } else {
                    '0'
                }
            }
            Data::Array(_) | Data::Object(_) => '\0',
        }
    }

    pub fn as_boolean(&self) -> bool {
        let Some(body) = self.0.as_deref() else {
            return false;
        };
        match &body.data {
            Data::Real(v) => *v != 0.0,
            Data::Char(c) => *c != '\0',
            Data::Boolean(b) => *b,
            Data::Array(items) => !items.is_empty(),
            Data::Object(_) => true,
        }
    }

    pub fn as_string(&self) -> String {
        let Some(body) = self.0.as_deref() else {
            return "(VOID)".to_string();
        };
        match &body.data {
            Data::Real(v) => format_real(*v),
            Data::Char(c) => c.to_string(),
            Data::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Data::Array(items) => {
                if body.ty.element() == Some(types::char_type()) {
                    items.iter().map(Val::as_char).collect()
                } else {
                    let mut out = String::from("[");
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        out.push_str(&item.as_string());
                    }
                    out.push(']');
                    out
                }
            }
            Data::Object(_) => "(OBJECT)".to_string(),
        }
    }

    // In-place writes. Each one makes the cell unique first.

    pub fn set_real(&mut self, v: f64) {
        match self.make_unique() {
            Some(body) => {
                body.ty = types::real_type();
                body.data = Data::Real(v);
            }
            None => *self = Val::real(v),
        }
    }

    pub fn set_boolean(&mut self, b: bool) {
        match self.make_unique() {
            Some(body) => {
                body.ty = types::boolean_type();
                body.data = Data::Boolean(b);
            }
            None => *self = Val::boolean(b),
        }
    }

    // Array access.

    pub fn length_as_array(&self) -> usize {
        match self.0.as_deref() {
            Some(Body {
                data: Data::Array(items),
                ..
            }) => items.len(),
            _ => 0,
        }
    }

    /// Clone the element handle at `i`. Bounds are the caller's contract.
    pub fn index_as_array(&self, i: usize) -> Val {
        match self.0.as_deref() {
            Some(Body {
                data: Data::Array(items),
                ..
            }) => items.get(i).cloned().unwrap_or_default(),
            _ => Val::default(),
        }
    }

    /// Push `item` and retag the cell with `array_ty` (the canonical array
    /// type of the element being appended).
    pub fn append(&mut self, array_ty: Type, item: Val) {
        match self.make_unique() {
            Some(body) => {
                body.ty = array_ty;
                if let Data::Array(items) = &mut body.data {
                    items.push(item);
                } else {
                    body.data = Data::Array(vec![item]);
                }
            }
            None => {
                self.0 = Some(Rc::new(Body {
                    ty: array_ty,
                    data: Data::Array(vec![item]),
                }));
            }
        }
    }

    /// Extend with the elements of `other`; an empty receiver adopts the
    /// other side's type. Both sides must already be arrays.
    pub fn concatenate(&mut self, other: &Val) {
        let Some(other_body) = other.0.as_deref() else {
            return;
        };
        let Data::Array(tail) = &other_body.data else {
            return;
        };
        let tail: Vec<Val> = tail.clone();
        let other_ty = other_body.ty;
        match self.make_unique() {
            Some(body) => {
                if let Data::Array(items) = &mut body.data {
                    if items.is_empty() {
                        body.ty = other_ty;
                    }
                    items.extend(tail);
                }
            }
            None => {
                self.0 = Some(Rc::new(Body {
                    ty: other_ty,
                    data: Data::Array(tail),
                }));
            }
        }
    }

    /// Replace the element handle at `i`, copying the owning cell first if
    /// it is shared. Bounds are the caller's contract.
    pub fn set_index(&mut self, i: usize, item: Val) {
        if let Some(Body {
            data: Data::Array(items),
            ..
        }) = self.make_unique()
        {
            if let Some(slot) = items.get_mut(i) {
                *slot = item;
            }
        }
    }

    // Object properties.

    /// Add a new named property; fails if the name is taken or the value is
    /// not an object.
    pub fn register_property(&mut self, name: &str, value: Val) -> bool {
        if let Some(Body {
            data: Data::Object(map),
            ..
        }) = self.make_unique()
        {
            if map.contains_key(name) {
                return false;
            }
            map.insert(name.to_string(), value);
            return true;
        }
        false
    }

    /// Look up a property; a missing name yields "no value".
    pub fn get_property(&self, name: &str) -> Val {
        match self.0.as_deref() {
            Some(Body {
                data: Data::Object(map),
                ..
            }) => map.get(name).cloned().unwrap_or_default(),
            _ => Val::default(),
        }
    }

    /// Overwrite an existing property of the same type.
    pub fn set_property(&mut self, name: &str, value: Val) -> bool {
        if !value.has_data() {
            return false;
        }
        if let Some(Body {
            data: Data::Object(map),
            ..
        }) = self.make_unique()
        {
            if let Some(slot) = map.get_mut(name) {
                if slot.ty() == value.ty() {
                    *slot = value;
                    return true;
                }
            }
        }
        false
    }
}

/// Integer-looking reals print without a fraction; the rest go through ryu.
fn format_real(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    if v.fract() == 0.0 && v.abs() < 9.2e18 {
        let mut buf = itoa::Buffer::new();
        buf.format(v as i64).to_string()
    } else {
        let mut buf = ryu::Buffer::new();
        buf.format(v).to_string()
    }
}

/// Leading numeric prefix of a string, the way C's `atof` reads it.
fn parse_real_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    t[..end].parse().unwrap_or(0.0)
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self.0.as_deref(), other.0.as_deref()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ty == b.ty && a.data == b.data,
            _ => false,
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Val({})", self.as_string())
    }
}

impl Serialize for Val {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(body) = self.0.as_deref() else {
            return serializer.serialize_unit();
        };
        match &body.data {
            Data::Real(v) => serializer.serialize_f64(*v),
            Data::Char(c) => serializer.serialize_char(*c),
            Data::Boolean(b) => serializer.serialize_bool(*b),
            Data::Array(items) => {
                if body.ty.element() == Some(types::char_type()) {
                    serializer.serialize_str(&self.as_string())
                } else {
                    let mut seq = serializer.serialize_seq(Some(items.len()))?;
                    for item in items {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                }
            }
            Data::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}
