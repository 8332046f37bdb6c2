//! Decoding: flat query items back into record fields.
//!
//! The layers mirror the encode side:
//!
//! - [`MapDeserializer`] hands the top-level record a view of the map.
//! - [`FieldAccess`] walks the record's declared field list (the list serde
//!   derive generates), asking the map for each field by its own snake_case
//!   key. Keys not named by any field are simply never looked at.
//! - [`FieldDeserializer`] parses one present value as the target primitive,
//!   splits it as a sequence, or recurses into a nested record against the
//!   same shared map.
//! - [`ElementDeserializer`] parses one comma-separated sequence element.

use serde::de::{
    DeserializeSeed, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use serde::forward_to_deserialize_any;

use super::{parse_yes_no, split_elements, QueryError, QueryMap};
use crate::case::snake_case;

/// Entry point: only a record (or `Nothing`) can decode from a query map.
pub(super) struct MapDeserializer<'a> {
    pub map: &'a QueryMap,
    pub path: Vec<String>,
}

impl<'de, 'a: 'de> Deserializer<'de> for MapDeserializer<'a> {
    type Error = QueryError;

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_map(FieldAccess {
            map: self.map,
            fields: fields.iter(),
            current: None,
            path: self.path,
        })
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported(
            "anything but a record at the top level",
        ))
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit seq tuple tuple_struct map enum identifier
        ignored_any
    }
}

/// Feeds a record's declared fields one by one.
struct FieldAccess<'a> {
    map: &'a QueryMap,
    fields: std::slice::Iter<'static, &'static str>,
    current: Option<&'static str>,
    path: Vec<String>,
}

impl<'de, 'a: 'de> MapAccess<'de> for FieldAccess<'a> {
    type Error = QueryError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, QueryError> {
        match self.fields.next() {
            Some(&field) => {
                self.current = Some(field);
                seed.deserialize(field.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, QueryError> {
        let field = self
            .current
            .take()
            .ok_or_else(|| QueryError::Message("value requested before key".into()))?;
        seed.deserialize(FieldDeserializer {
            map: self.map,
            field,
            key: snake_case(field),
            path: &self.path,
        })
    }
}

/// Decodes one field by its key in the shared map.
///
/// The path borrow is independent of the map borrow: it only feeds error
/// messages and never outlives the call.
struct FieldDeserializer<'a, 'p> {
    map: &'a QueryMap,
    field: &'static str,
    key: String,
    path: &'p [String],
}

impl<'a, 'p> FieldDeserializer<'a, 'p> {
    /// The raw string value, or `KeyNotFound` carrying the dotted path of
    /// enclosing field names down to this one.
    fn raw(&self) -> Result<&'a str, QueryError> {
        self.map
            .get(&self.key)
            .map(String::as_str)
            .ok_or_else(|| QueryError::KeyNotFound {
                field: self.field.into(),
                path: dotted(self.path, self.field),
            })
    }

    fn mismatch(&self, value: &str, expected: &'static str) -> QueryError {
        QueryError::TypeMismatch {
            field: self.field.into(),
            value: value.into(),
            expected,
        }
    }
}

fn dotted(path: &[String], field: &str) -> String {
    let mut out = path.join(".");
    if !out.is_empty() {
        out.push('.');
    }
    out.push_str(field);
    out
}

macro_rules! parse_number {
    ($($method:ident: $ty:ty => $visit:ident, $expected:literal;)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
            let raw = self.raw()?;
            let parsed: $ty = raw.parse().map_err(|_| self.mismatch(raw, $expected))?;
            visitor.$visit(parsed)
        }
    )*};
}

impl<'de, 'a: 'de, 'p> Deserializer<'de> for FieldDeserializer<'a, 'p> {
    type Error = QueryError;

    parse_number! {
        deserialize_i8: i8 => visit_i8, "i8";
        deserialize_i16: i16 => visit_i16, "i16";
        deserialize_i32: i32 => visit_i32, "i32";
        deserialize_i64: i64 => visit_i64, "i64";
        deserialize_i128: i128 => visit_i128, "i128";
        deserialize_u8: u8 => visit_u8, "u8";
        deserialize_u16: u16 => visit_u16, "u16";
        deserialize_u32: u32 => visit_u32, "u32";
        deserialize_u64: u64 => visit_u64, "u64";
        deserialize_u128: u128 => visit_u128, "u128";
        deserialize_f32: f32 => visit_f32, "f32";
        deserialize_f64: f64 => visit_f64, "f64";
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        let raw = self.raw()?;
        let value = parse_yes_no(raw).ok_or_else(|| self.mismatch(raw, "bool (\"yes\"/\"no\")"))?;
        visitor.visit_bool(value)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        let raw = self.raw()?;
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.mismatch(raw, "a single character")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_str(self.raw()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        self.deserialize_str(visitor)
    }

    // Absence of the key is absence of the value, never an error.
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        if self.map.contains_key(&self.key) {
            visitor.visit_some(self)
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        let items = split_elements(self.raw()?);
        visitor.visit_seq(ElementAccess {
            items,
            index: 0,
            field: self.field,
        })
    }

    // A nested record reads from the same shared map; only the error path
    // remembers how deep we are.
    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        let mut path = self.path.to_vec();
        path.push(self.field.into());
        visitor.visit_map(FieldAccess {
            map: self.map,
            fields: fields.iter(),
            current: None,
            path,
        })
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_enum(self.raw()?.into_deserializer())
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("an identifier"))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_unit()
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported(
            "a value whose type cannot be inferred",
        ))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("raw bytes"))
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("raw bytes"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("a tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("a tuple struct"))
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("a map"))
    }
}

/// Cursor over the elements of one comma-joined sequence value.
struct ElementAccess<'a> {
    items: Vec<&'a str>,
    index: usize,
    field: &'static str,
}

impl<'de, 'a: 'de> SeqAccess<'de> for ElementAccess<'a> {
    type Error = QueryError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, QueryError> {
        let Some(&item) = self.items.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;
        seed.deserialize(ElementDeserializer {
            item,
            field: self.field,
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len() - self.index)
    }
}

/// Decodes one sequence element from its string form.
struct ElementDeserializer<'a> {
    item: &'a str,
    field: &'static str,
}

impl<'a> ElementDeserializer<'a> {
    fn mismatch(&self, expected: &'static str) -> QueryError {
        QueryError::TypeMismatch {
            field: self.field.into(),
            value: self.item.into(),
            expected,
        }
    }
}

macro_rules! parse_element {
    ($($method:ident: $ty:ty => $visit:ident, $expected:literal;)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
            let parsed: $ty = self.item.parse().map_err(|_| self.mismatch($expected))?;
            visitor.$visit(parsed)
        }
    )*};
}

impl<'de, 'a: 'de> Deserializer<'de> for ElementDeserializer<'a> {
    type Error = QueryError;

    parse_element! {
        deserialize_i8: i8 => visit_i8, "i8";
        deserialize_i16: i16 => visit_i16, "i16";
        deserialize_i32: i32 => visit_i32, "i32";
        deserialize_i64: i64 => visit_i64, "i64";
        deserialize_i128: i128 => visit_i128, "i128";
        deserialize_u8: u8 => visit_u8, "u8";
        deserialize_u16: u16 => visit_u16, "u16";
        deserialize_u32: u32 => visit_u32, "u32";
        deserialize_u64: u64 => visit_u64, "u64";
        deserialize_u128: u128 => visit_u128, "u128";
        deserialize_f32: f32 => visit_f32, "f32";
        deserialize_f64: f64 => visit_f64, "f64";
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        let value =
            parse_yes_no(self.item).ok_or_else(|| self.mismatch("bool (\"yes\"/\"no\")"))?;
        visitor.visit_bool(value)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        let mut chars = self.item.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(self.mismatch("a single character")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_str(self.item)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        self.deserialize_str(visitor)
    }

    // Elements are present by construction.
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_some(self)
    }

    // A nested sequence re-splits this single cursor item. Commas do not
    // nest, so anything deeper than one level has already flattened.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_seq(ElementAccess {
            items: split_elements(self.item),
            index: 0,
            field: self.field,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_enum(self.item.into_deserializer())
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, QueryError> {
        visitor.visit_unit()
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, QueryError> {
        visitor.visit_unit()
    }

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported(
            "a value whose type cannot be inferred",
        ))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("raw bytes"))
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("raw bytes"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("a tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("a tuple struct"))
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("a map"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("a record inside a sequence"))
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, QueryError> {
        Err(QueryError::Unsupported("an identifier"))
    }
}
