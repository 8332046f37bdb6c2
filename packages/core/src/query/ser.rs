//! Encoding: record fields to flat query items.
//!
//! Three layers, one per position in the value tree:
//!
//! - [`MapSerializer`] accepts the top-level record and walks its fields.
//! - [`FieldSerializer`] turns one field value into zero or one map entry
//!   (zero for `None`; nested records spill their own fields instead).
//! - [`ElementSerializer`] renders one sequence element to a string, or
//!   drops it when the element is `None`.

use serde::ser::{Impossible, Serialize, SerializeSeq, SerializeStruct, Serializer};

use super::{QueryError, QueryMap};
use crate::case::snake_case;

const BARE: &str = "a bare value at the top level";

/// Walks the fields of the top-level record into the shared map.
pub(super) struct MapSerializer<'a> {
    pub map: &'a mut QueryMap,
}

impl<'a> Serializer for MapSerializer<'a> {
    type Ok = ();
    type Error = QueryError;

    type SerializeStruct = StructWriter<'a>;
    type SerializeSeq = Impossible<(), QueryError>;
    type SerializeTuple = Impossible<(), QueryError>;
    type SerializeTupleStruct = Impossible<(), QueryError>;
    type SerializeTupleVariant = Impossible<(), QueryError>;
    type SerializeMap = Impossible<(), QueryError>;
    type SerializeStructVariant = Impossible<(), QueryError>;

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, QueryError> {
        Ok(StructWriter { map: self.map })
    }

    // `Nothing` and friends: a record with no fields at all.
    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), QueryError> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_bool(self, _: bool) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_i8(self, _: i8) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_i16(self, _: i16) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_i32(self, _: i32) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_i64(self, _: i64) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_i128(self, _: i128) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_u8(self, _: u8) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_u16(self, _: u16) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_u32(self, _: u32) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_u64(self, _: u64) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_u128(self, _: u128) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_f32(self, _: f32) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_f64(self, _: f64) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_char(self, _: char) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_str(self, _: &str) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_none(self) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_some<T: Serialize + ?Sized>(self, _: &T) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_unit(self) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<(), QueryError> {
        Err(QueryError::Unsupported(BARE))
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<(), QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, QueryError> {
        Err(QueryError::Unsupported("a bare sequence at the top level"))
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, QueryError> {
        Err(QueryError::Unsupported("a tuple"))
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, QueryError> {
        Err(QueryError::Unsupported("a tuple struct"))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, QueryError> {
        Err(QueryError::Unsupported("a map"))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
}

/// `SerializeStruct` sink shared by the top level and every nested record:
/// all of them write into the same flat map.
pub(super) struct StructWriter<'a> {
    map: &'a mut QueryMap,
}

impl SerializeStruct for StructWriter<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        value.serialize(FieldSerializer {
            map: self.map,
            key: snake_case(key),
        })
    }

    fn end(self) -> Result<(), QueryError> {
        Ok(())
    }
}

/// Serializes one field value under a fixed key.
struct FieldSerializer<'a> {
    map: &'a mut QueryMap,
    key: String,
}

impl<'a> FieldSerializer<'a> {
    fn put(self, value: String) -> Result<(), QueryError> {
        self.map.insert(self.key, value);
        Ok(())
    }
}

macro_rules! put_display {
    ($($method:ident: $ty:ty,)*) => {$(
        fn $method(self, v: $ty) -> Result<(), QueryError> {
            self.put(v.to_string())
        }
    )*};
}

impl<'a> Serializer for FieldSerializer<'a> {
    type Ok = ();
    type Error = QueryError;

    type SerializeSeq = SeqJoiner<'a>;
    // A nested record spills its fields into the shared map; the enclosing
    // field key is dropped, which is what makes the namespace flat.
    type SerializeStruct = StructWriter<'a>;
    type SerializeTuple = Impossible<(), QueryError>;
    type SerializeTupleStruct = Impossible<(), QueryError>;
    type SerializeTupleVariant = Impossible<(), QueryError>;
    type SerializeMap = Impossible<(), QueryError>;
    type SerializeStructVariant = Impossible<(), QueryError>;

    put_display! {
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_char: char,
    }

    fn serialize_bool(self, v: bool) -> Result<(), QueryError> {
        self.put(if v { "yes" } else { "no" }.into())
    }

    fn serialize_str(self, v: &str) -> Result<(), QueryError> {
        self.put(v.into())
    }

    // `None`: the key is omitted entirely, not emitted as an empty string.
    fn serialize_none(self) -> Result<(), QueryError> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), QueryError> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), QueryError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<(), QueryError> {
        self.put(variant.into())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, QueryError> {
        Ok(SeqJoiner {
            map: self.map,
            key: self.key,
            parts: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, QueryError> {
        Ok(StructWriter { map: self.map })
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<(), QueryError> {
        Err(QueryError::Unsupported("raw bytes"))
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<(), QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, QueryError> {
        Err(QueryError::Unsupported("a tuple"))
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, QueryError> {
        Err(QueryError::Unsupported("a tuple struct"))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, QueryError> {
        Err(QueryError::Unsupported("a map"))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
}

/// Collects rendered sequence elements, then joins them with `,` into the
/// field's single map entry. An empty sequence becomes an empty value (the
/// key stays present, so it decodes back to an empty sequence).
pub(super) struct SeqJoiner<'a> {
    map: &'a mut QueryMap,
    key: String,
    parts: Vec<String>,
}

impl SerializeSeq for SeqJoiner<'_> {
    type Ok = ();
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        if let Some(rendered) = value.serialize(ElementSerializer)? {
            self.parts.push(rendered);
        }
        Ok(())
    }

    fn end(self) -> Result<(), QueryError> {
        self.map.insert(self.key, self.parts.join(","));
        Ok(())
    }
}

/// Renders one sequence element to a string. `None` elements are dropped.
struct ElementSerializer;

macro_rules! render_display {
    ($($method:ident: $ty:ty,)*) => {$(
        fn $method(self, v: $ty) -> Result<Option<String>, QueryError> {
            Ok(Some(v.to_string()))
        }
    )*};
}

impl Serializer for ElementSerializer {
    type Ok = Option<String>;
    type Error = QueryError;

    type SerializeSeq = NestedJoiner;
    type SerializeTuple = Impossible<Option<String>, QueryError>;
    type SerializeTupleStruct = Impossible<Option<String>, QueryError>;
    type SerializeTupleVariant = Impossible<Option<String>, QueryError>;
    type SerializeMap = Impossible<Option<String>, QueryError>;
    type SerializeStruct = Impossible<Option<String>, QueryError>;
    type SerializeStructVariant = Impossible<Option<String>, QueryError>;

    render_display! {
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_char: char,
    }

    fn serialize_bool(self, v: bool) -> Result<Option<String>, QueryError> {
        Ok(Some(if v { "yes" } else { "no" }.into()))
    }

    fn serialize_str(self, v: &str) -> Result<Option<String>, QueryError> {
        Ok(Some(v.into()))
    }

    fn serialize_none(self) -> Result<Option<String>, QueryError> {
        Ok(None)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Option<String>, QueryError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Option<String>, QueryError> {
        Ok(None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Option<String>, QueryError> {
        Ok(None)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Option<String>, QueryError> {
        Ok(Some(variant.into()))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Option<String>, QueryError> {
        value.serialize(self)
    }

    // A nested sequence joins with the same separator, so it flattens into
    // the enclosing one on the wire. The format cannot do better.
    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, QueryError> {
        Ok(NestedJoiner {
            parts: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<Option<String>, QueryError> {
        Err(QueryError::Unsupported("raw bytes"))
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Option<String>, QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, QueryError> {
        Err(QueryError::Unsupported("a tuple"))
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, QueryError> {
        Err(QueryError::Unsupported("a tuple struct"))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, QueryError> {
        Err(QueryError::Unsupported("a map"))
    }
    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, QueryError> {
        Err(QueryError::Unsupported("a record inside a sequence"))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, QueryError> {
        Err(QueryError::Unsupported("an enum with data"))
    }
}

/// Joins a nested sequence's elements; the result is one element of the
/// enclosing sequence.
pub(super) struct NestedJoiner {
    parts: Vec<String>,
}

impl SerializeSeq for NestedJoiner {
    type Ok = Option<String>;
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        if let Some(rendered) = value.serialize(ElementSerializer)? {
            self.parts.push(rendered);
        }
        Ok(())
    }

    fn end(self) -> Result<Option<String>, QueryError> {
        Ok(Some(self.parts.join(",")))
    }
}
