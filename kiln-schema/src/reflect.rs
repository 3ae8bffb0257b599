//! Schema derivation from any `Serialize` value.
//!
//! [`Collector`] is a `serde::Serializer` whose output is a [`Schema`]
//! instead of bytes. Struct names come from the type's serde name, so two
//! fields of the same nested type land on one declaration.

use serde::ser::{
    self, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant,
};
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::{Field, PrimitiveKind, Reflection, Schema, StructTable};

/// Default limit on value nesting.
pub const DEFAULT_MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectOptions {
    /// Containers nested deeper than this fail with
    /// [`SchemaError::DepthExceeded`].
    pub max_depth: usize,
}

impl Default for ReflectOptions {
    fn default() -> Self {
        ReflectOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Derive the schema of `value` together with every struct declaration it
/// needs, ordered so each declaration follows the ones it references.
pub fn reflect<T>(value: &T, options: &ReflectOptions) -> Result<Reflection, SchemaError>
where
    T: ?Sized + Serialize,
{
    let mut collector = Collector::new(options.max_depth);
    let root = value.serialize(&mut collector)?;
    let reflection = collector.table.finish(root)?;
    debug!(
        root = %reflection.root.go_type(),
        declarations = reflection.declarations.len(),
        "reflected value"
    );
    Ok(reflection)
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

pub(crate) struct Collector {
    pub(crate) table: StructTable,
    depth: usize,
    max_depth: usize,
}

impl Collector {
    pub(crate) fn new(max_depth: usize) -> Self {
        Collector {
            table: StructTable::default(),
            depth: 0,
            max_depth,
        }
    }

    /// Enter one container level.
    pub(crate) fn descend(&mut self) -> Result<(), SchemaError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SchemaError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<Schema, SchemaError> {
        value.serialize(&mut *self)
    }
}

fn prim(kind: PrimitiveKind) -> Result<Schema, SchemaError> {
    Ok(Schema::Primitive(kind))
}

fn tagged(variant: &str, inner: Schema) -> Schema {
    debug!(variant, "externally tagged variant");
    Schema::Map(
        Box::new(Schema::Primitive(PrimitiveKind::String)),
        Box::new(inner),
    )
}

impl<'a> ser::Serializer for &'a mut Collector {
    type Ok = Schema;
    type Error = SchemaError;

    type SerializeSeq = SeqCollector<'a>;
    type SerializeTuple = SeqCollector<'a>;
    type SerializeTupleStruct = SeqCollector<'a>;
    type SerializeTupleVariant = SeqCollector<'a>;
    type SerializeMap = MapCollector<'a>;
    type SerializeStruct = StructCollector<'a>;
    type SerializeStructVariant = StructCollector<'a>;

    fn serialize_bool(self, _: bool) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Bool)
    }

    fn serialize_i8(self, _: i8) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Int8)
    }

    fn serialize_i16(self, _: i16) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Int16)
    }

    fn serialize_i32(self, _: i32) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Int32)
    }

    fn serialize_i64(self, _: i64) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Int64)
    }

    fn serialize_i128(self, _: i128) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Number)
    }

    fn serialize_u8(self, _: u8) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Uint8)
    }

    fn serialize_u16(self, _: u16) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Uint16)
    }

    fn serialize_u32(self, _: u32) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Uint32)
    }

    fn serialize_u64(self, _: u64) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Uint64)
    }

    fn serialize_u128(self, _: u128) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Number)
    }

    fn serialize_f32(self, _: f32) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Float32)
    }

    fn serialize_f64(self, _: f64) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::Float64)
    }

    fn serialize_char(self, _: char) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::String)
    }

    fn serialize_str(self, _: &str) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::String)
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<Schema, SchemaError> {
        Ok(Schema::Slice(Box::new(Schema::Primitive(PrimitiveKind::Uint8))))
    }

    fn serialize_none(self) -> Result<Schema, SchemaError> {
        Ok(Schema::UNKNOWN)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Schema, SchemaError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Schema, SchemaError> {
        Ok(Schema::UNKNOWN)
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Schema, SchemaError> {
        Ok(Schema::UNKNOWN)
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<Schema, SchemaError> {
        prim(PrimitiveKind::String)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Schema, SchemaError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Schema, SchemaError> {
        self.descend()?;
        let inner = value.serialize(&mut *self)?;
        self.ascend();
        Ok(tagged(variant, inner))
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<SeqCollector<'a>, SchemaError> {
        SeqCollector::start(self, SeqShape::Slice)
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCollector<'a>, SchemaError> {
        SeqCollector::start(self, SeqShape::Array(len))
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<SeqCollector<'a>, SchemaError> {
        SeqCollector::start(self, SeqShape::Array(len))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqCollector<'a>, SchemaError> {
        SeqCollector::start(self, SeqShape::TaggedArray(variant, len))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<MapCollector<'a>, SchemaError> {
        self.descend()?;
        Ok(MapCollector {
            collector: self,
            key: Schema::UNKNOWN,
            value: Schema::UNKNOWN,
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<StructCollector<'a>, SchemaError> {
        StructCollector::start(self, name.to_owned(), None, len)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<StructCollector<'a>, SchemaError> {
        StructCollector::start(self, format!("{name}{variant}"), Some(variant), len)
    }
}

// ---------------------------------------------------------------------------
// Sequences and tuples
// ---------------------------------------------------------------------------

enum SeqShape {
    Slice,
    Array(usize),
    TaggedArray(&'static str, usize),
}

pub(crate) struct SeqCollector<'a> {
    collector: &'a mut Collector,
    shape: SeqShape,
    elem: Schema,
}

impl<'a> SeqCollector<'a> {
    fn start(collector: &'a mut Collector, shape: SeqShape) -> Result<Self, SchemaError> {
        collector.descend()?;
        Ok(SeqCollector {
            collector,
            shape,
            elem: Schema::UNKNOWN,
        })
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SchemaError> {
        let schema = self.collector.element(value)?;
        let elem = std::mem::replace(&mut self.elem, Schema::UNKNOWN);
        self.elem = elem.unify(schema);
        Ok(())
    }

    fn finish(self) -> Result<Schema, SchemaError> {
        self.collector.ascend();
        let elem = Box::new(self.elem);
        Ok(match self.shape {
            SeqShape::Slice => Schema::Slice(elem),
            SeqShape::Array(len) => Schema::Array(len, elem),
            SeqShape::TaggedArray(variant, len) => tagged(variant, Schema::Array(len, elem)),
        })
    }
}

impl SerializeSeq for SeqCollector<'_> {
    type Ok = Schema;
    type Error = SchemaError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SchemaError> {
        self.push(value)
    }

    fn end(self) -> Result<Schema, SchemaError> {
        self.finish()
    }
}

impl SerializeTuple for SeqCollector<'_> {
    type Ok = Schema;
    type Error = SchemaError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SchemaError> {
        self.push(value)
    }

    fn end(self) -> Result<Schema, SchemaError> {
        self.finish()
    }
}

impl SerializeTupleStruct for SeqCollector<'_> {
    type Ok = Schema;
    type Error = SchemaError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SchemaError> {
        self.push(value)
    }

    fn end(self) -> Result<Schema, SchemaError> {
        self.finish()
    }
}

impl SerializeTupleVariant for SeqCollector<'_> {
    type Ok = Schema;
    type Error = SchemaError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SchemaError> {
        self.push(value)
    }

    fn end(self) -> Result<Schema, SchemaError> {
        self.finish()
    }
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

pub(crate) struct MapCollector<'a> {
    collector: &'a mut Collector,
    key: Schema,
    value: Schema,
}

impl SerializeMap for MapCollector<'_> {
    type Ok = Schema;
    type Error = SchemaError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), SchemaError> {
        let schema = self.collector.element(key)?.into_map_key()?;
        let current = std::mem::replace(&mut self.key, Schema::UNKNOWN);
        self.key = current.unify(schema);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SchemaError> {
        let schema = self.collector.element(value)?;
        let current = std::mem::replace(&mut self.value, Schema::UNKNOWN);
        self.value = current.unify(schema);
        Ok(())
    }

    fn end(self) -> Result<Schema, SchemaError> {
        self.collector.ascend();
        let key = self.key.into_map_key()?;
        Ok(Schema::Map(Box::new(key), Box::new(self.value)))
    }
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

pub(crate) struct StructCollector<'a> {
    collector: &'a mut Collector,
    name: String,
    variant: Option<&'static str>,
    fields: Vec<Field>,
}

impl<'a> StructCollector<'a> {
    fn start(
        collector: &'a mut Collector,
        name: String,
        variant: Option<&'static str>,
        len: usize,
    ) -> Result<Self, SchemaError> {
        collector.descend()?;
        Ok(StructCollector {
            collector,
            name,
            variant,
            fields: Vec::with_capacity(len),
        })
    }

    fn push<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SchemaError> {
        let schema = self.collector.element(value)?;
        self.fields.push(Field::new(key, schema));
        Ok(())
    }

    fn finish(self) -> Result<Schema, SchemaError> {
        self.collector.ascend();
        self.collector.table.record(&self.name, self.fields.clone());
        let schema = Schema::Struct {
            name: self.name,
            fields: self.fields,
        };
        Ok(match self.variant {
            Some(variant) => tagged(variant, schema),
            None => schema,
        })
    }
}

impl SerializeStruct for StructCollector<'_> {
    type Ok = Schema;
    type Error = SchemaError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SchemaError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Schema, SchemaError> {
        self.finish()
    }
}

impl SerializeStructVariant for StructCollector<'_> {
    type Ok = Schema;
    type Error = SchemaError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SchemaError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Schema, SchemaError> {
        self.finish()
    }
}
