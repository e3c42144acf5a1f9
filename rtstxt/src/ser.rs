//! Writes serde values back out in the text format.
//!
//! Values are first built into a [`TxtValue`] tree, then printed. `None` fields
//! are omitted, unit enum variants are written as bare identifiers and data
//! carrying variants as single-key blocks (`move = { x = 1 y = 2 }`), which is
//! exactly what [`crate::de`] reads back.

use std::fmt::Write as _;

use serde::ser::{self, Serialize};

use crate::error::Error;

/// An intermediate value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TxtValue {
    /// A `None`; skipped when it is a block entry.
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A bare identifier (struct field names, unit variants).
    Ident(String),
    /// A quoted string.
    Str(String),
    List(Vec<TxtValue>),
    Block(Vec<(TxtValue, TxtValue)>),
}

impl TxtValue {
    fn is_scalar(&self) -> bool {
        !matches!(self, TxtValue::List(_) | TxtValue::Block(_))
    }
}

/// Serializes `value` as a top-level block.
pub fn to_string<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    let tree = to_value(value)?;
    let mut out = String::new();
    match tree {
        TxtValue::Block(entries) => write_entries(&mut out, &entries, 0)?,
        TxtValue::Absent => {}
        other => {
            return Err(Error::msg(format!(
                "top-level value must be a struct or map, got {:?}",
                other
            )));
        }
    }
    Ok(out)
}

pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<TxtValue, Error> {
    value.serialize(ValueSerializer)
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn write_entries(
    out: &mut String,
    entries: &[(TxtValue, TxtValue)],
    depth: usize,
) -> Result<(), Error> {
    for (key, value) in entries {
        if *value == TxtValue::Absent {
            continue;
        }
        indent(out, depth);
        write_scalar(out, key)?;
        out.push_str(" = ");
        write_value(out, value, depth)?;
        out.push('\n');
    }
    Ok(())
}

fn write_scalar(out: &mut String, value: &TxtValue) -> Result<(), Error> {
    match value {
        TxtValue::Bool(b) => out.push_str(if *b { "yes" } else { "no" }),
        TxtValue::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        TxtValue::Float(f) => {
            let _ = write!(out, "{}", f);
        }
        TxtValue::Ident(s) => out.push_str(s),
        TxtValue::Str(s) => {
            let _ = write!(out, "\"{}\"", s);
        }
        other => return Err(Error::msg(format!("not a scalar: {:?}", other))),
    }
    Ok(())
}

fn write_value(out: &mut String, value: &TxtValue, depth: usize) -> Result<(), Error> {
    match value {
        TxtValue::List(items) if items.iter().all(TxtValue::is_scalar) => {
            out.push('{');
            for item in items {
                out.push(' ');
                write_scalar(out, item)?;
            }
            out.push_str(" }");
        }
        TxtValue::List(items) => {
            out.push_str("{\n");
            for item in items {
                indent(out, depth + 1);
                write_value(out, item, depth + 1)?;
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
        }
        TxtValue::Block(entries) if entries.is_empty() => out.push_str("{ }"),
        TxtValue::Block(entries) => {
            out.push_str("{\n");
            write_entries(out, entries, depth + 1)?;
            indent(out, depth);
            out.push('}');
        }
        TxtValue::Absent => return Err(Error::msg("cannot write a missing value here")),
        scalar => write_scalar(out, scalar)?,
    }
    Ok(())
}

struct ValueSerializer;

fn single_key(variant: &'static str, value: TxtValue) -> TxtValue {
    TxtValue::Block(vec![(TxtValue::Ident(variant.to_string()), value)])
}

impl ser::Serializer for ValueSerializer {
    type Ok = TxtValue;
    type Error = Error;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = BlockBuilder;
    type SerializeStruct = BlockBuilder;
    type SerializeStructVariant = BlockBuilder;

    fn serialize_bool(self, v: bool) -> Result<TxtValue, Error> {
        Ok(TxtValue::Bool(v))
    }
    fn serialize_i8(self, v: i8) -> Result<TxtValue, Error> {
        Ok(TxtValue::Int(v.into()))
    }
    fn serialize_i16(self, v: i16) -> Result<TxtValue, Error> {
        Ok(TxtValue::Int(v.into()))
    }
    fn serialize_i32(self, v: i32) -> Result<TxtValue, Error> {
        Ok(TxtValue::Int(v.into()))
    }
    fn serialize_i64(self, v: i64) -> Result<TxtValue, Error> {
        Ok(TxtValue::Int(v))
    }
    fn serialize_u8(self, v: u8) -> Result<TxtValue, Error> {
        Ok(TxtValue::Int(v.into()))
    }
    fn serialize_u16(self, v: u16) -> Result<TxtValue, Error> {
        Ok(TxtValue::Int(v.into()))
    }
    fn serialize_u32(self, v: u32) -> Result<TxtValue, Error> {
        Ok(TxtValue::Int(v.into()))
    }
    fn serialize_u64(self, v: u64) -> Result<TxtValue, Error> {
        i64::try_from(v)
            .map(TxtValue::Int)
            .map_err(|_| Error::msg(format!("{} does not fit in a signed 64-bit int", v)))
    }
    fn serialize_f32(self, v: f32) -> Result<TxtValue, Error> {
        self.serialize_f64(v.into())
    }
    fn serialize_f64(self, v: f64) -> Result<TxtValue, Error> {
        if !v.is_finite() {
            return Err(Error::msg(format!("cannot write non-finite float {}", v)));
        }
        Ok(TxtValue::Float(v))
    }
    fn serialize_char(self, v: char) -> Result<TxtValue, Error> {
        self.serialize_str(&v.to_string())
    }
    fn serialize_str(self, v: &str) -> Result<TxtValue, Error> {
        if v.contains('"') {
            return Err(Error::msg(format!("string {:?} contains a quote", v)));
        }
        Ok(TxtValue::Str(v.to_string()))
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<TxtValue, Error> {
        Ok(TxtValue::List(
            v.iter().map(|b| TxtValue::Int((*b).into())).collect(),
        ))
    }
    fn serialize_none(self) -> Result<TxtValue, Error> {
        Ok(TxtValue::Absent)
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<TxtValue, Error> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<TxtValue, Error> {
        Ok(TxtValue::Block(Vec::new()))
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<TxtValue, Error> {
        self.serialize_unit()
    }
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<TxtValue, Error> {
        Ok(TxtValue::Ident(variant.to_string()))
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<TxtValue, Error> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<TxtValue, Error> {
        Ok(single_key(variant, value.serialize(self)?))
    }
    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, Error> {
        Ok(SeqBuilder::new(len.unwrap_or(0), None))
    }
    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, Error> {
        Ok(SeqBuilder::new(len, None))
    }
    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder, Error> {
        Ok(SeqBuilder::new(len, None))
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, Error> {
        Ok(SeqBuilder::new(len, Some(variant)))
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<BlockBuilder, Error> {
        Ok(BlockBuilder::new(None))
    }
    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<BlockBuilder, Error> {
        Ok(BlockBuilder::new(None))
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<BlockBuilder, Error> {
        Ok(BlockBuilder::new(Some(variant)))
    }
}

pub struct SeqBuilder {
    items: Vec<TxtValue>,
    variant: Option<&'static str>,
}

impl SeqBuilder {
    fn new(len: usize, variant: Option<&'static str>) -> Self {
        SeqBuilder {
            items: Vec::with_capacity(len),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let v = value.serialize(ValueSerializer)?;
        if v == TxtValue::Absent {
            return Err(Error::msg("lists cannot hold missing values"));
        }
        self.items.push(v);
        Ok(())
    }

    fn finish(self) -> TxtValue {
        let list = TxtValue::List(self.items);
        match self.variant {
            Some(variant) => single_key(variant, list),
            None => list,
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = TxtValue;
    type Error = Error;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }
    fn end(self) -> Result<TxtValue, Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = TxtValue;
    type Error = Error;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }
    fn end(self) -> Result<TxtValue, Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = TxtValue;
    type Error = Error;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }
    fn end(self) -> Result<TxtValue, Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = TxtValue;
    type Error = Error;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }
    fn end(self) -> Result<TxtValue, Error> {
        Ok(self.finish())
    }
}

pub struct BlockBuilder {
    entries: Vec<(TxtValue, TxtValue)>,
    pending_key: Option<TxtValue>,
    variant: Option<&'static str>,
}

impl BlockBuilder {
    fn new(variant: Option<&'static str>) -> Self {
        BlockBuilder {
            entries: Vec::new(),
            pending_key: None,
            variant,
        }
    }

    fn finish(self) -> TxtValue {
        let block = TxtValue::Block(self.entries);
        match self.variant {
            Some(variant) => single_key(variant, block),
            None => block,
        }
    }
}

impl ser::SerializeMap for BlockBuilder {
    type Ok = TxtValue;
    type Error = Error;
    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Error> {
        let k = key.serialize(ValueSerializer)?;
        if !k.is_scalar() || k == TxtValue::Absent {
            return Err(Error::msg(format!("map key must be a scalar, got {:?}", k)));
        }
        self.pending_key = Some(k);
        Ok(())
    }
    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| Error::msg("serialize_value called before serialize_key"))?;
        self.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }
    fn end(self) -> Result<TxtValue, Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for BlockBuilder {
    type Ok = TxtValue;
    type Error = Error;
    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.entries.push((
            TxtValue::Ident(key.to_string()),
            value.serialize(ValueSerializer)?,
        ));
        Ok(())
    }
    fn end(self) -> Result<TxtValue, Error> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for BlockBuilder {
    type Ok = TxtValue;
    type Error = Error;
    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }
    fn end(self) -> Result<TxtValue, Error> {
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    enum Step {
        Idle,
        Sleep(u32),
        Move { x: i32, y: i32 },
    }

    #[derive(Serialize)]
    struct Plan {
        name: String,
        enabled: bool,
        retry: Option<u32>,
        steps: Vec<Step>,
    }

    #[test]
    fn writes_variants_and_skips_none() {
        let plan = Plan {
            name: "land attack".to_string(),
            enabled: true,
            retry: None,
            steps: vec![Step::Idle, Step::Sleep(5), Step::Move { x: 1, y: -2 }],
        };
        let text = to_string(&plan).expect("serialize");
        assert!(text.contains("name = \"land attack\""));
        assert!(text.contains("enabled = yes"));
        assert!(!text.contains("retry"));
        assert!(text.contains("Sleep = 5"));
        assert!(text.contains("\tIdle\n"));
        assert!(text.contains("y = -2"));
    }

    #[test]
    fn rejects_non_finite_floats() {
        #[derive(Serialize)]
        struct F {
            v: f64,
        }
        assert!(to_string(&F { v: f64::NAN }).is_err());
    }

    #[test]
    fn rejects_quotes_inside_strings() {
        #[derive(Serialize)]
        struct Named {
            name: String,
        }
        let quoted = Named {
            name: "the \"old\" guard".to_string(),
        };
        assert!(to_string(&quoted).is_err());

        let mut keys = std::collections::BTreeMap::new();
        keys.insert("a\"b".to_string(), 1u32);
        assert!(to_string(&keys).is_err());
    }

    #[test]
    fn rejects_scalar_top_level() {
        assert!(to_string(&5u32).is_err());
    }
}
