use serde::de::{
    self, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use serde::{Deserialize, forward_to_deserialize_any};

use crate::error::Error;
use crate::{DefaultRtsTxt, RtsTxt, RtsTxtAstItem, RtsTxtParseNode};

pub struct Deserializer<'de> {
    input: &'de RtsTxtParseNode,
    child_iter: std::slice::Iter<'de, RtsTxtParseNode>,
}

impl<'de> Deserializer<'de> {
    pub fn from_node(input: &'de RtsTxtParseNode) -> Self {
        Deserializer {
            input,
            child_iter: input.children.iter(),
        }
    }

    fn expect_block(&self, what: &str) -> Result<(), Error> {
        if self.input.entry == RtsTxtAstItem::AssignmentList {
            Ok(())
        } else {
            Err(Error::msg(format!(
                "expected a {} block, found {:?}",
                what, self.input.entry
            )))
        }
    }
}

pub fn from_node<'a, T>(node: &'a RtsTxtParseNode) -> Result<T, Error>
where
    T: Deserialize<'a>,
{
    let mut deserializer = Deserializer::from_node(node);
    T::deserialize(&mut deserializer)
}

/// Tokenizes, parses and deserializes `contents` in one go.
pub fn from_str<T>(contents: &str) -> Result<T, Error>
where
    T: de::DeserializeOwned,
{
    let ast = DefaultRtsTxt::parse_str(contents)?;
    from_node(&ast)
}

impl<'de> de::Deserializer<'de> for &mut Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match &self.input.entry {
            RtsTxtAstItem::Identifier(s) | RtsTxtAstItem::StringValue(s) => visitor.visit_str(s),
            RtsTxtAstItem::IntValue(i) => visitor.visit_i64(*i),
            RtsTxtAstItem::FloatValue(f) => visitor.visit_f64(*f),
            RtsTxtAstItem::AssignmentList => {
                // A list whose first child is an assignment reads as a map.
                if self
                    .input
                    .children
                    .first()
                    .is_some_and(|first| matches!(first.entry, RtsTxtAstItem::Assignment))
                {
                    return self.deserialize_map(visitor);
                }
                self.deserialize_seq(visitor)
            }
            other => Err(Error::msg(format!(
                "unexpected {:?} in deserialize_any",
                other
            ))),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match &self.input.entry {
            RtsTxtAstItem::Identifier(s) if s == "yes" => visitor.visit_bool(true),
            RtsTxtAstItem::Identifier(s) if s == "no" => visitor.visit_bool(false),
            other => Err(Error::msg(format!("invalid bool: {:?}", other))),
        }
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match &self.input.entry {
            RtsTxtAstItem::FloatValue(f) => visitor.visit_f64(*f),
            RtsTxtAstItem::IntValue(i) => visitor.visit_f64(*i as f64),
            other => Err(Error::msg(format!("not a number: {:?}", other))),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match &self.input.entry {
            RtsTxtAstItem::Identifier(s) | RtsTxtAstItem::StringValue(s) => visitor.visit_str(s),
            RtsTxtAstItem::IntValue(i) => visitor.visit_string(i.to_string()),
            other => Err(Error::msg(format!("not a string: {:?}", other))),
        }
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.expect_block("list")?;
        visitor.visit_seq(CommaSeparated::new(&mut self.child_iter))
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.expect_block("map")?;
        visitor.visit_map(CommaSeparated::new(&mut self.child_iter))
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        // Absent keys become None through the derive; a present value is Some.
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let input: &'de RtsTxtParseNode = self.input;
        match &input.entry {
            RtsTxtAstItem::Identifier(s) | RtsTxtAstItem::StringValue(s) => {
                visitor.visit_enum(s.as_str().into_deserializer())
            }
            RtsTxtAstItem::AssignmentList => {
                let [single] = input.children.as_slice() else {
                    return Err(Error::msg(
                        "enum block must hold exactly one `variant = value` assignment",
                    ));
                };
                match (&single.entry, single.children.as_slice()) {
                    (RtsTxtAstItem::Assignment, [key, value]) => {
                        visitor.visit_enum(Enum { key, value })
                    }
                    _ => Err(Error::msg("enum block must hold an assignment")),
                }
            }
            other => Err(Error::msg(format!("not an enum: {:?}", other))),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        i8 i16 i32 i64 u8 u16 u32 u64 char bytes byte_buf unit_struct identifier
    }
}

struct Enum<'de> {
    key: &'de RtsTxtParseNode,
    value: &'de RtsTxtParseNode,
}

impl<'de> EnumAccess<'de> for Enum<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let mut de = Deserializer::from_node(self.key);
        let variant = seed.deserialize(&mut de)?;
        Ok((variant, self))
    }
}

impl<'de> VariantAccess<'de> for Enum<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(&mut Deserializer::from_node(self.value))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_seq(&mut Deserializer::from_node(self.value), visitor)
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_map(&mut Deserializer::from_node(self.value), visitor)
    }
}

// Iterator for Seq and Map Access
struct CommaSeparated<'a, 'de: 'a> {
    iter: &'a mut std::slice::Iter<'de, RtsTxtParseNode>,
    value: Option<&'de RtsTxtParseNode>,
}

impl<'a, 'de> CommaSeparated<'a, 'de> {
    fn new(iter: &'a mut std::slice::Iter<'de, RtsTxtParseNode>) -> Self {
        CommaSeparated { iter, value: None }
    }
}

impl<'de> SeqAccess<'de> for CommaSeparated<'_, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(node) => {
                let mut de = Deserializer::from_node(node);
                seed.deserialize(&mut de).map(Some)
            }
            None => Ok(None),
        }
    }
}

impl<'de> MapAccess<'de> for CommaSeparated<'_, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        let Some(node) = self.iter.next() else {
            return Ok(None);
        };
        match (&node.entry, node.children.as_slice()) {
            (RtsTxtAstItem::Assignment, [key_node, val_node]) => {
                self.value = Some(val_node);
                let mut de = Deserializer::from_node(key_node);
                seed.deserialize(&mut de).map(Some)
            }
            (entry, _) => Err(Error::msg(format!(
                "expected assignment in map, got {:?}",
                entry
            ))),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let val_node = self
            .value
            .take()
            .ok_or_else(|| Error::msg("next_value called before next_key"))?;
        let mut de = Deserializer::from_node(val_node);
        seed.deserialize(&mut de)
    }
}
