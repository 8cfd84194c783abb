// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed, named attributes attached to mesh elements.
//!
//! A value is a short vector (1 to 4 components) of one component type. Per
//! element kind, each attribute name has a single layout, so a named layer
//! can always be written as one fixed-stride buffer.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::{ElementKey, ElementKind};
use crate::store::MeshStore;

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Float(Vec<f32>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
}

/// Attribute values of one element, by name.
pub type Attributes = FxHashMap<String, AttributeValue>;

/// Component type of an attribute, with its glTF accessor code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Float,
    Int,
    UInt,
}

impl ComponentType {
    /// glTF `componentType` code.
    pub fn code(self) -> u32 {
        match self {
            ComponentType::Int => 5124,
            ComponentType::UInt => 5125,
            ComponentType::Float => 5126,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            5124 => Some(ComponentType::Int),
            5125 => Some(ComponentType::UInt),
            5126 => Some(ComponentType::Float),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ComponentType::Float => "float",
            ComponentType::Int => "int",
            ComponentType::UInt => "uint",
        }
    }
}

/// Component type and component count shared by a named attribute layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLayout {
    pub component: ComponentType,
    pub dimension: usize,
}

impl AttributeLayout {
    /// glTF accessor `type` string.
    pub fn accessor_type(&self) -> &'static str {
        match self.dimension {
            1 => "SCALAR",
            2 => "VEC2",
            3 => "VEC3",
            _ => "VEC4",
        }
    }

    pub fn dimension_of(accessor_type: &str) -> Option<usize> {
        match accessor_type {
            "SCALAR" => Some(1),
            "VEC2" => Some(2),
            "VEC3" => Some(3),
            "VEC4" => Some(4),
            _ => None,
        }
    }

    /// Bytes per element; every component type is 4 bytes wide.
    pub fn stride(&self) -> usize {
        self.dimension * 4
    }
}

impl std::fmt::Display for AttributeLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.component.as_str(), self.dimension)
    }
}

impl AttributeValue {
    /// Number of components.
    pub fn dimension(&self) -> usize {
        match self {
            AttributeValue::Float(v) => v.len(),
            AttributeValue::Int(v) => v.len(),
            AttributeValue::UInt(v) => v.len(),
        }
    }

    pub fn layout(&self) -> AttributeLayout {
        let component = match self {
            AttributeValue::Float(_) => ComponentType::Float,
            AttributeValue::Int(_) => ComponentType::Int,
            AttributeValue::UInt(_) => ComponentType::UInt,
        };
        AttributeLayout {
            component,
            dimension: self.dimension(),
        }
    }

    /// Appends the little-endian components to `out`.
    pub(crate) fn write_le(&self, out: &mut Vec<u8>) {
        match self {
            AttributeValue::Float(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            AttributeValue::Int(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            AttributeValue::UInt(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        }
    }

    /// Reads one element; `bytes` holds exactly `layout.stride()` bytes.
    pub(crate) fn read_le(layout: AttributeLayout, bytes: &[u8]) -> Self {
        let words = bytes.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]);
        match layout.component {
            ComponentType::Float => AttributeValue::Float(words.map(f32::from_le_bytes).collect()),
            ComponentType::Int => AttributeValue::Int(words.map(i32::from_le_bytes).collect()),
            ComponentType::UInt => AttributeValue::UInt(words.map(u32::from_le_bytes).collect()),
        }
    }

    /// All-zero value used to fill elements that lack the attribute.
    pub(crate) fn zeroed(layout: AttributeLayout) -> Self {
        match layout.component {
            ComponentType::Float => AttributeValue::Float(vec![0.0; layout.dimension]),
            ComponentType::Int => AttributeValue::Int(vec![0; layout.dimension]),
            ComponentType::UInt => AttributeValue::UInt(vec![0; layout.dimension]),
        }
    }
}

/// Registered layout of one attribute name on one element kind.
///
/// `holders` counts the live elements carrying the name; the entry goes away
/// with its last holder, so a dead layer never constrains a later value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayerInfo {
    pub layout: AttributeLayout,
    pub holders: usize,
}

impl MeshStore {
    /// Sets a named attribute on an element, replacing any previous value.
    ///
    /// Fails with [`Error::ElementNotFound`] for a dead key and with
    /// [`Error::AttributeTypeMismatch`] when the name already carries another
    /// layout on this element kind.
    pub fn set_attribute(
        &mut self,
        element: impl Into<ElementKey>,
        key: impl Into<String>,
        value: AttributeValue,
    ) -> Result<()> {
        let element = element.into();
        let key = key.into();
        if !self.contains(element) {
            return Err(Error::ElementNotFound(element));
        }

        let layout = value.layout();
        if !(1..=4).contains(&layout.dimension) {
            return Err(Error::AttributeTypeMismatch {
                name: key,
                expected: "1 to 4 components".to_string(),
                found: format!("{} components", layout.dimension),
            });
        }

        let slot = (element.kind(), key.clone());
        if let Some(existing) = self.layouts.get(&slot) {
            if existing.layout != layout {
                return Err(Error::AttributeTypeMismatch {
                    name: key,
                    expected: existing.layout.to_string(),
                    found: layout.to_string(),
                });
            }
        }

        let previous = self.attributes.entry(element).or_default().insert(key, value);
        if previous.is_none() {
            self.layouts
                .entry(slot)
                .or_insert(LayerInfo { layout, holders: 0 })
                .holders += 1;
        }
        Ok(())
    }

    /// Looks up a named attribute. A missing attribute is `Ok(None)`.
    pub fn get_attribute(
        &self,
        element: impl Into<ElementKey>,
        key: &str,
    ) -> Result<Option<&AttributeValue>> {
        let element = element.into();
        if !self.contains(element) {
            return Err(Error::ElementNotFound(element));
        }
        Ok(self.attributes.get(&element).and_then(|attrs| attrs.get(key)))
    }

    /// Removes a named attribute and returns it.
    pub fn remove_attribute(
        &mut self,
        element: impl Into<ElementKey>,
        key: &str,
    ) -> Result<Option<AttributeValue>> {
        let element = element.into();
        if !self.contains(element) {
            return Err(Error::ElementNotFound(element));
        }
        let Some(attrs) = self.attributes.get_mut(&element) else {
            return Ok(None);
        };
        let removed = attrs.remove(key);
        if attrs.is_empty() {
            self.attributes.remove(&element);
        }
        if removed.is_some() {
            self.release_layer(element.kind(), key);
        }
        Ok(removed)
    }

    /// Drops every attribute of an element that is being removed.
    pub(crate) fn drop_attributes(&mut self, element: ElementKey) {
        let Some(attrs) = self.attributes.remove(&element) else {
            return;
        };
        for name in attrs.keys() {
            self.release_layer(element.kind(), name);
        }
    }

    fn release_layer(&mut self, kind: ElementKind, name: &str) {
        let slot = (kind, name.to_string());
        if let Some(info) = self.layouts.get_mut(&slot) {
            info.holders = info.holders.saturating_sub(1);
            if info.holders == 0 {
                self.layouts.remove(&slot);
            }
        }
    }

    /// Returns every attribute of an element.
    pub fn element_attributes(&self, element: impl Into<ElementKey>) -> Result<Option<&Attributes>> {
        let element = element.into();
        if !self.contains(element) {
            return Err(Error::ElementNotFound(element));
        }
        Ok(self.attributes.get(&element))
    }

    /// Returns the layout of a name on an element kind, while at least one
    /// live element carries it.
    pub fn attribute_layout(&self, kind: ElementKind, key: &str) -> Option<AttributeLayout> {
        self.layouts.get(&(kind, key.to_string())).map(|info| info.layout)
    }

    /// Attribute names of a kind held by at least one element, sorted by name.
    pub(crate) fn attribute_layers(&self, kind: ElementKind) -> Vec<(String, AttributeLayout)> {
        let mut layers: Vec<(String, AttributeLayout)> = self
            .layouts
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, name), info)| (name.clone(), info.layout))
            .collect();
        layers.sort_by(|a, b| a.0.cmp(&b.0));
        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_triangle() -> (MeshStore, crate::keys::FaceKey) {
        let mut mesh = MeshStore::new();
        let a = mesh.add_vertex([0.0, 0.0, 0.0]);
        let b = mesh.add_vertex([1.0, 0.0, 0.0]);
        let c = mesh.add_vertex([0.0, 1.0, 0.0]);
        let f = mesh.add_face(&[a, b, c]).unwrap();
        (mesh, f)
    }

    #[test]
    fn set_and_get_attribute() {
        let mut mesh = MeshStore::new();
        let vk = mesh.add_vertex([0.0, 0.0, 0.0]);

        mesh.set_attribute(vk, "weight", AttributeValue::Float(vec![1.5]))
            .unwrap();
        mesh.set_attribute(vk, "group", AttributeValue::UInt(vec![7]))
            .unwrap();

        assert_eq!(
            mesh.get_attribute(vk, "weight").unwrap(),
            Some(&AttributeValue::Float(vec![1.5]))
        );
        assert_eq!(
            mesh.get_attribute(vk, "group").unwrap(),
            Some(&AttributeValue::UInt(vec![7]))
        );
        assert_eq!(mesh.element_attributes(vk).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn absent_attribute_is_no_value() {
        let mut mesh = MeshStore::new();
        let vk = mesh.add_vertex([0.0, 0.0, 0.0]);
        assert_eq!(mesh.get_attribute(vk, "missing").unwrap(), None);
    }

    #[test]
    fn unknown_element_is_an_error() {
        let mut mesh = MeshStore::new();
        let vk = mesh.add_vertex([0.0, 0.0, 0.0]);
        mesh.remove_vertex(vk).unwrap();

        assert!(matches!(
            mesh.get_attribute(vk, "weight"),
            Err(Error::ElementNotFound(_))
        ));
        assert!(matches!(
            mesh.set_attribute(vk, "weight", AttributeValue::Float(vec![1.0])),
            Err(Error::ElementNotFound(_))
        ));
    }

    #[test]
    fn layout_is_fixed_per_kind() {
        let (mut mesh, face) = one_triangle();
        let loops: Vec<_> = mesh.face_loops(face).unwrap().collect();

        mesh.set_attribute(loops[0], "TEXCOORD_0", AttributeValue::Float(vec![0.0, 1.0]))
            .unwrap();
        let err = mesh
            .set_attribute(loops[1], "TEXCOORD_0", AttributeValue::Float(vec![0.0, 1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, Error::AttributeTypeMismatch { .. }));

        // Same name on another kind is a separate layer.
        mesh.set_attribute(face, "TEXCOORD_0", AttributeValue::Int(vec![3]))
            .unwrap();
        assert_eq!(
            mesh.attribute_layout(ElementKind::Loop, "TEXCOORD_0"),
            Some(AttributeLayout {
                component: ComponentType::Float,
                dimension: 2
            })
        );
    }

    #[test]
    fn dimension_must_be_one_to_four() {
        let mut mesh = MeshStore::new();
        let vk = mesh.add_vertex([0.0, 0.0, 0.0]);
        assert!(mesh.set_attribute(vk, "empty", AttributeValue::Int(vec![])).is_err());
        assert!(mesh
            .set_attribute(vk, "wide", AttributeValue::Float(vec![0.0; 5]))
            .is_err());
    }

    #[test]
    fn remove_attribute() {
        let mut mesh = MeshStore::new();
        let vk = mesh.add_vertex([0.0, 0.0, 0.0]);
        mesh.set_attribute(vk, "x", AttributeValue::Int(vec![1])).unwrap();

        let removed = mesh.remove_attribute(vk, "x").unwrap();
        assert_eq!(removed, Some(AttributeValue::Int(vec![1])));
        assert!(mesh.element_attributes(vk).unwrap().is_none());
    }

    #[test]
    fn attributes_die_with_their_element() {
        let (mut mesh, face) = one_triangle();
        mesh.set_attribute(face, "id", AttributeValue::UInt(vec![9])).unwrap();
        mesh.remove_face(face).unwrap();
        assert!(mesh.attributes.is_empty());
        assert!(mesh.layouts.is_empty());
    }

    #[test]
    fn layer_goes_away_with_last_holder() {
        let mut mesh = MeshStore::new();
        let first = mesh.add_vertex([0.0, 0.0, 0.0]);
        let second = mesh.add_vertex([1.0, 0.0, 0.0]);
        mesh.set_attribute(first, "w", AttributeValue::Float(vec![0.5])).unwrap();
        mesh.set_attribute(second, "w", AttributeValue::Float(vec![0.25])).unwrap();

        mesh.remove_vertex(first).unwrap();
        assert!(mesh.attribute_layout(ElementKind::Vertex, "w").is_some());
        mesh.remove_attribute(second, "w").unwrap();
        assert!(mesh.attribute_layout(ElementKind::Vertex, "w").is_none());
        assert!(mesh.attribute_layers(ElementKind::Vertex).is_empty());

        // The name is free for another layout now.
        let third = mesh.add_vertex([2.0, 0.0, 0.0]);
        mesh.set_attribute(third, "w", AttributeValue::Int(vec![3])).unwrap();
        assert_eq!(
            mesh.attribute_layout(ElementKind::Vertex, "w").unwrap().component,
            ComponentType::Int
        );
        mesh.validate().unwrap();
    }

    #[test]
    fn replacing_a_value_keeps_one_holder() {
        let mut mesh = MeshStore::new();
        let vk = mesh.add_vertex([0.0, 0.0, 0.0]);
        mesh.set_attribute(vk, "w", AttributeValue::Float(vec![0.5])).unwrap();
        mesh.set_attribute(vk, "w", AttributeValue::Float(vec![0.75])).unwrap();
        mesh.validate().unwrap();

        mesh.remove_attribute(vk, "w").unwrap();
        assert!(mesh.attribute_layout(ElementKind::Vertex, "w").is_none());
    }

    #[test]
    fn le_bytes_round_trip() {
        let value = AttributeValue::Int(vec![-3, 4]);
        let mut bytes = Vec::new();
        value.write_le(&mut bytes);
        assert_eq!(bytes.len(), value.layout().stride());
        assert_eq!(AttributeValue::read_le(value.layout(), &bytes), value);
        assert_eq!(value.layout().accessor_type(), "VEC2");
        assert_eq!(ComponentType::from_code(5124), Some(ComponentType::Int));
    }
}
