// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Complete encoded asset: the implicit triangles plus an optional explicit
//! layer, and the glTF extension glue around it.

use serde_json::Value;

use crate::codec::arrays::{self, EncodedMesh};
use crate::codec::binary::{self, BufferEncoding, BufferView};
use crate::codec::implicit::ImplicitMesh;
use crate::codec::inline::InlineMesh;
use crate::codec::DenseIndex;
use crate::config::EncodingConfig;
use crate::error::{Error, Result};
use crate::store::MeshStore;

/// Name of the glTF primitive extension carrying the explicit layer.
pub const EXTENSION_NAME: &str = "EXT_bmesh_encoding";

/// Explicit layer packed into its own buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferPayload {
    pub encoding: BufferEncoding,
    pub buffer: Vec<u8>,
    pub views: Vec<BufferView>,
}

/// The full-fidelity layer in one of its two representations.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplicitLayer {
    Inline(InlineMesh),
    Buffers(BufferPayload),
}

impl ExplicitLayer {
    /// Unpacks the layer into arrays, ready for [`arrays::decode`].
    pub fn to_arrays(&self) -> Result<EncodedMesh> {
        match self {
            ExplicitLayer::Inline(inline) => inline.to_arrays(),
            ExplicitLayer::Buffers(payload) => {
                binary::unpack(&payload.encoding, &[&payload.buffer], &payload.views)
            }
        }
    }

    /// The extension object written into the primitive's `extensions`.
    pub fn to_json(&self) -> Result<Value> {
        Ok(match self {
            ExplicitLayer::Inline(inline) => serde_json::to_value(inline)?,
            ExplicitLayer::Buffers(payload) => serde_json::to_value(&payload.encoding)?,
        })
    }
}

/// An encoded mesh. The implicit layer is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAsset {
    pub implicit: ImplicitMesh,
    pub explicit: Option<ExplicitLayer>,
}

/// Encodes a store into both layers.
///
/// The explicit layer is skipped when `config.enabled` is off, and uses
/// buffer views once the vertex count reaches the configured threshold.
pub fn encode_asset(store: &MeshStore, config: &EncodingConfig) -> EncodedAsset {
    let index = DenseIndex::new(store);
    let implicit = ImplicitMesh::from_dense(store, &index);

    let explicit = config.enabled.then(|| {
        let encoded = arrays::encode_dense(store, &index, config);
        if config.wants_buffers(store.vertex_count()) {
            let mut buffer = Vec::new();
            let mut views = Vec::new();
            let encoding = binary::pack(&encoded, &mut buffer, 0, &mut views);
            ExplicitLayer::Buffers(BufferPayload {
                encoding,
                buffer,
                views,
            })
        } else {
            ExplicitLayer::Inline(InlineMesh::from_arrays(&encoded))
        }
    });

    tracing::info!(
        vertices = store.vertex_count(),
        faces = store.face_count(),
        triangles = implicit.triangles.len(),
        explicit = match &explicit {
            None => "none",
            Some(ExplicitLayer::Inline(_)) => "inline",
            Some(ExplicitLayer::Buffers(_)) => "buffers",
        },
        "Encoded mesh asset"
    );

    EncodedAsset { implicit, explicit }
}

/// Decodes an asset, preferring the explicit layer.
///
/// Errors in the explicit layer are returned as-is; the implicit triangles
/// are used only when there is no explicit layer.
pub fn decode_asset(asset: &EncodedAsset) -> Result<MeshStore> {
    match &asset.explicit {
        Some(layer) => arrays::decode(&layer.to_arrays()?),
        None => {
            tracing::info!("No explicit layer, rebuilding from implicit triangles");
            Ok(asset.implicit.to_store())
        }
    }
}

/// Finds the extension object in a glTF primitive.
pub fn extension_from_primitive(primitive: &Value) -> Option<&Value> {
    primitive.get("extensions")?.get(EXTENSION_NAME)
}

/// Reads an extension object into arrays.
///
/// Element lists mean the inline form; objects with a `count` mean buffer
/// views into `buffers` described by `views`.
pub fn arrays_from_extension(
    extension: &Value,
    buffers: &[&[u8]],
    views: &[BufferView],
) -> Result<EncodedMesh> {
    match extension.get("vertices") {
        Some(Value::Array(_)) => {
            let inline: InlineMesh = serde_json::from_value(extension.clone())?;
            inline.to_arrays()
        }
        Some(Value::Object(_)) => {
            let encoding: BufferEncoding = serde_json::from_value(extension.clone())?;
            binary::unpack(&encoding, buffers, views)
        }
        _ => Err(Error::Serialization(format!(
            "{EXTENSION_NAME}: `vertices` must be a list or a view object"
        ))),
    }
}
