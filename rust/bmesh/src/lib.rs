// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BMesh Encoding
//!
//! Non-manifold boundary-representation meshes (vertices, edges, loops and
//! n-gon faces) with a two-layer codec for asset interchange.
//!
//! [`MeshStore`] owns every element in slot maps; loops link each face
//! corner into its face's boundary cycle and its edge's radial cycle, so an
//! edge may be shared by any number of faces.
//!
//! Encoding produces:
//!
//! - an **implicit** triangle list ([`codec::implicit`]) that any plain
//!   triangle reader can consume, and from which polygons can be regrouped;
//! - an optional **explicit** layer ([`codec::arrays`]) that rebuilds the
//!   store exactly, written inline ([`codec::inline`]) for small meshes or
//!   as aligned buffer views ([`codec::binary`]) for large ones.
//!
//! ```
//! use bmesh_encoding::{decode_asset, encode_asset, make_cube, EncodingConfig, MeshStore};
//!
//! let mut mesh = MeshStore::new();
//! make_cube(&mut mesh).unwrap();
//!
//! let asset = encode_asset(&mesh, &EncodingConfig::default());
//! let decoded = decode_asset(&asset).unwrap();
//! assert_eq!(decoded.face_count(), 6);
//! ```

pub mod attributes;
pub mod codec;
pub mod config;
pub mod construction;
pub mod error;
pub mod keys;
pub mod manifold;
pub mod store;
pub mod traversal;
pub mod validate;

pub use attributes::{AttributeLayout, AttributeValue, Attributes, ComponentType};
pub use codec::arrays::{decode, decode_with_config, encode, Csr, EncodedMesh};
pub use codec::asset::{
    arrays_from_extension, decode_asset, encode_asset, extension_from_primitive, EncodedAsset,
    ExplicitLayer, EXTENSION_NAME,
};
pub use codec::implicit::{decode_fans, encode_fans, ImplicitMesh};
pub use config::{DuplicateEdgePolicy, EncodingConfig, StoreConfig};
pub use construction::make_cube;
pub use error::{Error, Result};
pub use keys::{EdgeKey, ElementKey, ElementKind, FaceKey, LoopKey, VertexKey};
pub use manifold::{ManifoldClassifier, ManifoldState};
pub use store::MeshStore;
