//! The Trellis model taxonomy and its cryptographic authority layer.
//!
//! A model is an immutable, signed binary record packed with the
//! [`trellis_codec`] field format. The taxonomy is a three-level hierarchy
//! keyed by a byte-prefix "model type" tuple at field index 0:
//!
//! ```text
//! model
//! ├── node
//! │   ├── data node    ── DataNode
//! │   ├── license node ── LicenseNode
//! │   └── carrier node ── CarrierNode
//! └── cert
//!     ├── sign cert    ── SignCert
//!     ├── auth cert    ── AuthCert
//!     └── friend cert  ── FriendCert
//! ```
//!
//! Rather than an inheritance chain, concrete kinds are tagged variants
//! ([`AnyModel`]) over a shared carrier ([`Model`]) that owns the property
//! bag, the packed form, and the generic operations (pack, sign, verify,
//! hashing, flags, work proof). Kind-specific semantics (licensing hashes,
//! constraint tables, embedding rules) live on the typed wrappers.

#![forbid(unsafe_code)]

pub mod any;
pub mod cert;
pub mod constraints;
pub mod error;
pub mod fields;
pub mod flags;
pub mod kind;
pub mod model;
pub mod node;
pub mod work;

pub use any::AnyModel;
pub use cert::{validate_chain, AuthCert, Cert, FriendCert, SignCert};
pub use constraints::{hash_constraints, ConstraintTable};
pub use error::{ModelError, Result};
pub use fields::SignatureObject;
pub use flags::{DataNodeFlags, LicenseNodeFlags, NodeFlags};
pub use kind::ModelKind;
pub use model::Model;
pub use node::{license_hash, CarrierNode, DataNode, LicenseNode, Node};
pub use work::{solve_work, verify_work, work_threshold};
