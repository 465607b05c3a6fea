//! The document contract consumed by the index writer.
//!
//! Any type that can name itself, expose the text users will type to find it
//! and hand over a serializable payload can be indexed. The payload is what
//! searches return, serialized as JSON.
//!
//! # Examples
//!
//! ```
//! use autocomplete::document::Document;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Car {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Document for Car {
//!     type Payload = Car;
//!
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn term(&self) -> &str {
//!         &self.name
//!     }
//!
//!     fn payload(&self) -> &Car {
//!         self
//!     }
//! }
//!
//! let car = Car { id: "1".into(), name: "Mercedes S500".into() };
//! assert_eq!(autocomplete::keys::document_key(&car), "mercedes_s500_1");
//! ```

use serde::Serialize;

use crate::error::Result;

/// A document indexed for autocomplete search.
pub trait Document {
    /// The value stored in the document hash and returned by searches.
    type Payload: Serialize + ?Sized;

    /// Identifier, unique among documents sharing the same term.
    fn id(&self) -> &str;

    /// Free text the document is searched by.
    fn term(&self) -> &str;

    /// The payload to serialize into the document hash.
    fn payload(&self) -> &Self::Payload;
}

impl<D: Document + ?Sized> Document for &D {
    type Payload = D::Payload;

    fn id(&self) -> &str {
        (**self).id()
    }

    fn term(&self) -> &str {
        (**self).term()
    }

    fn payload(&self) -> &Self::Payload {
        (**self).payload()
    }
}

/// Serialize a document's payload the way it is stored in the document hash.
pub(crate) fn encode_payload<D: Document + ?Sized>(document: &D) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(document.payload())?)
}
