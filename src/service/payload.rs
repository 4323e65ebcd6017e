//! Create/update request body: plain fields plus uploaded files.

use crate::upload::UploadedFile;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    pub fields: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

impl Payload {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Payload {
            fields,
            files: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }
}
