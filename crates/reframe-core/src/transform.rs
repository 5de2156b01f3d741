use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Target resolution of a run. Both sides are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransformSpec")]
pub struct TransformSpec {
    target_width: u32,
    target_height: u32,
}

#[derive(Deserialize)]
struct RawTransformSpec {
    target_width: u32,
    target_height: u32,
}

impl TryFrom<RawTransformSpec> for TransformSpec {
    type Error = CoreError;

    fn try_from(raw: RawTransformSpec) -> Result<Self, Self::Error> {
        TransformSpec::new(raw.target_width, raw.target_height)
    }
}

impl TransformSpec {
    pub fn new(target_width: u32, target_height: u32) -> Result<Self, CoreError> {
        if target_width == 0 || target_height == 0 {
            return Err(CoreError::InvalidInput(format!(
                "target size must be positive, got {target_width}x{target_height}"
            )));
        }
        Ok(Self {
            target_width,
            target_height,
        })
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn target_height(&self) -> u32 {
        self.target_height
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.target_width, self.target_height)
    }
}
