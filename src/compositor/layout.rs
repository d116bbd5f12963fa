//! Layout configuration
//!
//! Declarative description of how secondary sources are placed over the
//! primary source. A layout is resolved once per compositing session.

use serde::{Deserialize, Serialize};

/// Arrangement of sources on the output surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutType {
    Split,
    PictureInPicture,
}

/// Shape each secondary source is clipped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerShape {
    /// Circular clip centred on the scaled frame
    Round,
    Square,
    /// Scaled frame as-is
    Original,
}

impl ContainerShape {
    /// Whether the overlay is clipped to a circle
    pub fn is_round(&self) -> bool {
        matches!(self, ContainerShape::Round)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfiguration {
    #[serde(rename = "type")]
    pub kind: LayoutType,
    pub container: ContainerShape,
}

impl LayoutConfiguration {
    pub fn new(kind: LayoutType, container: ContainerShape) -> Self {
        Self { kind, container }
    }

    pub fn picture_in_picture(container: ContainerShape) -> Self {
        Self::new(LayoutType::PictureInPicture, container)
    }
}

impl Default for LayoutConfiguration {
    fn default() -> Self {
        Self {
            kind: LayoutType::Split,
            container: ContainerShape::Original,
        }
    }
}
