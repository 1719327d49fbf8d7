//! Reference-location rules for the supported document types.
//!
//! A rule names where a document embeds a path to an external binary
//! resource. Layer styles keep them in symbol-layer property elements,
//! print layouts directly on picture items.

/// A structural pattern locating one class of resource reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRule {
    /// `<layer class="CLASS"> … <prop k="KEY" v="PATH"/> … </layer>`
    Property {
        /// Symbol-layer class the containing element must carry.
        class: &'static str,
        /// Property key whose value is the resource path.
        key: &'static str,
    },

    /// `<ELEMENT ATTR="PATH" …>`
    Attribute {
        /// Element name carrying the reference.
        element: &'static str,
        /// Attribute holding the resource path.
        attr: &'static str,
    },
}

/// Containing element of property-style references.
pub const PROPERTY_CONTAINER: &str = "layer";

/// Class attribute of the containing element.
pub const PROPERTY_CLASS_ATTR: &str = "class";

/// Property element inside a symbol layer.
pub const PROPERTY_ELEMENT: &str = "prop";

/// Key attribute of a property element.
pub const PROPERTY_KEY_ATTR: &str = "k";

/// Value attribute of a property element.
pub const PROPERTY_VALUE_ATTR: &str = "v";

/// References embedded in layer style documents.
pub const STYLE_RULES: &[ReferenceRule] = &[
    ReferenceRule::Property {
        class: "SvgMarker",
        key: "name",
    },
    ReferenceRule::Property {
        class: "SVGFill",
        key: "svgFile",
    },
    ReferenceRule::Property {
        class: "RasterFill",
        key: "imageFile",
    },
];

/// References embedded in print layout documents.
pub const LAYOUT_RULES: &[ReferenceRule] = &[ReferenceRule::Attribute {
    element: "ComposerPicture",
    attr: "file",
}];
