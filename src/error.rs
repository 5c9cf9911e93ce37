use thiserror::Error;

/// Fatal build/layout errors. Every variant aborts the current diagram;
/// nothing is retried internally.
#[derive(Debug, Error)]
pub enum DiagramError {
    /// A node was claimed by two groups that are not ancestor/descendant
    /// related to each other.
    #[error("node '{node}' cannot belong to unrelated groups '{first}' and '{second}'")]
    OwnershipConflict {
        node: String,
        first: String,
        second: String,
    },

    /// An attribute name no element of this kind recognizes.
    #[error("unknown {element} attribute '{name}'")]
    UnknownAttribute { element: &'static str, name: String },

    /// A recognized attribute with a value that does not parse
    /// (e.g. a non-positive integer for a size attribute).
    #[error("invalid value '{value}' for {element} attribute '{name}'")]
    InvalidAttributeValue {
        element: &'static str,
        name: String,
        value: String,
    },

    /// Finalization met an edge geometry the grid model cannot express,
    /// e.g. endpoints whose cells overlap.
    #[error("unsupported edge geometry between '{from}' and '{to}'")]
    LayoutInvariant { from: String, to: String },
}
