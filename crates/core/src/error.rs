/// Top-level error type. All public API functions return this.
#[derive(Debug, thiserror::Error)]
pub enum IgError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Repair error: {0}")]
    Repair(#[from] RepairError),

    #[error("Release preparation error: {0}")]
    Release(#[from] ReleaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No canonicalBase defined in {path}")]
    MissingCanonicalBase { path: String },

    #[error("Cannot read package descriptor {path}: {detail}")]
    Unreadable { path: String, detail: String },

    #[error("Malformed package descriptor {path}: {detail}")]
    Malformed { path: String, detail: String },

    #[error("Missing guide document: {path}")]
    MissingGuide { path: String },

    #[error("Guide document {path} is not an ImplementationGuide")]
    NotAGuide { path: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Document root is not an object")]
    NotAnObject,

    #[error("Document has no resourceType")]
    MissingResourceType,

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed XML: {0}")]
    Structure(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("Resource has no id")]
    MissingId,

    #[error("StructureDefinition has no type")]
    MissingType,

    #[error("StructureDefinition has no differential element list")]
    MissingDifferential,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("No fixed-business-version defined in {path}")]
    MissingBusinessVersion { path: String },

    #[error("Malformed {path}: {detail}")]
    Malformed { path: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
