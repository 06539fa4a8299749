use uuid::Uuid;

/// A client-side registration made while a fragment rendered, replayed on
/// every cache hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegisterCall {
    ClientScriptBlock {
        key: String,
        script: String,
        add_script_tags: bool,
    },
    ClientScriptInclude {
        key: String,
        url: String,
    },
    StartupScript {
        key: String,
        script: String,
        add_script_tags: bool,
    },
    ArrayDeclaration {
        name: String,
        value: String,
    },
    HiddenField {
        name: String,
        value: String,
    },
    ExpandoAttribute {
        control_id: String,
        attribute: String,
        value: String,
    },
    OnSubmitStatement {
        key: String,
        script: String,
    },
}

/// Event-validation registration: target unique id and optional argument.
pub type ValidationEvent = (String, Option<String>);

/// A rendered fragment plus the side effects its rendering produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub output: String,
    pub css: Option<String>,
    pub calls: Vec<RegisterCall>,
    pub validation: Vec<ValidationEvent>,
    /// Id of the vary descriptor this entry was stored under, if any.
    pub cached_vary_id: Option<Uuid>,
}
