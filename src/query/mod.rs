//! Read-only listings over the whole repository log.
//!
//! These back the language and component pickers and give the script
//! engine its list of languages to iterate over.

mod facade;

pub use facade::{
    ComponentsTree, QueryFacade, TreeFilter, LANGCONFIG_COMPONENT, LANGUAGE_NAME_STRING, MASTER_LANG,
};
