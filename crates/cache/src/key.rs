//! Fragment cache key derivation.
//!
//! The base key depends only on the control identity and the writer kind.
//! The vary key continues the same combiner, so it is seeded by the base
//! key, then mixes in a constant salt and each configured dimension in
//! order.

use crate::error::CacheError;
use crate::request::RequestValues;
use crate::vary::ControlCachedVary;
use core_types::WriterKind;
use tools::HashCombiner;

pub const KEY_PREFIX: &str = "l";

/// Separator between naming-container and control ids in unique ids.
pub const ID_SEPARATOR: char = '$';

/// Maps a vary-by-custom string to the value the key varies on.
pub trait VaryByCustomResolver {
    fn vary_by_custom(&self, custom: &str) -> Result<Option<String>, CacheError>;
}

/// Request-dependent inputs of a vary key.
pub struct VaryInputs<'a> {
    pub values: &'a RequestValues,
    /// Unique id of the enclosing naming container; `None` at page level.
    pub naming_container: Option<&'a str>,
    pub control_id: &'a str,
    pub resolver: Option<&'a dyn VaryByCustomResolver>,
}

impl VaryInputs<'_> {
    fn control_prefix(&self) -> String {
        let mut prefix = String::new();
        if let Some(container) = self.naming_container {
            prefix.push_str(container);
            prefix.push(ID_SEPARATOR);
        }
        prefix.push_str(self.control_id);
        prefix.push(ID_SEPARATOR);
        prefix
    }
}

pub(crate) fn finish(combiner: &HashCombiner) -> String {
    format!("{KEY_PREFIX}{}", combiner.combined_hash_string())
}

pub fn base_combiner(identity: &str, writer: WriterKind) -> HashCombiner {
    let mut combiner = HashCombiner::new();
    combiner.add_str(identity);
    combiner.add_str(writer.name());
    combiner
}

pub fn base_key(identity: &str, writer: WriterKind) -> String {
    finish(&base_combiner(identity, writer))
}

/// Key of the realized entry for `vary` under the current request.
///
/// `base` is the combiner the base key was computed from; it is not
/// modified.
pub fn vary_key(
    base: HashCombiner,
    vary: &ControlCachedVary,
    inputs: &VaryInputs<'_>,
) -> Result<String, CacheError> {
    let mut combiner = base;
    combiner.add_int(1);

    if let Some(params) = &vary.vary_by_params {
        let names: Vec<&str> = if vary.varies_by_all_params() {
            inputs.values.keys()
        } else {
            params.iter().map(String::as_str).collect()
        };
        for name in names {
            combiner.add_case_insensitive_str(name);
            if let Some(value) = inputs.values.get(name) {
                combiner.add_str(&value);
            }
        }
    }

    if let Some(controls) = &vary.vary_by_controls {
        let prefix = inputs.control_prefix();
        for control in controls {
            let name = format!("{prefix}{}", control.trim());
            combiner.add_case_insensitive_str(&name);
            if let Some(value) = inputs.values.get(&name) {
                combiner.add_str(&value);
            }
        }
    }

    if let (Some(custom), Some(resolver)) = (&vary.vary_by_custom, inputs.resolver) {
        if let Some(value) = resolver.vary_by_custom(custom)? {
            combiner.add_str(&value);
        }
    }

    let key = finish(&combiner);
    log::trace!(target: "cache.fragment", "vary key {key}");
    Ok(key)
}
