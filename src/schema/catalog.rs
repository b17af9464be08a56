use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::{SchemaDescriptor, SchemaError};

/// Descriptors compiled into the binary, used when no schema directory is configured.
const BUILTIN: &[(&str, &str)] = &[
    ("gtp-imsi-range.json", include_str!("../../schemas/gtp-imsi-range.json")),
    ("gtp-mccmnc-mapping.json", include_str!("../../schemas/gtp-mccmnc-mapping.json")),
    ("gtp-session-mgmt.json", include_str!("../../schemas/gtp-session-mgmt.json")),
    ("audit-trail.json", include_str!("../../schemas/audit-trail.json")),
];

/// Validated descriptors keyed by slug.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    descriptors: BTreeMap<String, Arc<SchemaDescriptor>>,
}

impl SchemaCatalog {
    pub fn builtin() -> Result<Self, SchemaError> {
        let descriptors = BUILTIN
            .iter()
            .map(|(path, text)| parse(path, text))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_descriptors(descriptors)
    }

    /// Loads every `.json`, `.yaml` and `.yml` file in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, SchemaError> {
        let io_err = |source| SchemaError::Io { path: dir.display().to_string(), source };
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("json" | "yaml" | "yml")))
            .collect();
        paths.sort();

        let descriptors = paths.iter().map(|p| load_file(p)).collect::<Result<Vec<_>, _>>()?;
        let catalog = Self::from_descriptors(descriptors)?;
        info!(dir = %dir.display(), count = catalog.len(), "Loaded schema descriptors");
        Ok(catalog)
    }

    pub fn from_descriptors(descriptors: Vec<SchemaDescriptor>) -> Result<Self, SchemaError> {
        let mut endpoints = HashSet::new();
        let mut map = BTreeMap::new();
        for descriptor in descriptors {
            descriptor.validate()?;
            if !endpoints.insert(descriptor.endpoint.clone()) {
                return Err(SchemaError::Duplicate { what: "endpoint", value: descriptor.endpoint });
            }
            if map.contains_key(&descriptor.slug) {
                return Err(SchemaError::Duplicate { what: "slug", value: descriptor.slug });
            }
            map.insert(descriptor.slug.clone(), Arc::new(descriptor));
        }
        Ok(Self { descriptors: map })
    }

    pub fn get(&self, slug: &str) -> Option<&Arc<SchemaDescriptor>> {
        self.descriptors.get(slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SchemaDescriptor>> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Reads and parses a single descriptor file. Callers validate.
pub fn load_file(path: &Path) -> Result<SchemaDescriptor, SchemaError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| SchemaError::Io { path: path.display().to_string(), source })?;
    parse(&path.display().to_string(), &text)
}

fn parse(path: &str, text: &str) -> Result<SchemaDescriptor, SchemaError> {
    let parse_err = |message: String| SchemaError::Parse { path: path.to_string(), message };
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yaml::from_str(text).map_err(|e| parse_err(e.to_string()))
    } else {
        serde_json::from_str(text).map_err(|e| parse_err(e.to_string()))
    }
}
