//! File-based include capability.
//!
//! Include names resolve relative to the directory of the including
//! file; heuristic includes try the name as written and then with a
//! `.conf` extension. Nested includes resolve relative to the file they
//! appear in.

use std::path::PathBuf;

use canopy_core::{ConfigError, IncludeKind, Includer, Value};

pub struct FileIncluder {
    base_dir: PathBuf,
}

impl FileIncluder {
    pub fn new(base_dir: PathBuf) -> FileIncluder {
        FileIncluder { base_dir }
    }

    fn candidates(&self, kind: IncludeKind, name: &str) -> Vec<PathBuf> {
        let direct = self.base_dir.join(name);
        match kind {
            IncludeKind::File => vec![direct],
            IncludeKind::Heuristic => {
                if name.ends_with(".conf") || name.ends_with(".json") {
                    vec![direct]
                } else {
                    vec![direct.clone(), self.base_dir.join(format!("{}.conf", name))]
                }
            }
            IncludeKind::Url | IncludeKind::Classpath => Vec::new(),
        }
    }
}

impl Includer for FileIncluder {
    fn include(
        &self,
        kind: IncludeKind,
        name: &str,
        required: bool,
    ) -> Result<Value, ConfigError> {
        if matches!(kind, IncludeKind::Url | IncludeKind::Classpath) {
            return Err(ConfigError::Include {
                name: name.to_owned(),
                message: format!("{} includes are not supported by the file includer", kind),
            });
        }
        let existing = self
            .candidates(kind, name)
            .into_iter()
            .find(|p| p.is_file());
        let path = match existing {
            Some(p) => p,
            None if required => {
                return Err(ConfigError::Include {
                    name: name.to_owned(),
                    message: format!("not found under {}", self.base_dir.display()),
                })
            }
            None => {
                return Ok(Value::empty_object(canopy_core::Origin::new(format!(
                    "include(\"{}\")",
                    name
                ))))
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Include {
            name: name.to_owned(),
            message: e.to_string(),
        })?;
        let nested = FileIncluder::new(
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| self.base_dir.clone()),
        );
        let root = canopy_core::parser::parse(&text, &path.display().to_string(), &nested)?;
        if root.object_fields().is_none() {
            return Err(ConfigError::Include {
                name: name.to_owned(),
                message: "included document is not an object".to_owned(),
            });
        }
        Ok(root)
    }
}
