//! engine::registry
//!
//! The command registry: name and alias resolution, discovery, and the
//! structured export/import of definitions.
//!
//! # Architecture
//!
//! Definitions are stored in registration order with a primary-name index
//! and a one-hop alias index (alias -> primary name). Lookup never chains
//! aliases.
//!
//! # Invariants
//!
//! - No two entries share a string, whether name or alias
//! - Collisions fail at registration; nothing is ever overwritten
//! - Definitions without a category are listed under `general`

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::command::{CommandDefinition, DefinitionError};

/// Errors from registering, importing or exporting definitions.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A name or alias is already taken.
    #[error("'{name}' is already registered by command '{owner}'")]
    Collision { name: String, owner: String },

    #[error("invalid definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("invalid definitions document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Registered command definitions.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDefinition>,
    names: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its name and aliases.
    pub fn register(&mut self, def: CommandDefinition) -> Result<(), RegistryError> {
        def.check()?;

        let mut claimed = BTreeSet::new();
        for name in def.names() {
            if let Some(owner) = self.owner_of(name) {
                return Err(RegistryError::Collision {
                    name: name.to_string(),
                    owner: owner.to_string(),
                });
            }
            if !claimed.insert(name) {
                return Err(RegistryError::Collision {
                    name: name.to_string(),
                    owner: def.name.clone(),
                });
            }
        }

        debug!(command = %def.name, aliases = ?def.aliases, "registered command");
        for alias in &def.aliases {
            self.aliases.insert(alias.clone(), def.name.clone());
        }
        self.names.insert(def.name.clone(), self.commands.len());
        self.commands.push(def);
        Ok(())
    }

    /// Register several definitions, stopping at the first failure.
    pub fn register_all(
        &mut self,
        defs: impl IntoIterator<Item = CommandDefinition>,
    ) -> Result<(), RegistryError> {
        for def in defs {
            self.register(def)?;
        }
        Ok(())
    }

    fn owner_of<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.names.contains_key(name) {
            return Some(name);
        }
        self.aliases.get(name).map(String::as_str)
    }

    /// Resolve a primary name or alias.
    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        let primary = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.names.get(primary).map(|&index| &self.commands[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All definitions in registration order.
    pub fn all(&self) -> &[CommandDefinition] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn by_category(&self, category: &str) -> Vec<&CommandDefinition> {
        self.commands
            .iter()
            .filter(|def| def.category_or_default() == category)
            .collect()
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|def| def.category_or_default().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Primary names and aliases, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .flat_map(|def| def.names().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    /// Case-insensitive substring search over name, aliases, description
    /// and tags.
    pub fn search(&self, query: &str) -> Vec<&CommandDefinition> {
        let query = query.to_lowercase();
        self.commands
            .iter()
            .filter(|def| {
                def.name.to_lowercase().contains(&query)
                    || def.aliases.iter().any(|alias| alias.to_lowercase().contains(&query))
                    || def.description.to_lowercase().contains(&query)
                    || def.tags.iter().any(|tag| tag.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Names to offer for an unknown command: prefix matches first, then
    /// search hits.
    pub fn suggest(&self, name: &str) -> Vec<String> {
        if name.is_empty() {
            return Vec::new();
        }
        let mut suggestions: Vec<String> = self
            .command_names()
            .into_iter()
            .filter(|candidate| candidate.starts_with(name))
            .collect();
        for def in self.search(name) {
            if !suggestions.contains(&def.name) {
                suggestions.push(def.name.clone());
            }
        }
        suggestions.truncate(5);
        suggestions
    }

    /// Static metadata of every definition as a pretty JSON array.
    pub fn export_definitions(&self) -> Result<String, RegistryError> {
        Ok(serde_json::to_string_pretty(&self.commands)?)
    }

    /// Write [`export_definitions`](Self::export_definitions) to `path`.
    pub fn save_definitions_file(&self, path: &Path) -> Result<(), RegistryError> {
        let document = self.export_definitions()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, document).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parse an exported definitions document.
///
/// Imported definitions use the default stage strategies and have no
/// executor.
pub fn import_definitions(json: &str) -> Result<Vec<CommandDefinition>, RegistryError> {
    let mut defs: Vec<CommandDefinition> = serde_json::from_str(json)?;
    for def in &mut defs {
        if def.usage.is_empty() {
            def.usage = def.name.clone();
        }
        def.check()?;
    }
    Ok(defs)
}

/// Load definitions from a file. A missing file yields no definitions.
pub fn load_definitions_file(path: &Path) -> Result<Vec<CommandDefinition>, RegistryError> {
    match fs::read_to_string(path) {
        Ok(json) => import_definitions(&json),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(RegistryError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::{Execution, ParameterDefinition};

    fn def(name: &str, aliases: &[&str]) -> CommandDefinition {
        CommandDefinition::builder(name)
            .aliases(aliases.iter().copied())
            .build()
            .unwrap()
    }

    mod registration {
        use super::*;

        #[test]
        fn get_by_name_and_alias() {
            let mut registry = CommandRegistry::new();
            registry.register(def("lsx", &["dir", "list"])).unwrap();
            assert_eq!(registry.get("lsx").unwrap().name, "lsx");
            assert_eq!(registry.get("dir").unwrap().name, "lsx");
            assert!(registry.contains("list"));
            assert!(registry.get("ls").is_none());
        }

        #[test]
        fn duplicate_name_rejected() {
            let mut registry = CommandRegistry::new();
            registry.register(def("cd", &[])).unwrap();
            let err = registry.register(def("cd", &[])).unwrap_err();
            assert!(matches!(err, RegistryError::Collision { ref name, .. } if name == "cd"));
            assert_eq!(registry.len(), 1);
        }

        #[test]
        fn overlapping_aliases_rejected() {
            let mut registry = CommandRegistry::new();
            registry.register(def("lsx", &["dir"])).unwrap();
            let err = registry.register(def("tree", &["dir"])).unwrap_err();
            assert_eq!(err.to_string(), "'dir' is already registered by command 'lsx'");
            assert!(registry.get("tree").is_none());
        }

        #[test]
        fn alias_colliding_with_name_rejected() {
            let mut registry = CommandRegistry::new();
            registry.register(def("help", &[])).unwrap();
            assert!(registry.register(def("helpx", &["help"])).is_err());
        }

        #[test]
        fn name_colliding_with_alias_rejected() {
            let mut registry = CommandRegistry::new();
            registry.register(def("exit", &["bye"])).unwrap();
            assert!(registry.register(def("bye", &[])).is_err());
        }

        #[test]
        fn self_alias_rejected() {
            let mut registry = CommandRegistry::new();
            assert!(registry.register(def("pwd", &["pwd"])).is_err());
            assert!(registry.is_empty());
        }

        #[test]
        fn register_all_keeps_order() {
            let mut registry = CommandRegistry::new();
            registry
                .register_all(vec![def("b", &[]), def("a", &[])])
                .unwrap();
            let names: Vec<&str> = registry.all().iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, vec!["b", "a"]);
        }
    }

    mod discovery {
        use super::*;

        fn registry() -> CommandRegistry {
            let mut registry = CommandRegistry::new();
            registry
                .register(
                    CommandDefinition::builder("lsx")
                        .aliases(["dir"])
                        .description("List directory contents")
                        .category("filesystem")
                        .build()
                        .unwrap(),
                )
                .unwrap();
            registry
                .register(
                    CommandDefinition::builder("git")
                        .description("Run git")
                        .category("development")
                        .tags(["vcs"])
                        .build()
                        .unwrap(),
                )
                .unwrap();
            registry.register(def("exit", &["bye"])).unwrap();
            registry
        }

        #[test]
        fn names_sorted_with_aliases() {
            assert_eq!(registry().command_names(), vec!["bye", "dir", "exit", "git", "lsx"]);
        }

        #[test]
        fn categories_default_general() {
            let registry = registry();
            assert_eq!(registry.categories(), vec!["development", "filesystem", "general"]);
            assert_eq!(registry.by_category("general")[0].name, "exit");
        }

        #[test]
        fn search_matches_description_and_tags() {
            let registry = registry();
            assert_eq!(registry.search("DIRECTORY")[0].name, "lsx");
            assert_eq!(registry.search("vcs")[0].name, "git");
            assert!(registry.search("nothing").is_empty());
        }

        #[test]
        fn search_matches_aliases() {
            let registry = registry();
            let hits: Vec<&str> = registry.search("BY").iter().map(|d| d.name.as_str()).collect();
            assert_eq!(hits, vec!["exit"]);
        }

        #[test]
        fn suggestions_prefer_prefix() {
            let registry = registry();
            assert_eq!(registry.suggest("ex"), vec!["exit"]);
            assert_eq!(registry.suggest("ls"), vec!["lsx"]);
            assert!(registry.suggest("").is_empty());
        }
    }

    mod export {
        use super::*;

        #[test]
        fn round_trip_metadata() {
            let mut registry = CommandRegistry::new();
            registry
                .register(
                    CommandDefinition::builder("touch")
                        .aliases(["t"])
                        .description("Create a file")
                        .parameter(ParameterDefinition::path("path", "File").required())
                        .bool_flag("force", "Overwrite", Some("f"))
                        .example("Create notes", "touch notes.txt", None)
                        .on_execute(|_, _| {
                            Box::pin(async { Ok(crate::core::output::CommandOutput::text("")) })
                        })
                        .build()
                        .unwrap(),
                )
                .unwrap();

            let json = registry.export_definitions().unwrap();
            let defs = import_definitions(&json).unwrap();
            assert_eq!(defs.len(), 1);
            let def = &defs[0];
            assert_eq!(def.name, "touch");
            assert_eq!(def.aliases, vec!["t"]);
            assert!(def.parameters[0].required);
            assert_eq!(def.flags[0].short.as_deref(), Some("f"));
            assert_eq!(def.examples[0].command, "touch notes.txt");
            assert!(matches!(def.execution, Execution::NotImplemented));
        }

        #[test]
        fn import_defaults_usage() {
            let defs = import_definitions(r#"[{"name":"hello"}]"#).unwrap();
            assert_eq!(defs[0].usage, "hello");
            assert_eq!(defs[0].description, "");
        }

        #[test]
        fn import_rejects_bad_schema() {
            let err = import_definitions(
                r#"[{"name":"x","flags":[{"name":"a","short":"ab","type":"boolean"}]}]"#,
            )
            .unwrap_err();
            assert!(matches!(err, RegistryError::Definition(_)));
        }

        #[test]
        fn missing_file_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let defs = load_definitions_file(&dir.path().join("none.json")).unwrap();
            assert!(defs.is_empty());
        }

        #[test]
        fn save_then_load() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join("commands.json");
            let mut registry = CommandRegistry::new();
            registry.register(def("a", &["b"])).unwrap();
            registry.save_definitions_file(&path).unwrap();

            let defs = load_definitions_file(&path).unwrap();
            assert_eq!(defs[0].aliases, vec!["b"]);
        }
    }
}
