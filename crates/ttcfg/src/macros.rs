//! macro definitions collected from `[DEFINE]` sections
//!
//! [MacroTable] maps a name to its value and every place it was defined. Redefining a macro replaces the value but
//! keeps the old locations, so "defined more than once" diagnostics can point at all of them.
//!
//! Names that are not defined anywhere fall back to environment variables.
use crate::diagnostics::Marker;
use crate::expr;
use crate::span::SourceSpan;
use crate::syntax;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroDefinition {
    pub value: String,
    pub locations: Vec<SourceSpan>,
    /// sites written as `name &= value`
    #[serde(skip)]
    appended: Vec<SourceSpan>,
    /// every site so far was an append, so the value continues whatever an earlier table defined
    #[serde(skip)]
    continues: bool,
}

impl MacroDefinition {
    fn new(value: String, location: SourceSpan) -> Self {
        Self {
            value,
            locations: vec![location],
            appended: Vec::new(),
            continues: false,
        }
    }

    pub fn is_appended_at(&self, location: &SourceSpan) -> bool {
        self.appended.contains(location)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MacroTable {
    definitions: IndexMap<String, MacroDefinition>,
    #[serde(skip)]
    environment: IndexMap<String, String>,
}

impl MacroTable {
    pub fn with_environment(environment: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            definitions: IndexMap::new(),
            environment: environment.into_iter().collect(),
        }
    }

    /// Define or redefine `name`
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>, location: SourceSpan) {
        let name = name.into();
        let value = value.into();

        match self.definitions.get_mut(&name) {
            Some(existing) => {
                tracing::debug!(name = %name, old = %existing.value, new = %value, "macro redefined");
                existing.value = value;
                existing.continues = false;
                existing.locations.push(location);
            }
            None => {
                self.definitions
                    .insert(name, MacroDefinition::new(value, location));
            }
        }
    }

    /// `name &= value`: join with the current value as `current & value`
    ///
    /// Without a current value the definition is kept open, so [MacroTable::merge] joins it with the value of the
    /// table it is merged into.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>, location: SourceSpan) {
        let name = name.into();
        let value = value.into();

        match self.definitions.get_mut(&name) {
            Some(existing) => {
                tracing::debug!(name = %name, value = %value, "macro appended");
                existing.value = format!("{} & {value}", existing.value);
                existing.appended.push(location.clone());
                existing.locations.push(location);
            }
            None => {
                let mut definition = MacroDefinition::new(value, location.clone());
                definition.appended.push(location);
                definition.continues = true;
                self.definitions.insert(name, definition);
            }
        }
    }

    /// Value of `name`, falling back to the environment
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.definitions
            .get(name)
            .map(|definition| definition.value.as_str())
            .or_else(|| self.environment.get(name).map(String::as_str))
    }

    /// Lookup for the `${name, type}` form
    ///
    /// The declared type is not checked against the value.
    pub fn lookup_typed(&self, name: &str) -> Option<&str> {
        self.lookup(name)
    }

    pub fn definition(&self, name: &str) -> Option<&MacroDefinition> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = (&str, &MacroDefinition)> {
        self.definitions
            .iter()
            .map(|(name, definition)| (name.as_str(), definition))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Fold a later `fragment` into this table
    ///
    /// A fragment definition that only appended continues the value found here; any other one replaces it. Every
    /// definition site is kept.
    pub fn merge(&mut self, fragment: &MacroTable) {
        for (name, definition) in &fragment.definitions {
            let Some(existing) = self.definitions.get_mut(name) else {
                self.definitions.insert(name.clone(), definition.clone());
                continue;
            };

            if definition.continues {
                existing.value = format!("{} & {}", existing.value, definition.value);
            } else {
                existing.value = definition.value.clone();
                existing.continues = false;
            }
            existing.locations.extend(definition.locations.iter().cloned());
            existing.appended.extend(definition.appended.iter().cloned());
        }
    }

    /// One warning for every definition site beyond the first, appends excluded
    pub fn redefinition_warnings(&self) -> Vec<Marker> {
        self.definitions
            .iter()
            .flat_map(|(name, definition)| {
                definition
                    .locations
                    .iter()
                    .skip(1)
                    .filter(|location| !definition.is_appended_at(location))
                    .map(move |location| {
                        Marker::warning(
                            format!("macro `{name}` is defined more than once"),
                            location.clone(),
                        )
                    })
            })
            .collect()
    }

    /// Resolve macro references inside macro values
    ///
    /// Values that form a complete expression are replaced by their evaluated literal. Macros taking part in a
    /// reference cycle end up empty.
    pub fn expand_all(&mut self) -> Vec<Marker> {
        let mut expansion = Expansion::default();

        let names: Vec<String> = self.definitions.keys().cloned().collect();
        for name in &names {
            self.expand(name, &mut expansion);
        }

        for (name, value) in expansion.done {
            if let Some(definition) = self.definitions.get_mut(&name) {
                definition.value = if expansion.cyclic.contains(&name) {
                    String::new()
                } else {
                    value
                };
            }
        }

        expansion.markers
    }

    fn expand(&self, name: &str, expansion: &mut Expansion) -> String {
        if let Some(value) = expansion.done.get(name) {
            return value.clone();
        }

        let Some(definition) = self.definitions.get(name) else {
            return String::new();
        };
        let location = definition
            .locations
            .last()
            .cloned()
            .unwrap_or_else(SourceSpan::unknown);

        if let Some(position) = expansion.stack.iter().position(|entry| entry == name) {
            expansion.markers.push(Marker::warning(
                format!("macro `{name}` refers to itself"),
                location,
            ));
            expansion
                .cyclic
                .extend(expansion.stack[position..].iter().cloned());
            return String::new();
        }

        if expansion.stack.len() >= syntax::MAX_NESTING {
            expansion.markers.push(Marker::warning(
                format!(
                    "macro `{name}` is nested deeper than {} references",
                    syntax::MAX_NESTING
                ),
                location,
            ));
            expansion.done.insert(name.to_string(), String::new());
            return String::new();
        }

        expansion.stack.push(name.to_string());

        let (tokens, _) = syntax::lex(&definition.value);
        let mut text = String::with_capacity(definition.value.len());
        for token in tokens.iter() {
            match token.macro_reference().filter(|_| !token.is_hidden()) {
                Some(reference) if self.definitions.contains_key(reference.name) => {
                    text.push_str(&self.expand(reference.name, expansion));
                }
                Some(reference) => match self.environment.get(reference.name) {
                    Some(value) => text.push_str(value),
                    None => expansion.markers.push(Marker::warning(
                        format!(
                            "macro `{}` used in the definition of `{name}` is not defined",
                            reference.name
                        ),
                        location.clone(),
                    )),
                },
                None => text.push_str(&token.text),
            }
        }

        expansion.stack.pop();

        let value = match expr::evaluate_text(&text) {
            Ok(Some(evaluated)) => evaluated.to_literal(),
            Ok(None) => text,
            Err(error) => {
                expansion.markers.push(Marker::warning(
                    format!("cannot evaluate macro `{name}`: {error}"),
                    location,
                ));
                text
            }
        };

        tracing::trace!(name, value = %value, "macro expanded");
        expansion.done.insert(name.to_string(), value.clone());
        value
    }
}

#[derive(Default)]
struct Expansion {
    stack: Vec<String>,
    done: IndexMap<String, String>,
    cyclic: IndexSet<String>,
    markers: Vec<Marker>,
}
