//! typed views of the semantic sections
//!
//! The analyzer keeps entries as source text. Once the macro table of the whole include graph is known, the
//! resolver substitutes and evaluates them here. Problems with individual entries become warnings; values whose
//! evaluation fails are recorded as [EvaluationError]s and kept as raw text.
use crate::analyzer::{last_segment, FileResult, RawEntry};
use crate::diagnostics::Marker;
use crate::expr::{self, Evaluated, ExprError};
use crate::macros::MacroTable;
use crate::section::SectionKind;
use crate::span::SourceSpan;
use crate::value::Value;
use indexmap::IndexMap;
use num_traits::ToPrimitive;
use serde::Serialize;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{span}: cannot evaluate `{key}`")]
pub struct EvaluationError {
    pub key: String,
    pub span: SourceSpan,
    #[source]
    pub source: ExprError,
}

/// `[COMPONENTS]`: component name (or `*`) to host
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ComponentMap(pub IndexMap<String, String>);

/// `[GROUPS]`: group name to its members
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GroupMap(pub IndexMap<String, Vec<String>>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingEntry {
    pub component: Option<String>,
    pub plugin: Option<String>,
    pub parameter: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub entries: Vec<LoggingEntry>,
    /// first `LogFile` value
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MainControllerConfig {
    pub local_address: Option<String>,
    pub tcp_port: Option<u16>,
    pub kill_timer: Option<f64>,
    pub num_hcs: Option<u32>,
    pub unix_sockets_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleParameter {
    pub name: String,
    pub value: Value,
    #[serde(skip)]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionHandlers {
    pub components: ComponentMap,
    pub groups: GroupMap,
    pub logging: LoggingConfig,
    pub main_controller: MainControllerConfig,
    pub module_parameters: Vec<ModuleParameter>,
}

/// Output of [SectionHandlers::build]
#[derive(Debug, Default)]
pub struct Built {
    pub handlers: SectionHandlers,
    pub warnings: Vec<Marker>,
    pub errors: Vec<EvaluationError>,
}

impl SectionHandlers {
    /// Build handlers from every file's entries, in the given file order
    pub fn build<'f>(files: impl IntoIterator<Item = &'f FileResult>, macros: &MacroTable) -> Built {
        let mut context = Context {
            macros,
            warnings: Vec::new(),
            errors: Vec::new(),
        };
        let mut handlers = SectionHandlers::default();
        // substituted text of each module parameter, for `&=`
        let mut parameter_text: Vec<String> = Vec::new();

        for file in files {
            for entry in file.entries(SectionKind::Components) {
                let host = context.string(entry);
                handlers.components.0.insert(entry.key.clone(), host);
            }

            for entry in file.entries(SectionKind::Groups) {
                let members = context
                    .substitute(entry)
                    .split(',')
                    .map(|member| expr::unquote(member.trim()))
                    .filter(|member| !member.is_empty())
                    .collect();
                handlers.groups.0.insert(entry.key.clone(), members);
            }

            for entry in file.entries(SectionKind::Logging) {
                handlers.logging.push(entry, &mut context);
            }

            for entry in file.entries(SectionKind::MainController) {
                handlers.main_controller.set(entry, &mut context);
            }

            for entry in file.entries(SectionKind::ModuleParameters) {
                let text = context.substitute(entry);
                let previous = handlers
                    .module_parameters
                    .iter()
                    .rposition(|parameter| parameter.name == entry.key);

                match previous {
                    Some(index) if entry.append => {
                        let combined = format!("{} & {text}", parameter_text[index]);
                        handlers.module_parameters[index].value =
                            context.value(&entry.key, &combined, &entry.span);
                        parameter_text[index] = combined;
                    }
                    _ => {
                        handlers.module_parameters.push(ModuleParameter {
                            name: entry.key.clone(),
                            value: context.value(&entry.key, &text, &entry.span),
                            span: entry.span.clone(),
                        });
                        parameter_text.push(text);
                    }
                }
            }
        }

        Built {
            handlers,
            warnings: context.warnings,
            errors: context.errors,
        }
    }
}

impl LoggingConfig {
    fn push(&mut self, entry: &RawEntry, context: &mut Context) {
        let mut parts: Vec<&str> = entry.key.split('.').collect();
        let parameter = parts.pop().unwrap_or_default().to_string();
        let component = (!parts.is_empty()).then(|| parts.remove(0).to_string());
        let plugin = (!parts.is_empty()).then(|| parts.join("."));

        let text = context.substitute(entry);
        let value = context.value(&entry.key, &text, &entry.span);

        if self.log_file.is_none() && last_segment(&entry.key).eq_ignore_ascii_case("LogFile") {
            self.log_file = Some(match &value {
                Value::String(file) => file.clone(),
                other => other.to_string(),
            });
        }

        self.entries.push(LoggingEntry {
            component,
            plugin,
            parameter,
            value,
        });
    }
}

impl MainControllerConfig {
    fn set(&mut self, entry: &RawEntry, context: &mut Context) {
        match entry.key.to_ascii_lowercase().as_str() {
            "localaddress" => self.local_address = Some(context.string(entry)),
            "tcpport" => {
                self.tcp_port = context
                    .number(entry)
                    .and_then(|value| value.to_integer().and_then(ToPrimitive::to_u16));
                if self.tcp_port.is_none() {
                    context.warn(entry, "TCPPort must be an integer between 0 and 65535");
                }
            }
            "killtimer" => {
                self.kill_timer = context
                    .number(entry)
                    .map(|value| value.to_f64())
                    .filter(|value| *value >= 0.0);
                if self.kill_timer.is_none() {
                    context.warn(entry, "KillTimer must be a non-negative number");
                }
            }
            "numhcs" => {
                self.num_hcs = context
                    .number(entry)
                    .and_then(|value| value.to_integer().and_then(ToPrimitive::to_u32));
                if self.num_hcs.is_none() {
                    context.warn(entry, "NumHCs must be a non-negative integer");
                }
            }
            "unixsocketsenabled" => {
                let text = context.substitute(entry);
                self.unix_sockets_enabled = match text.trim().to_ascii_lowercase().as_str() {
                    "yes" | "true" => Some(true),
                    "no" | "false" => Some(false),
                    _ => None,
                };
                if self.unix_sockets_enabled.is_none() {
                    context.warn(entry, "UnixSocketsEnabled must be `yes` or `no`");
                }
            }
            _ => context.warn(
                entry,
                format!("unknown [MAIN_CONTROLLER] parameter `{}`", entry.key),
            ),
        }
    }
}

struct Context<'m> {
    macros: &'m MacroTable,
    warnings: Vec<Marker>,
    errors: Vec<EvaluationError>,
}

impl<'m> Context<'m> {
    fn warn(&mut self, entry: &RawEntry, message: impl Into<String>) {
        self.warnings
            .push(Marker::warning(message, entry.span.clone()));
    }

    /// Entry value with macros substituted; unresolved names are warned about and dropped
    fn substitute(&mut self, entry: &RawEntry) -> String {
        let substituted = expr::substitute(&entry.value, self.macros);
        for name in substituted.unresolved {
            self.warn(entry, format!("macro `{name}` is not defined"));
        }
        substituted.text
    }

    fn evaluate(&mut self, key: &str, text: &str, span: &SourceSpan) -> Option<Evaluated> {
        match expr::evaluate_text(text) {
            Ok(evaluated) => evaluated,
            Err(source) => {
                tracing::debug!(key, %source, "evaluation failed");
                self.errors.push(EvaluationError {
                    key: key.to_string(),
                    span: span.clone(),
                    source,
                });
                None
            }
        }
    }

    fn value(&mut self, key: &str, text: &str, span: &SourceSpan) -> Value {
        match self.evaluate(key, text, span) {
            Some(evaluated) => evaluated.into(),
            None => Value::from_raw(text),
        }
    }

    fn number(&mut self, entry: &RawEntry) -> Option<crate::numeric::NumericValue> {
        let text = self.substitute(entry);
        match self.evaluate(&entry.key, &text, &entry.span)? {
            Evaluated::Number(number) => Some(number),
            Evaluated::Text(_) => None,
        }
    }

    /// String contents of a string expression, otherwise the substituted text
    fn string(&mut self, entry: &RawEntry) -> String {
        let text = self.substitute(entry);
        match self.evaluate(&entry.key, &text, &entry.span) {
            Some(Evaluated::Text(text)) => text,
            Some(Evaluated::Number(number)) => number.to_string(),
            None => text.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyzer::FileAnalyzer;
    use pretty_assertions::assert_eq;

    fn build(text: &str, macros: &MacroTable) -> Built {
        let file = FileAnalyzer::default().analyze_text(None, text);
        assert!(file.warnings.is_empty(), "{:?}", file.warnings);
        SectionHandlers::build([&file], macros)
    }

    #[test]
    fn components_and_groups() {
        let mut macros = MacroTable::default();
        macros.define("HOST", "\"10.0.0.1\"", SourceSpan::unknown());

        let built = build(
            "[COMPONENTS]\nmtc := $HOST\n* := localhost\n[GROUPS]\nall := h1, \"h2\", *\n",
            &macros,
        );
        assert!(built.warnings.is_empty(), "{:?}", built.warnings);

        let components: Vec<_> = built.handlers.components.0.into_iter().collect();
        assert_eq!(
            components,
            vec![
                ("mtc".to_string(), "10.0.0.1".to_string()),
                ("*".to_string(), "localhost".to_string()),
            ]
        );
        assert_eq!(
            built.handlers.groups.0.get("all"),
            Some(&vec!["h1".to_string(), "h2".to_string(), "*".to_string()])
        );
    }

    #[test]
    fn main_controller() {
        let built = build(
            "[MAIN_CONTROLLER]\nTCPPort := 9000 + 34\nkilltimer := 10.5\nNumHCs := 2\nUnixSocketsEnabled := Yes\nLocalAddress := \"::1\"\n",
            &MacroTable::default(),
        );
        assert!(built.warnings.is_empty(), "{:?}", built.warnings);

        assert_eq!(
            built.handlers.main_controller,
            MainControllerConfig {
                local_address: Some("::1".to_string()),
                tcp_port: Some(9034),
                kill_timer: Some(10.5),
                num_hcs: Some(2),
                unix_sockets_enabled: Some(true),
            }
        );
    }

    #[test]
    fn main_controller_type_errors_are_warnings() {
        let built = build(
            "[MAIN_CONTROLLER]\nTCPPort := 70000\nNumHCs := \"two\"\nUnixSocketsEnabled := maybe\nColor := red\n",
            &MacroTable::default(),
        );

        let messages: Vec<_> = built.warnings.iter().map(|marker| marker.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "TCPPort must be an integer between 0 and 65535",
                "NumHCs must be a non-negative integer",
                "UnixSocketsEnabled must be `yes` or `no`",
                "unknown [MAIN_CONTROLLER] parameter `Color`",
            ]
        );
        assert!(built.errors.is_empty());
    }

    #[test]
    fn logging() {
        let built = build(
            "[LOGGING]\nLogFile := \"first.log\"\nmtc.LogFile := \"second.log\"\n*.Legacy.FileMask := LOG_ALL | DEBUG\n",
            &MacroTable::default(),
        );

        let logging = built.handlers.logging;
        assert_eq!(logging.log_file.as_deref(), Some("first.log"));
        assert_eq!(
            logging.entries[2],
            LoggingEntry {
                component: Some("*".to_string()),
                plugin: Some("Legacy".to_string()),
                parameter: "FileMask".to_string(),
                value: Value::Raw("LOG_ALL | DEBUG".to_string()),
            }
        );
        assert_eq!(logging.entries[1].component.as_deref(), Some("mtc"));
        assert_eq!(logging.entries[1].plugin, None);
    }

    #[test]
    fn module_parameters() {
        let mut macros = MacroTable::default();
        macros.define("BASE", "100", SourceSpan::unknown());

        let built = build(
            "[MODULE_PARAMETERS]\nm.count := $BASE * 2\nm.name := \"a\"\nm.name &= \"b\"\nm.flag := true\nm.ratio := 1 / 0\n",
            &macros,
        );

        let parameters: Vec<_> = built
            .handlers
            .module_parameters
            .iter()
            .map(|parameter| (parameter.name.as_str(), parameter.value.clone()))
            .collect();
        assert_eq!(
            parameters,
            vec![
                ("m.count", Value::from(200)),
                ("m.name", Value::from("ab")),
                ("m.flag", Value::Boolean(true)),
                ("m.ratio", Value::Raw("1 / 0".to_string())),
            ]
        );

        assert_eq!(built.errors.len(), 1);
        assert_eq!(built.errors[0].key, "m.ratio");
        assert_eq!(
            built.errors[0].source,
            ExprError::Numeric(crate::numeric::NumericError::DivisionByZero)
        );
    }

    #[test]
    fn undefined_macros_are_warnings() {
        let built = build("[MODULE_PARAMETERS]\np := $NOPE\n", &MacroTable::default());
        assert_eq!(built.warnings.len(), 1);
        assert_eq!(built.warnings[0].message, "macro `NOPE` is not defined");
        assert_eq!(built.handlers.module_parameters[0].value, Value::Raw(String::new()));
    }
}
