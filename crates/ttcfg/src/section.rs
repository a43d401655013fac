//! configuration section kinds
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Kind of a `[SECTION]`
///
/// [SectionKind::Unknown] is used for unrecognized headers and for structural blocks (`{ ... }`) that are not
/// sections at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionKind {
    ModuleParameters,
    Logging,
    TestportParameters,
    Define,
    MainController,
    Execute,
    Groups,
    Components,
    ExternalCommands,
    Include,
    OrderedInclude,
    Profiler,
    #[value(skip)]
    Unknown,
}

impl SectionKind {
    pub const ALL: [SectionKind; 12] = [
        SectionKind::ModuleParameters,
        SectionKind::Logging,
        SectionKind::TestportParameters,
        SectionKind::Define,
        SectionKind::MainController,
        SectionKind::Execute,
        SectionKind::Groups,
        SectionKind::Components,
        SectionKind::ExternalCommands,
        SectionKind::Include,
        SectionKind::OrderedInclude,
        SectionKind::Profiler,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::ModuleParameters => "MODULE_PARAMETERS",
            SectionKind::Logging => "LOGGING",
            SectionKind::TestportParameters => "TESTPORT_PARAMETERS",
            SectionKind::Define => "DEFINE",
            SectionKind::MainController => "MAIN_CONTROLLER",
            SectionKind::Execute => "EXECUTE",
            SectionKind::Groups => "GROUPS",
            SectionKind::Components => "COMPONENTS",
            SectionKind::ExternalCommands => "EXTERNAL_COMMANDS",
            SectionKind::Include => "INCLUDE",
            SectionKind::OrderedInclude => "ORDERED_INCLUDE",
            SectionKind::Profiler => "PROFILER",
            SectionKind::Unknown => "UNKNOWN",
        }
    }

    /// Kind for a header text such as `[LOGGING]`
    pub fn from_header(header: &str) -> SectionKind {
        let name = header
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim();

        SectionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .unwrap_or(SectionKind::Unknown)
    }
}

impl Display for SectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_names() {
        assert_eq!(SectionKind::from_header("[DEFINE]"), SectionKind::Define);
        assert_eq!(
            SectionKind::from_header("[ORDERED_INCLUDE]"),
            SectionKind::OrderedInclude
        );
        assert_eq!(SectionKind::from_header("[NOPE]"), SectionKind::Unknown);

        for kind in SectionKind::ALL {
            assert_eq!(SectionKind::from_header(&format!("[{kind}]")), kind);
        }
    }
}
