#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Help,
    ShowSettings,
    ListModels,
    Regenerate,
    ShowHistory,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Dimension {
    Width,
    Height,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec<T: 'static> {
    pub command: &'static str,
    pub action: T,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec<Action>] = &[
    CommandSpec {
        command: "help",
        action: Action::Help,
    },
    CommandSpec {
        command: "settings",
        action: Action::ShowSettings,
    },
    CommandSpec {
        command: "models",
        action: Action::ListModels,
    },
    CommandSpec {
        command: "regenerate",
        action: Action::Regenerate,
    },
    CommandSpec {
        command: "history",
        action: Action::ShowHistory,
    },
    CommandSpec {
        command: "quit",
        action: Action::Quit,
    },
    CommandSpec {
        command: "exit",
        action: Action::Quit,
    },
];

pub(crate) const DIMENSION_COMMANDS: &[CommandSpec<Dimension>] = &[
    CommandSpec {
        command: "width",
        action: Dimension::Width,
    },
    CommandSpec {
        command: "height",
        action: Dimension::Height,
    },
];

pub(crate) const TOGGLE_COMMANDS: &[&str] = &["enhance", "nologo", "private"];

pub(crate) const SEED_COMMAND: &str = "seed";
pub(crate) const MODEL_COMMAND: &str = "model";
pub(crate) const DOWNLOAD_COMMAND: &str = "download";

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/help",
    "/settings",
    "/width <64-1024>",
    "/height <64-1024>",
    "/seed <n|random>",
    "/model <name>",
    "/models",
    "/enhance on|off",
    "/nologo on|off",
    "/private on|off",
    "/regenerate",
    "/history",
    "/download <n|all>",
    "/quit",
];
